//! The Splitter engine: range-partitioning insertion, adaptive preemptive
//! merging, and the final merge that leaves a single sorted store.
//!
//! The store chain has a nested shape: the first store spans the whole key
//! range seen so far and absorbs every new global extreme, while each later
//! store's span lies strictly inside its predecessor's (ties may touch the
//! boundaries in stable mode). A record that falls strictly inside the
//! innermost (tail) store's span opens a new store; everything else extends
//! an existing store at one end, located by a binary chop over the chain.

use crate::chain::StoreChain;
use crate::record::SortRecord;
use crate::stats::{NopStats, StatsSink};
use crate::store::{MergeOrder, SplitStore};

/// Preemptive-merge trigger before any adaptive growth.
const INITIAL_MAX_STORES: usize = 100;
/// Percentage of the equilibrium store count granted by each recomputation.
const GROWTH_PCT: usize = 25;
/// Chain headroom maintained when preemptive merging is disabled.
const CHAIN_HEADROOM: usize = 10;

/// Recomputes the preemptive-merge trigger from the running record count.
///
/// The equilibrium store count for `records` keys is `ceil(2 * sqrt(n / 2))`;
/// the trigger is granted `growth_pct` percent of it and never decreases.
fn compute_max_stores(current: usize, records: usize, growth_pct: usize) -> usize {
    let equilibrium = (((records / 2) as f64).sqrt() * 2.0).ceil() as usize;
    current.max((equilibrium * growth_pct) / 100)
}

/// The top-level sort engine.
///
/// Records enter through the `add*` family in arrival order; each one is
/// classified against the store chain and placed so that every store stays
/// internally sorted. [`Splitter::end_of_input`] (or the stable variant)
/// collapses the chain to a single store, after which the output cursors
/// walk the result in either direction.
///
/// `P` is the host's payload locator. `S` is the statistics sink; the default
/// [`NopStats`] costs nothing.
pub struct Splitter<'k, P, S = NopStats> {
    chain: StoreChain<'k, P>,
    key_len: usize,
    arena_kb: usize,
    rec_no: usize,
    max_stores: usize,
    growth_pct: usize,
    stats: S,
}

impl<'k, P: Copy, S: StatsSink> Splitter<'k, P, S> {
    /// Creates the engine seeded with the first record. The key bytes are
    /// borrowed for the life of the sort; use [`Splitter::with_keystore`]
    /// when the caller's key buffer is transient.
    pub fn new(key: &'k [u8], payload: P, key_len: usize, mut stats: S) -> Self {
        debug_assert_eq!(key.len(), key_len);
        stats.key_seen();
        let store = SplitStore::new(SortRecord::host(key, payload), key_len);
        Self {
            chain: StoreChain::new(store),
            key_len,
            arena_kb: 0,
            rec_no: 1,
            max_stores: INITIAL_MAX_STORES,
            growth_pct: GROWTH_PCT,
            stats,
        }
    }

    /// Creates the engine with per-store keystores of `arena_kb` KiB arenas.
    /// The first record's key is copied immediately, so `key` may live in a
    /// scratch buffer.
    pub fn with_keystore(key: &[u8], payload: P, key_len: usize, arena_kb: usize, mut stats: S) -> Self {
        debug_assert_eq!(key.len(), key_len);
        stats.key_seen();
        let store = SplitStore::new_with_keystore(key, payload, key_len, arena_kb);
        Self {
            chain: StoreChain::new(store),
            key_len,
            arena_kb,
            rec_no: 1,
            max_stores: INITIAL_MAX_STORES,
            growth_pct: GROWTH_PCT,
            stats,
        }
    }

    /// Ingests a record, unstable ordering. The key bytes must remain valid
    /// for the life of the sort.
    pub fn add(&mut self, key: &'k [u8], payload: P, pm_enabled: bool) {
        self.place(key, Some(key), payload, false, true, pm_enabled);
    }

    /// Ingests a record whose key lives in caller-managed transient storage;
    /// the key is copied into the receiving store's keystore.
    pub fn add_external(&mut self, key: &[u8], payload: P, pm_enabled: bool) {
        self.place(key, None, payload, false, true, pm_enabled);
    }

    /// Stable ingestion: records with equal keys keep their arrival order in
    /// the output. `ascending` must match the direction the output will be
    /// walked in.
    pub fn add_stable(&mut self, key: &'k [u8], payload: P, ascending: bool, pm_enabled: bool) {
        self.place(key, Some(key), payload, true, ascending, pm_enabled);
    }

    /// Stable ingestion with the key copied into the receiving store's
    /// keystore.
    pub fn add_stable_external(
        &mut self,
        key: &[u8],
        payload: P,
        ascending: bool,
        pm_enabled: bool,
    ) {
        self.place(key, None, payload, true, ascending, pm_enabled);
    }

    /// Collapses the chain to a single store by repeated alternate-neighbor
    /// merge passes and returns the surviving record count.
    pub fn end_of_input(&mut self) -> usize {
        self.finish(MergeOrder::Unstable)
    }

    /// Stable final merge; `ascending` selects the tie rule matching the
    /// requested output direction.
    pub fn end_of_stable_input(&mut self, ascending: bool) -> usize {
        self.finish(if ascending {
            MergeOrder::StableAscending
        } else {
            MergeOrder::StableDescending
        })
    }

    /// True when the surviving store holds every record that was added. A
    /// mismatch means an allocation failure silently dropped records earlier.
    pub fn is_output_valid(&self) -> bool {
        self.rec_no == self.chain.first().len()
    }

    /// Cursor positioned at the lowest-collating record.
    pub fn lowest(&self) -> Output<'_, 'k, P> {
        Output {
            store: self.chain.first(),
            pos: 1,
        }
    }

    /// Cursor positioned at the highest-collating record.
    pub fn highest(&self) -> Output<'_, 'k, P> {
        let store = self.chain.first();
        Output {
            pos: store.len(),
            store,
        }
    }

    /// Records ingested so far, including any lost to allocation failure.
    pub fn record_count(&self) -> usize {
        self.rec_no
    }

    /// Current length of the store chain.
    pub fn store_count(&self) -> usize {
        self.chain.len()
    }

    /// Current preemptive-merge trigger; monotone non-decreasing.
    pub fn max_stores(&self) -> usize {
        self.max_stores
    }

    pub fn stats(&self) -> &S {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut S {
        &mut self.stats
    }

    fn finish(&mut self, order: MergeOrder) -> usize {
        let initial = self.chain.len();
        self.stats.fm_started();
        while self.chain.len() > 1 {
            self.chain.alternate_merge_pass(order);
        }
        self.stats.fm_finished(initial);
        self.chain.first().len()
    }

    /// The single placement routine behind the four `add*` variants. `kept`
    /// carries the long-lived key borrow for the zero-copy paths and is
    /// `None` when the key must be copied into a keystore. `stable` selects
    /// strict boundary comparisons so tied keys never extend a store.
    fn place(
        &mut self,
        key: &[u8],
        kept: Option<&'k [u8]>,
        payload: P,
        stable: bool,
        ascending: bool,
        pm_enabled: bool,
    ) {
        debug_assert_eq!(key.len(), self.key_len);
        self.rec_no += 1;
        self.stats.key_seen();

        // Boundary absorption: the outermost store takes every new global
        // extreme (ties included in unstable mode).
        self.stats.compare();
        let at_low = {
            let lo = self.chain.first().lo_key();
            if stable { key < lo } else { key <= lo }
        };
        if at_low {
            self.insert_low(0, key, kept, payload);
            self.stats.lo_hit();
            return;
        }
        self.stats.compare();
        let at_high = {
            let hi = self.chain.first().hi_key();
            if stable { key > hi } else { key >= hi }
        };
        if at_high {
            self.insert_high(0, key, kept, payload);
            self.stats.hi_hit();
            return;
        }

        // A key inside the innermost store's span opens a new store; this is
        // the only operation that lengthens the chain.
        let tail = self.chain.len() - 1;
        let (_, tail_without) = self.classify(tail, key, stable);
        if !tail_without {
            let store = self.make_store(key, kept, payload);
            self.chain.push(store);
            self.stats.new_store();
            if pm_enabled && self.chain.len() > self.max_stores {
                self.suppress_tail(if stable {
                    if ascending {
                        MergeOrder::StableAscending
                    } else {
                        MergeOrder::StableDescending
                    }
                } else {
                    MergeOrder::Unstable
                });
                self.max_stores = compute_max_stores(self.max_stores, self.rec_no, self.growth_pct);
                self.chain.ensure_capacity(self.max_stores);
            } else if !pm_enabled {
                self.chain.ensure_headroom(CHAIN_HEADROOM);
            }
            return;
        }

        // Binary chop over the chain. Store spans nest, so "inside S[i]" is
        // monotone in i: the walk hunts the deepest store still containing
        // the key and extends its right neighbor.
        let mut cur = self.chain.len() / 2;
        let mut delta = (self.chain.len() / 4).max(1);
        loop {
            let (below, without) = self.classify(cur, key, stable);
            if without {
                // Outside this store's span: the key belongs to a shallower
                // store unless the left neighbor still contains it, in which
                // case this store is the one to extend.
                let neighbor_without = cur > 0 && {
                    let (_, w) = self.classify(cur - 1, key, stable);
                    w
                };
                if !neighbor_without {
                    if below {
                        self.insert_low(cur, key, kept, payload);
                        self.stats.lo_hit();
                    } else {
                        self.insert_high(cur, key, kept, payload);
                        self.stats.hi_hit();
                    }
                    return;
                }
                cur = cur.saturating_sub(delta);
            } else {
                // Inside this store's span: extend the right neighbor if the
                // key escapes it, otherwise keep moving inward.
                let (n_below, n_without) = self.classify(cur + 1, key, stable);
                if n_without {
                    if n_below {
                        self.insert_low(cur + 1, key, kept, payload);
                        self.stats.lo_hit();
                    } else {
                        self.insert_high(cur + 1, key, kept, payload);
                        self.stats.hi_hit();
                    }
                    return;
                }
                cur = (cur + delta).min(self.chain.len() - 1);
            }
            delta = (delta / 2).max(1);
        }
    }

    /// Classifies `key` against store `idx`: `(below, without)`. `below`
    /// implies `without`; a key that is neither below nor above is inside
    /// the store's span.
    fn classify(&mut self, idx: usize, key: &[u8], stable: bool) -> (bool, bool) {
        self.stats.compare();
        let below = {
            let lo = self.chain.get(idx).lo_key();
            if stable { key < lo } else { key <= lo }
        };
        if below {
            return (true, true);
        }
        self.stats.compare();
        let above = {
            let hi = self.chain.get(idx).hi_key();
            if stable { key > hi } else { key >= hi }
        };
        (false, above)
    }

    fn insert_low(&mut self, idx: usize, key: &[u8], kept: Option<&'k [u8]>, payload: P) {
        let store = self.chain.get_mut(idx);
        match kept {
            Some(k) => store.push_low(SortRecord::host(k, payload)),
            None => store.push_low_external(key, payload),
        }
    }

    fn insert_high(&mut self, idx: usize, key: &[u8], kept: Option<&'k [u8]>, payload: P) {
        let store = self.chain.get_mut(idx);
        match kept {
            Some(k) => store.push_high(SortRecord::host(k, payload)),
            None => store.push_high_external(key, payload),
        }
    }

    fn make_store(&self, key: &[u8], kept: Option<&'k [u8]>, payload: P) -> SplitStore<'k, P> {
        match kept {
            Some(k) => SplitStore::new(SortRecord::host(k, payload), self.key_len),
            None => SplitStore::new_with_keystore(key, payload, self.key_len, self.arena_kb),
        }
    }

    /// Preemptive merge: eliminates the innermost tenth of the chain by
    /// merging each tail store into its left neighbor. Tail-local, so the
    /// surviving stores' spans are untouched.
    fn suppress_tail(&mut self, order: MergeOrder) {
        let stores = self.chain.len();
        let target = (stores * 9) / 10;
        self.stats.pm_started();
        let mut merged = 0;
        while self.chain.len() > target {
            let Some(mergee) = self.chain.pop() else {
                break;
            };
            self.chain.last_mut().merge_with_next(mergee, order);
            merged += 1;
        }
        self.stats.pm_finished(merged);
    }
}

/// Random-access cursor over the final store's records.
///
/// Positions run from the lowest record (`pos == 1`) to the highest
/// (`pos == len`); [`Output::advance`] and [`Output::retreat`] may step one
/// position past either end for loop control, where dereferencing panics.
/// Cursors compare by position.
pub struct Output<'s, 'k, P> {
    store: &'s SplitStore<'k, P>,
    pos: usize,
}

impl<'s, 'k, P: Copy> Output<'s, 'k, P> {
    /// Key bytes of the record at the cursor.
    pub fn key(&self) -> &'s [u8] {
        self.store.key_at(self.pos - 1)
    }

    /// Payload locator of the record at the cursor.
    pub fn payload(&self) -> P {
        self.store.get(self.pos - 1).payload()
    }

    /// Steps toward the highest record.
    pub fn advance(&mut self) {
        if self.pos <= self.store.len() {
            self.pos += 1;
        }
    }

    /// Steps toward the lowest record.
    pub fn retreat(&mut self) {
        if self.pos > 0 {
            self.pos -= 1;
        }
    }

    /// Ordinal position, 1-based from the lowest record.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<'s, 'k, P> Clone for Output<'s, 'k, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'s, 'k, P> Copy for Output<'s, 'k, P> {}

impl<'s, 'k, P> PartialEq for Output<'s, 'k, P> {
    fn eq(&self, other: &Self) -> bool {
        self.pos == other.pos
    }
}

impl<'s, 'k, P> Eq for Output<'s, 'k, P> {}

impl<'s, 'k, P> std::fmt::Debug for Output<'s, 'k, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output").field("pos", &self.pos).finish()
    }
}

impl<'s, 'k, P> PartialOrd for Output<'s, 'k, P> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<'s, 'k, P> Ord for Output<'s, 'k, P> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.pos.cmp(&other.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    impl<'k, P: Copy, S: StatsSink> Splitter<'k, P, S> {
        /// (lo, hi) span of every store on the chain.
        fn spans(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
            (0..self.chain.len())
                .map(|i| {
                    let s = self.chain.get(i);
                    (s.lo_key().to_vec(), s.hi_key().to_vec())
                })
                .collect()
        }

        fn assert_invariants(&self, stable: bool) {
            // Every store is internally sorted.
            for i in 0..self.chain.len() {
                let s = self.chain.get(i);
                for j in 1..s.len() {
                    assert!(s.key_at(j - 1) <= s.key_at(j), "store {i} unsorted at {j}");
                }
            }
            // Store spans nest left to right.
            for (i, w) in self.spans().windows(2).enumerate() {
                if stable {
                    assert!(w[0].0 <= w[1].0 && w[1].1 <= w[0].1, "nesting broken at {i}");
                } else {
                    assert!(w[0].0 < w[1].0 && w[1].1 < w[0].1, "nesting broken at {i}");
                }
            }
            // No record is lost or duplicated across stores.
            let total: usize = (0..self.chain.len()).map(|i| self.chain.get(i).len()).sum();
            assert_eq!(total, self.rec_no);
        }
    }

    fn keys(n: usize, width: usize, seed: u64) -> Vec<Vec<u8>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let mut k = vec![0u8; width];
                rng.fill(&mut k[..]);
                k
            })
            .collect()
    }

    #[test]
    fn invariants_hold_during_random_ingestion() {
        let keys = keys(5000, 4, 42);
        let mut sp = Splitter::new(keys[0].as_slice(), 0usize, 4, NopStats);
        for (i, k) in keys.iter().enumerate().skip(1) {
            sp.add(k, i, true);
            if i % 512 == 0 {
                sp.assert_invariants(false);
            }
        }
        sp.assert_invariants(false);
        assert_eq!(sp.end_of_input(), keys.len());
        assert!(sp.is_output_valid());
        sp.assert_invariants(false);
    }

    #[test]
    fn stable_invariants_allow_touching_spans() {
        // Narrow key space forces heavy tying.
        let mut rng = StdRng::seed_from_u64(7);
        let keys: Vec<Vec<u8>> = (0..3000).map(|_| vec![rng.random_range(b'a'..=b'f')]).collect();
        let mut sp = Splitter::new(keys[0].as_slice(), 0usize, 1, NopStats);
        for (i, k) in keys.iter().enumerate().skip(1) {
            sp.add_stable(k, i, true, true);
            if i % 256 == 0 {
                sp.assert_invariants(true);
            }
        }
        sp.assert_invariants(true);
        assert_eq!(sp.end_of_stable_input(true), keys.len());
        assert!(sp.is_output_valid());
    }

    #[test]
    fn max_stores_is_monotone_and_bounds_chain() {
        let keys = keys(50_000, 2, 9);
        let mut sp = Splitter::new(keys[0].as_slice(), 0usize, 2, NopStats);
        let mut last = sp.max_stores();
        assert_eq!(last, 100);
        for (i, k) in keys.iter().enumerate().skip(1) {
            sp.add(k, i, true);
            assert!(sp.max_stores() >= last);
            assert!(sp.store_count() <= sp.max_stores());
            last = sp.max_stores();
        }
        assert_eq!(sp.end_of_input(), keys.len());
    }

    #[test]
    fn pm_disabled_grows_chain_past_trigger() {
        // 2-byte keys drawn from a wide space; with PM off the chain is free
        // to grow beyond the 100-store trigger.
        let keys = keys(60_000, 2, 11);
        let mut sp = Splitter::new(keys[0].as_slice(), 0usize, 2, NopStats);
        for (i, k) in keys.iter().enumerate().skip(1) {
            sp.add(k, i, false);
        }
        assert!(sp.store_count() > 100, "chain stayed at {}", sp.store_count());
        assert_eq!(sp.end_of_input(), keys.len());
        assert!(sp.is_output_valid());
    }

    #[test]
    fn equilibrium_growth_is_monotone() {
        assert_eq!(compute_max_stores(100, 10, 25), 100);
        // n = 20_000: ceil(2 * sqrt(10_000)) = 200, kept at 25% = 50 < 100.
        assert_eq!(compute_max_stores(100, 20_000, 25), 100);
        // n = 2_000_000: ceil(2 * sqrt(1_000_000)) = 2000, 25% = 500.
        assert_eq!(compute_max_stores(100, 2_000_000, 25), 500);
        assert_eq!(compute_max_stores(500, 2_000_000, 25), 500);
    }

    #[test]
    fn output_cursor_walks_both_directions() {
        let data: Vec<&[u8]> = vec![b"cc", b"aa", b"bb"];
        let mut sp = Splitter::new(data[0], 0usize, 2, NopStats);
        for (i, k) in data.iter().enumerate().skip(1) {
            sp.add(k, i, true);
        }
        sp.end_of_input();
        let mut cur = sp.lowest();
        let mut fwd = Vec::new();
        loop {
            fwd.push(cur.key().to_vec());
            if cur >= sp.highest() {
                break;
            }
            cur.advance();
        }
        assert_eq!(fwd, vec![b"aa".to_vec(), b"bb".to_vec(), b"cc".to_vec()]);
        let mut cur = sp.highest();
        let mut back = Vec::new();
        loop {
            back.push(cur.key().to_vec());
            if cur <= sp.lowest() {
                break;
            }
            cur.retreat();
        }
        assert_eq!(back, vec![b"cc".to_vec(), b"bb".to_vec(), b"aa".to_vec()]);
    }
}
