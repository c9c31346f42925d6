//! Instrumentation: a passive sink the engine writes counters and timing
//! events into between operations.
//!
//! The sink is a generic parameter of the Splitter with no-op defaults, so an
//! uninstrumented sort ([`NopStats`]) pays nothing. The host-side collector
//! ([`SortStats`]) keeps its counter block cache-line aligned because it is
//! touched on every insertion.

use cuneiform::cuneiform;
use std::fmt;
use std::time::{Duration, Instant};

/// Passive recipient of engine counters and merge events.
///
/// Every method has an empty default body; implement only what the host cares
/// about.
pub trait StatsSink {
    /// A record entered the engine.
    fn key_seen(&mut self) {}
    /// One key comparison was made.
    fn compare(&mut self) {}
    /// A record was absorbed at the low end of a store.
    fn lo_hit(&mut self) {}
    /// A record was absorbed at the high end of a store.
    fn hi_hit(&mut self) {}
    /// A new store was appended to the chain.
    fn new_store(&mut self) {}
    /// A preemptive merge began.
    fn pm_started(&mut self) {}
    /// A preemptive merge finished, having eliminated `stores_merged` stores.
    fn pm_finished(&mut self, stores_merged: usize) {
        let _ = stores_merged;
    }
    /// The final merge began.
    fn fm_started(&mut self) {}
    /// The final merge finished, having collapsed `stores_merged` stores.
    fn fm_finished(&mut self, stores_merged: usize) {
        let _ = stores_merged;
    }
}

/// Zero-cost sink for uninstrumented sorts.
#[derive(Default, Clone, Copy, Debug)]
pub struct NopStats;

impl StatsSink for NopStats {}

// Hot counter block, cache-line aligned: written on every insertion.
#[cuneiform]
pub struct Counters {
    pub keys: u64,
    pub compares: u64,
    pub lo_hits: u64,
    pub hi_hits: u64,
    pub new_stores: u64,
    pub pms: u64,
    pub pm_stores_merged: u64,
    pub fm_stores_merged: u64,
}

impl Counters {
    fn new() -> Self {
        Self {
            keys: 0,
            compares: 0,
            lo_hits: 0,
            hi_hits: 0,
            new_stores: 0,
            pms: 0,
            pm_stores_merged: 0,
            fm_stores_merged: 0,
        }
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Counters {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys,
            compares: self.compares,
            lo_hits: self.lo_hits,
            hi_hits: self.hi_hits,
            new_stores: self.new_stores,
            pms: self.pms,
            pm_stores_merged: self.pm_stores_merged,
            fm_stores_merged: self.fm_stores_merged,
        }
    }
}

impl fmt::Debug for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Counters")
            .field("keys", &self.keys)
            .field("compares", &self.compares)
            .field("lo_hits", &self.lo_hits)
            .field("hi_hits", &self.hi_hits)
            .field("new_stores", &self.new_stores)
            .field("pms", &self.pms)
            .field("pm_stores_merged", &self.pm_stores_merged)
            .field("fm_stores_merged", &self.fm_stores_merged)
            .finish()
    }
}

/// Host-side statistics collector: engine counters plus phase timings.
///
/// The sort phases mirror the driver's pipeline: load, input, preemptive
/// merging (accumulated across triggers), final merge, output preparation,
/// and store. The driver marks the outer phases itself; the engine marks the
/// merge phases through the [`StatsSink`] events.
pub struct SortStats {
    counters: Counters,
    load: Duration,
    input: Duration,
    pm: Duration,
    fm: Duration,
    output: Duration,
    store: Duration,
    sort: Duration,
    load_started: Option<Instant>,
    input_started: Option<Instant>,
    pm_started_at: Option<Instant>,
    fm_started_at: Option<Instant>,
    output_started: Option<Instant>,
    store_started: Option<Instant>,
    sort_started: Option<Instant>,
}

impl SortStats {
    pub fn new() -> Self {
        Self {
            counters: Counters::new(),
            load: Duration::ZERO,
            input: Duration::ZERO,
            pm: Duration::ZERO,
            fm: Duration::ZERO,
            output: Duration::ZERO,
            store: Duration::ZERO,
            sort: Duration::ZERO,
            load_started: None,
            input_started: None,
            pm_started_at: None,
            fm_started_at: None,
            output_started: None,
            store_started: None,
            sort_started: None,
        }
    }

    pub fn start_load(&mut self) {
        self.load_started = Some(Instant::now());
    }

    pub fn finish_load(&mut self) {
        if let Some(t) = self.load_started.take() {
            self.load = t.elapsed();
        }
    }

    pub fn start_sort(&mut self) {
        self.sort_started = Some(Instant::now());
    }

    pub fn finish_sort(&mut self) {
        if let Some(t) = self.sort_started.take() {
            self.sort = t.elapsed();
        }
    }

    pub fn start_input(&mut self) {
        self.input_started = Some(Instant::now());
    }

    pub fn finish_input(&mut self) {
        if let Some(t) = self.input_started.take() {
            self.input = t.elapsed();
        }
    }

    pub fn start_output(&mut self) {
        self.output_started = Some(Instant::now());
    }

    pub fn finish_output(&mut self) {
        if let Some(t) = self.output_started.take() {
            self.output = t.elapsed();
        }
    }

    pub fn start_store(&mut self) {
        self.store_started = Some(Instant::now());
    }

    pub fn finish_store(&mut self) {
        if let Some(t) = self.store_started.take() {
            self.store = t.elapsed();
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn load_phase(&self) -> Duration {
        self.load
    }

    pub fn input_phase(&self) -> Duration {
        self.input
    }

    pub fn pm_phase(&self) -> Duration {
        self.pm
    }

    pub fn fm_phase(&self) -> Duration {
        self.fm
    }

    pub fn output_phase(&self) -> Duration {
        self.output
    }

    pub fn store_phase(&self) -> Duration {
        self.store
    }

    pub fn sort_phase(&self) -> Duration {
        self.sort
    }

    /// Sort rate in keys per second over the sort phase, zero before the
    /// phase has been timed.
    pub fn sort_rate(&self) -> u64 {
        let secs = self.sort.as_secs_f64();
        if secs > 0.0 {
            (self.counters.keys as f64 / secs) as u64
        } else {
            0
        }
    }

    /// Multi-line human-readable rendering used by the CLI timing report.
    pub fn render(&self) -> String {
        let c = &self.counters;
        let mut out = String::new();
        out.push_str(&format!(
            "Sort for: {} keys took: {} ms ({} kps).\n",
            c.keys,
            self.sort.as_millis(),
            self.sort_rate()
        ));
        out.push_str(&format!(
            "Phases (ms): load: {}, input: {}, preemptive merge: {}, final merge: {}, output: {}, store: {}.\n",
            self.load.as_millis(),
            self.input.as_millis(),
            self.pm.as_millis(),
            self.fm.as_millis(),
            self.output.as_millis(),
            self.store.as_millis()
        ));
        out.push_str(&format!(
            "Activity: {} compares, {} low hits, {} high hits, {} new stores, {} preemptive merges ({} stores), final merge over {} stores.",
            c.compares,
            c.lo_hits,
            c.hi_hits,
            c.new_stores,
            c.pms,
            c.pm_stores_merged,
            c.fm_stores_merged
        ));
        out
    }
}

impl Default for SortStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsSink for SortStats {
    fn key_seen(&mut self) {
        self.counters.keys += 1;
    }

    fn compare(&mut self) {
        self.counters.compares += 1;
    }

    fn lo_hit(&mut self) {
        self.counters.lo_hits += 1;
    }

    fn hi_hit(&mut self) {
        self.counters.hi_hits += 1;
    }

    fn new_store(&mut self) {
        self.counters.new_stores += 1;
    }

    fn pm_started(&mut self) {
        self.counters.pms += 1;
        self.pm_started_at = Some(Instant::now());
    }

    fn pm_finished(&mut self, stores_merged: usize) {
        self.counters.pm_stores_merged += stores_merged as u64;
        if let Some(t) = self.pm_started_at.take() {
            self.pm += t.elapsed();
        }
    }

    fn fm_started(&mut self) {
        self.fm_started_at = Some(Instant::now());
    }

    fn fm_finished(&mut self, stores_merged: usize) {
        self.counters.fm_stores_merged += stores_merged as u64;
        if let Some(t) = self.fm_started_at.take() {
            self.fm = t.elapsed();
        }
    }
}
