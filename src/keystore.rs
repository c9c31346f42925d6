//! Keystore: a chain of fixed-size bump-allocated arenas owning copied keys.
//!
//! Each [`crate::store::SplitStore`] that ingests external keys owns one of
//! these. Keys are appended sequentially; an arena that cannot fit the next
//! key triggers allocation of a fresh arena. Ownership of whole arena chains
//! transfers between stores on merge, so the chain is append-only and is
//! never traversed outside of merge time.

/// Fallback arena size when the requested size cannot hold even one key.
const FALLBACK_ARENA_SIZE: usize = 64 * 1024;

struct Arena {
    buf: Box<[u8]>,
    used: usize,
}

impl Arena {
    fn free(&self) -> usize {
        self.buf.len() - self.used
    }
}

pub(crate) struct KeyStore {
    arenas: Vec<Arena>,
    arena_size: usize,
}

impl KeyStore {
    /// Opens the keystore with its first arena. `arena_kb` is the requested
    /// arena size in KiB; a size too small to hold a single key falls back to
    /// 64 KiB.
    pub(crate) fn new(arena_kb: usize, key_len: usize) -> Self {
        let mut arena_size = arena_kb * 1024;
        if arena_size < key_len {
            arena_size = FALLBACK_ARENA_SIZE;
        }
        let mut ks = Self {
            arenas: Vec::new(),
            arena_size,
        };
        ks.arenas.push(Arena {
            buf: vec![0u8; arena_size].into_boxed_slice(),
            used: 0,
        });
        ks
    }

    /// Copies `key` into the chain, returning its handle, or `None` when a
    /// fresh arena could not be allocated. Callers suppress the insertion on
    /// `None`; the loss surfaces through the end-of-input count check.
    pub(crate) fn alloc(&mut self, key: &[u8]) -> Option<(u32, u32)> {
        if self.last_free() < key.len() {
            let mut buf = Vec::new();
            buf.try_reserve_exact(self.arena_size).ok()?;
            buf.resize(self.arena_size, 0);
            self.arenas.push(Arena {
                buf: buf.into_boxed_slice(),
                used: 0,
            });
        }
        let idx = self.arenas.len() - 1;
        let arena = &mut self.arenas[idx];
        let off = arena.used;
        arena.buf[off..off + key.len()].copy_from_slice(key);
        arena.used += key.len();
        Some((idx as u32, off as u32))
    }

    pub(crate) fn key_bytes(&self, arena: u32, off: u32, len: usize) -> &[u8] {
        let a = &self.arenas[arena as usize];
        &a.buf[off as usize..off as usize + len]
    }

    pub(crate) fn arena_count(&self) -> usize {
        self.arenas.len()
    }

    pub(crate) fn is_single_arena(&self) -> bool {
        self.arenas.len() == 1
    }

    /// Used bytes of the sole arena. Only meaningful after
    /// [`Self::is_single_arena`] returned true.
    pub(crate) fn single_arena_used(&self) -> usize {
        self.arenas[0].used
    }

    /// Free bytes remaining in the trailing arena.
    pub(crate) fn last_free(&self) -> usize {
        self.arenas.last().map_or(0, Arena::free)
    }

    /// Appends another keystore's arena chain onto this one's tail, returning
    /// the arena-index base that spliced handles must be shifted by.
    pub(crate) fn splice(&mut self, other: &mut KeyStore) -> u32 {
        let base = self.arenas.len() as u32;
        self.arenas.append(&mut other.arenas);
        base
    }

    /// Relocates the content of `donor`'s single arena into this chain's
    /// trailing arena, returning the (arena index, byte base) the donor's
    /// handles must be rewritten against. The caller has verified the fit.
    pub(crate) fn absorb_single(&mut self, donor: &KeyStore) -> (u32, u32) {
        let src = &donor.arenas[0];
        let last = self.arenas.len() - 1;
        let dst = &mut self.arenas[last];
        let base = dst.used;
        dst.buf[base..base + src.used].copy_from_slice(&src.buf[..src.used]);
        dst.used += src.used;
        (last as u32, base as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_fills_and_extends_arenas() {
        // Arena of 1 KiB holds 64 sixteen-byte keys exactly.
        let mut ks = KeyStore::new(1, 16);
        for i in 0..64u8 {
            let key = [i; 16];
            let (arena, _) = ks.alloc(&key).unwrap();
            assert_eq!(arena, 0);
        }
        assert_eq!(ks.last_free(), 0);
        let (arena, off) = ks.alloc(&[99u8; 16]).unwrap();
        assert_eq!((arena, off), (1, 0));
        assert_eq!(ks.arena_count(), 2);
        assert_eq!(ks.key_bytes(1, 0, 16), &[99u8; 16]);
    }

    #[test]
    fn undersized_arena_falls_back() {
        let ks = KeyStore::new(0, 32);
        assert_eq!(ks.last_free(), FALLBACK_ARENA_SIZE);
    }

    #[test]
    fn splice_returns_handle_base() {
        let mut a = KeyStore::new(1, 8);
        let mut b = KeyStore::new(1, 8);
        a.alloc(b"aaaaaaaa").unwrap();
        let (arena, off) = b.alloc(b"bbbbbbbb").unwrap();
        let base = a.splice(&mut b);
        assert_eq!(base, 1);
        assert_eq!(a.key_bytes(base + arena, off, 8), b"bbbbbbbb");
        assert_eq!(b.arena_count(), 0);
    }

    #[test]
    fn absorb_single_relocates_bytes() {
        let mut host = KeyStore::new(1, 8);
        let mut donor = KeyStore::new(1, 8);
        host.alloc(b"hosthost").unwrap();
        donor.alloc(b"aaaabbbb").unwrap();
        donor.alloc(b"ccccdddd").unwrap();
        let (arena, base) = host.absorb_single(&donor);
        assert_eq!((arena, base), (0, 8));
        assert_eq!(host.key_bytes(arena, base, 8), b"aaaabbbb");
        assert_eq!(host.key_bytes(arena, base + 8, 8), b"ccccdddd");
    }
}
