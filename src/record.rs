//! Record model: a key location plus an opaque payload locator.
//!
//! Records are copied by value as they move between stores; they never own
//! the key bytes or the payload they refer to. A key lives either in
//! caller-stable storage (borrowed for the life of the sort) or in the owning
//! store's keystore (addressed by an arena handle that the merge machinery
//! rewrites when arenas are spliced or coalesced).

/// Location of a record's key bytes.
#[derive(Clone, Copy, Debug)]
pub(crate) enum KeyRef<'k> {
    /// Borrow of caller-stable key bytes, exactly the configured key length.
    Host(&'k [u8]),
    /// Handle into the owning store's keystore.
    Arena { arena: u32, off: u32 },
}

/// A record in flight through the sort.
///
/// `P` is the host's payload locator: an in-memory record slice, a disk byte
/// offset, an array index, or anything else that is `Copy` and lets the host
/// find the original record again.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SortRecord<'k, P> {
    pub(crate) key: KeyRef<'k>,
    payload: P,
}

impl<'k, P: Copy> SortRecord<'k, P> {
    pub(crate) fn host(key: &'k [u8], payload: P) -> Self {
        Self {
            key: KeyRef::Host(key),
            payload,
        }
    }

    pub(crate) fn arena(arena: u32, off: u32, payload: P) -> Self {
        Self {
            key: KeyRef::Arena { arena, off },
            payload,
        }
    }

    pub(crate) fn payload(&self) -> P {
        self.payload
    }

    /// Shift an arena handle by `base` arena slots. Applied to mergee records
    /// as they are copied into a merge target whose keystore is about to have
    /// the mergee's arena chain spliced onto its tail.
    pub(crate) fn rebase_arena(&mut self, base: u32) {
        if let KeyRef::Arena { arena, .. } = &mut self.key {
            *arena += base;
        }
    }

    /// Repoint an arena handle after its key bytes were relocated into the
    /// arena `arena` at byte offset `base` (the offset-plus-base rule).
    pub(crate) fn relocate_arena(&mut self, arena: u32, base: u32) {
        if let KeyRef::Arena { arena: a, off } = &mut self.key {
            *a = arena;
            *off += base;
        }
    }
}
