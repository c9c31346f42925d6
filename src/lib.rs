//! # UGSort
//!
//! `ugsort` is an external-sort engine that orders large sequences of
//! delimited records by a fixed-offset, fixed-length byte key. At its heart
//! is the **Splitter**: an incremental, range-partitioning data structure
//! that absorbs keys in arrival order, keeps every partition internally
//! sorted at all times, and converges on a single fully sorted sequence
//! through a bounded number of merges.
//!
//! ## How it works
//!
//! - **SplitStores** hold contiguous runs of records with amortized O(1)
//!   insertion at either end. The first store spans the whole key range seen
//!   so far; each later store's span nests inside its predecessor's.
//! - A record falling strictly inside the innermost store's span opens a new
//!   store; every other record extends an existing store at one end, found by
//!   a binary chop over the chain.
//! - **Preemptive merging** keeps the chain bounded: when it outgrows an
//!   adaptive trigger, the innermost tenth of the stores is merged away,
//!   protecting worst-case behavior on near-sorted input.
//! - On end-of-input, alternate-neighbor merge passes collapse the chain to
//!   one store in O(log k) passes, walked by random-access output cursors in
//!   either direction.
//!
//! ## Key features
//!
//! - **Zero-copy ingestion**: records borrow their key bytes from a
//!   caller-stable buffer; nothing is copied on the happy path.
//! - **Keystore arenas**: when keys arrive through a transient scratch buffer
//!   (the on-disk model), they are copied into per-store bump-allocated
//!   arenas whose ownership transfers wholesale on merge.
//! - **Stable or unstable ordering**: stability is a comparator parameter,
//!   not a separate implementation.
//! - **Passive instrumentation**: the engine reports counters and merge
//!   events to a [`StatsSink`]; the no-op default costs nothing.
//!
//! ## Usage
//!
//! ```rust
//! use ugsort::{NopStats, Splitter};
//!
//! let keys: [&[u8]; 5] = [b"09", b"05", b"02", b"07", b"01"];
//!
//! // Seed the engine with the first record; payloads here are just indices.
//! let mut sp = Splitter::new(keys[0], 0usize, 2, NopStats);
//! for (i, key) in keys.iter().enumerate().skip(1) {
//!     sp.add(key, i, true);
//! }
//!
//! assert_eq!(sp.end_of_input(), keys.len());
//! assert!(sp.is_output_valid());
//!
//! let mut cur = sp.lowest();
//! assert_eq!(cur.key(), b"01");
//! cur.advance();
//! assert_eq!(cur.key(), b"02");
//! assert_eq!(sp.highest().key(), b"09");
//! ```
//!
//! File-to-file sorting, configuration, and the CLI live in the host layer:
//! [`Sorter`], [`SortConfig`], and the `ugsort` binary.

pub mod config;
pub mod error;
pub mod sorter;
pub mod splitter;
pub mod stats;

mod chain;
mod keystore;
mod record;
mod store;

pub use config::{MemoryModel, SortConfig};
pub use error::SortError;
pub use sorter::{SortSummary, Sorter};
pub use splitter::{Output, Splitter};
pub use stats::{Counters, NopStats, SortStats, StatsSink};

pub mod prelude {
    pub use crate::config::{MemoryModel, SortConfig};
    pub use crate::error::SortError;
    pub use crate::sorter::{SortSummary, Sorter};
    pub use crate::splitter::{Output, Splitter};
    pub use crate::stats::{NopStats, SortStats, StatsSink};
}
