//! Host-layer error taxonomy.
//!
//! The engine itself never returns errors: it fails softly on allocation
//! pressure and the loss is surfaced by the end-of-input validity check. The
//! driver and configuration layers are where failures become values.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SortError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("sort input file {path:?} is empty")]
    EmptyInput { path: PathBuf },

    #[error(
        "record {record} is {record_len} bytes, too short for a key ending at offset {key_end}"
    )]
    KeyBeyondRecord {
        record: usize,
        record_len: usize,
        key_end: usize,
    },

    #[error("record {record} is {len} bytes, beyond the configured maximum of {max_recl}")]
    RecordTooLong {
        record: usize,
        len: usize,
        max_recl: usize,
    },

    #[error(
        "sorted output holds {actual} records but {expected} were read; \
         the sort ran out of memory part-way"
    )]
    OutputInvalid { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    Config(String),
}
