//! The Sorter driver: feeds newline-delimited records from a file through the
//! Splitter and re-emits them in sorted order.
//!
//! Two memory models are offered. The in-memory model loads the whole input
//! once and sorts zero-copy: keys and payloads are borrows into the loaded
//! image. The on-disk model streams records through a reusable line buffer,
//! keeps only keys (copied into keystore arenas) and file offsets in memory,
//! and re-reads each record by offset when writing the output.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use log::{info, warn};

use crate::error::SortError;
use crate::splitter::Splitter;
use crate::stats::SortStats;

/// Arena size used for on-disk sorts, in KiB.
const KEYSTORE_ARENA_KB: usize = 64;

/// Outcome of a completed sort: record count, engine activity, and phase
/// timings lifted from the statistics collector.
#[derive(Debug, Clone)]
pub struct SortSummary {
    pub records: usize,
    pub compares: u64,
    pub lo_hits: u64,
    pub hi_hits: u64,
    pub new_stores: u64,
    pub preemptive_merges: u64,
    pub sort_rate_kps: u64,
    pub load: Duration,
    pub input: Duration,
    pub preemptive_merge: Duration,
    pub final_merge: Duration,
    pub output: Duration,
    pub store: Duration,
    pub sort: Duration,
}

/// Driver for file-to-file sorts.
#[derive(Default)]
pub struct Sorter {
    notifications: bool,
    timings: bool,
}

impl Sorter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log an INFO notification at the end of each sort phase.
    pub fn enable_notifications(&mut self) {
        self.notifications = true;
    }

    /// Log the timing report when a sort completes.
    pub fn enable_timings(&mut self) {
        self.timings = true;
    }

    /// Sorts `sortin` into `sortout` entirely in memory; unstable ordering.
    pub fn sort_file_in_memory(
        &self,
        sortin: &Path,
        sortout: &Path,
        key_offset: usize,
        key_len: usize,
        ascending: bool,
        pm_enabled: bool,
    ) -> Result<SortSummary, SortError> {
        self.run_in_memory(sortin, sortout, key_offset, key_len, false, ascending, pm_enabled)
    }

    /// Stable in-memory sort: records with equal keys keep their input order.
    pub fn sort_stable_file_in_memory(
        &self,
        sortin: &Path,
        sortout: &Path,
        key_offset: usize,
        key_len: usize,
        ascending: bool,
        pm_enabled: bool,
    ) -> Result<SortSummary, SortError> {
        self.run_in_memory(sortin, sortout, key_offset, key_len, true, ascending, pm_enabled)
    }

    /// Sorts `sortin` into `sortout` keeping only keys and record offsets in
    /// memory; unstable ordering. Slower than the in-memory model because
    /// every record is re-read on output.
    pub fn sort_file_on_disk(
        &self,
        sortin: &Path,
        sortout: &Path,
        max_recl: usize,
        key_offset: usize,
        key_len: usize,
        ascending: bool,
        pm_enabled: bool,
    ) -> Result<SortSummary, SortError> {
        self.run_on_disk(
            sortin, sortout, max_recl, key_offset, key_len, false, ascending, pm_enabled,
        )
    }

    /// Stable on-disk sort.
    pub fn sort_stable_file_on_disk(
        &self,
        sortin: &Path,
        sortout: &Path,
        max_recl: usize,
        key_offset: usize,
        key_len: usize,
        ascending: bool,
        pm_enabled: bool,
    ) -> Result<SortSummary, SortError> {
        self.run_on_disk(
            sortin, sortout, max_recl, key_offset, key_len, true, ascending, pm_enabled,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn run_in_memory(
        &self,
        sortin: &Path,
        sortout: &Path,
        key_offset: usize,
        key_len: usize,
        stable: bool,
        ascending: bool,
        pm_enabled: bool,
    ) -> Result<SortSummary, SortError> {
        let mut stats = SortStats::new();

        stats.start_load();
        let buf = load_sort_input(sortin)?;
        stats.finish_load();

        // The sort timing starts once the data is resident.
        stats.start_sort();

        let mut records = buf.split_inclusive(|&b| b == b'\n');
        let first = records.next().ok_or_else(|| SortError::EmptyInput {
            path: sortin.to_path_buf(),
        })?;
        let key = key_window(first, 1, key_offset, key_len, usize::MAX)?;
        let mut sp = Splitter::new(key, first, key_len, stats);

        sp.stats_mut().start_input();
        let mut recno = 1usize;
        for rec in records {
            recno += 1;
            let key = key_window(rec, recno, key_offset, key_len, usize::MAX)?;
            if stable {
                sp.add_stable(key, rec, ascending, pm_enabled);
            } else {
                sp.add(key, rec, pm_enabled);
            }
        }
        sp.stats_mut().finish_input();
        if self.notifications {
            info!("sort input phase has completed");
        }

        let sorted = if stable {
            sp.end_of_stable_input(ascending)
        } else {
            sp.end_of_input()
        };
        if self.notifications {
            info!("sort merge phase has completed");
        }
        if !sp.is_output_valid() {
            return Err(SortError::OutputInvalid {
                expected: sp.record_count(),
                actual: sorted,
            });
        }

        sp.stats_mut().start_output();
        let mut out = Vec::with_capacity(buf.len());
        if ascending {
            let mut cur = sp.lowest();
            loop {
                out.extend_from_slice(cur.payload());
                if cur >= sp.highest() {
                    break;
                }
                cur.advance();
            }
        } else {
            let mut cur = sp.highest();
            loop {
                out.extend_from_slice(cur.payload());
                if cur <= sp.lowest() {
                    break;
                }
                cur.retreat();
            }
        }
        sp.stats_mut().finish_output();
        sp.stats_mut().finish_sort();
        if self.notifications {
            info!("sort output phase completed");
        }

        sp.stats_mut().start_store();
        fs::write(sortout, &out)?;
        sp.stats_mut().finish_store();

        if self.timings {
            info!("{}", sp.stats().render());
        }
        Ok(summarize(sorted, sp.stats()))
    }

    #[allow(clippy::too_many_arguments)]
    fn run_on_disk(
        &self,
        sortin: &Path,
        sortout: &Path,
        max_recl: usize,
        key_offset: usize,
        key_len: usize,
        stable: bool,
        ascending: bool,
        pm_enabled: bool,
    ) -> Result<SortSummary, SortError> {
        warn!("this sort is being performed on-disk, do not use the timings for benchmarks");

        let mut stats = SortStats::new();
        let mut reader = BufReader::new(File::open(sortin)?);
        let mut line: Vec<u8> = Vec::with_capacity(max_recl.min(64 * 1024));

        stats.start_sort();

        let consumed = reader.read_until(b'\n', &mut line)?;
        if consumed == 0 {
            return Err(SortError::EmptyInput {
                path: sortin.to_path_buf(),
            });
        }
        let key = key_window(&line, 1, key_offset, key_len, max_recl)?;
        let mut sp = Splitter::with_keystore(key, 0u64, key_len, KEYSTORE_ARENA_KB, stats);
        let mut pos = consumed as u64;

        sp.stats_mut().start_input();
        let mut recno = 1usize;
        loop {
            line.clear();
            let consumed = reader.read_until(b'\n', &mut line)?;
            if consumed == 0 {
                break;
            }
            let offset = pos;
            pos += consumed as u64;
            // A bare terminator at end-of-file is not a record.
            if strip_eol(&line).is_empty() && reader.fill_buf()?.is_empty() {
                break;
            }
            recno += 1;
            let key = key_window(&line, recno, key_offset, key_len, max_recl)?;
            if stable {
                sp.add_stable_external(key, offset, ascending, pm_enabled);
            } else {
                sp.add_external(key, offset, pm_enabled);
            }
        }
        sp.stats_mut().finish_input();
        if self.notifications {
            info!("sort input phase has completed");
        }

        let sorted = if stable {
            sp.end_of_stable_input(ascending)
        } else {
            sp.end_of_input()
        };
        if self.notifications {
            info!("sort merge phase has completed");
        }
        if !sp.is_output_valid() {
            return Err(SortError::OutputInvalid {
                expected: sp.record_count(),
                actual: sorted,
            });
        }

        sp.stats_mut().start_output();
        let mut writer = BufWriter::new(File::create(sortout)?);
        if ascending {
            let mut cur = sp.lowest();
            loop {
                emit_record(&mut reader, &mut writer, &mut line, cur.payload())?;
                if cur >= sp.highest() {
                    break;
                }
                cur.advance();
            }
        } else {
            let mut cur = sp.highest();
            loop {
                emit_record(&mut reader, &mut writer, &mut line, cur.payload())?;
                if cur <= sp.lowest() {
                    break;
                }
                cur.retreat();
            }
        }
        writer.flush()?;
        sp.stats_mut().finish_output();
        sp.stats_mut().finish_sort();
        if self.notifications {
            info!("sort output phase completed");
        }

        if self.timings {
            info!("{}", sp.stats().render());
        }
        Ok(summarize(sorted, sp.stats()))
    }
}

/// Seeks to a record by offset, re-reads it, and writes it out with a single
/// trailing newline regardless of the input's line convention.
fn emit_record<R: Read + Seek, W: Write>(
    reader: &mut BufReader<R>,
    writer: &mut W,
    line: &mut Vec<u8>,
    offset: u64,
) -> Result<(), SortError> {
    reader.seek(SeekFrom::Start(offset))?;
    line.clear();
    reader.read_until(b'\n', line)?;
    writer.write_all(strip_eol(line))?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Loads the sort input and normalizes the end-of-file: spurious empty
/// records are stripped from the end and the last record is re-terminated
/// with the file's own line convention.
fn load_sort_input(path: &Path) -> Result<Vec<u8>, SortError> {
    let mut buf = fs::read(path)?;
    if buf.is_empty() {
        return Err(SortError::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    let crlf = match buf.iter().position(|&b| b == b'\n') {
        None | Some(0) => return Ok(buf),
        Some(i) => buf[i - 1] == b'\r',
    };
    while buf.last().is_some_and(|&b| b == b'\n' || b == b'\r') {
        buf.pop();
    }
    if buf.is_empty() {
        return Err(SortError::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    if crlf {
        buf.extend_from_slice(b"\r\n");
    } else {
        buf.push(b'\n');
    }
    Ok(buf)
}

fn strip_eol(rec: &[u8]) -> &[u8] {
    let mut end = rec.len();
    while end > 0 && (rec[end - 1] == b'\n' || rec[end - 1] == b'\r') {
        end -= 1;
    }
    &rec[..end]
}

/// Validates that `rec` (terminator included) can carry the configured key
/// and returns the key bytes.
fn key_window<'a>(
    rec: &'a [u8],
    record: usize,
    key_offset: usize,
    key_len: usize,
    max_recl: usize,
) -> Result<&'a [u8], SortError> {
    let content = strip_eol(rec);
    if content.len() > max_recl {
        return Err(SortError::RecordTooLong {
            record,
            len: content.len(),
            max_recl,
        });
    }
    if content.len() < key_offset + key_len {
        return Err(SortError::KeyBeyondRecord {
            record,
            record_len: content.len(),
            key_end: key_offset + key_len,
        });
    }
    Ok(&content[key_offset..key_offset + key_len])
}

fn summarize(records: usize, stats: &SortStats) -> SortSummary {
    let c = stats.counters();
    SortSummary {
        records,
        compares: c.compares,
        lo_hits: c.lo_hits,
        hi_hits: c.hi_hits,
        new_stores: c.new_stores,
        preemptive_merges: c.pms,
        sort_rate_kps: stats.sort_rate(),
        load: stats.load_phase(),
        input: stats.input_phase(),
        preemptive_merge: stats.pm_phase(),
        final_merge: stats.fm_phase(),
        output: stats.output_phase(),
        store: stats.store_phase(),
        sort: stats.sort_phase(),
    }
}
