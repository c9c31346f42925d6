//! Run configuration: defaults, command-line switch parsing, and the
//! memory-model resolution rule.

use std::path::PathBuf;

use log::warn;

use crate::error::SortError;

/// Key length assumed when none is specified.
const DEFAULT_SORT_KEY_LENGTH: usize = 32;
/// Floor for the maximum record length.
const MIN_MAX_RECL: usize = 16 * 1024;
/// Inputs at most this size are sorted in memory when no model is forced.
const IN_MEMORY_LIMIT: u64 = 1024 * 1024 * 1024;

/// Where the working set lives during the sort.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MemoryModel {
    InMemory,
    OnDisk,
}

/// A validated sort request.
///
/// Switch syntax follows the testbed convention: `-pm`/`-nopm`,
/// `-inmem`/`-ondisk`, `-maxrecl:N`, `-skoffset:N`, `-sklen:N`, `-ska`/`-skd`
/// for ascending/descending, and `-sks` for a stable sequence.
#[derive(Debug, Clone)]
pub struct SortConfig {
    pub sortin: PathBuf,
    pub sortout: PathBuf,
    pub max_recl: usize,
    pub key_offset: usize,
    pub key_len: usize,
    pub ascending: bool,
    pub stable: bool,
    pub pm_enabled: bool,
    pub model: Option<MemoryModel>,
}

impl SortConfig {
    /// Parses `<in> <out> [switches]`, applying defaults and clamps.
    pub fn from_args<I>(args: I) -> Result<Self, SortError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut positional: Vec<String> = Vec::new();
        let mut cfg = Self {
            sortin: PathBuf::new(),
            sortout: PathBuf::new(),
            max_recl: MIN_MAX_RECL,
            key_offset: 0,
            key_len: 0,
            ascending: true,
            stable: false,
            pm_enabled: true,
            model: None,
        };

        for arg in args {
            if !arg.starts_with('-') {
                positional.push(arg);
                continue;
            }
            let lower = arg.to_ascii_lowercase();
            match lower.as_str() {
                "-pm" => cfg.pm_enabled = true,
                "-nopm" => cfg.pm_enabled = false,
                "-inmem" => cfg.model = Some(MemoryModel::InMemory),
                "-ondisk" => cfg.model = Some(MemoryModel::OnDisk),
                "-ska" => cfg.ascending = true,
                "-skd" => cfg.ascending = false,
                "-sks" => cfg.stable = true,
                _ => {
                    if let Some(v) = lower.strip_prefix("-maxrecl:") {
                        cfg.max_recl = parse_num(&arg, v)?;
                    } else if let Some(v) = lower.strip_prefix("-skoffset:") {
                        cfg.key_offset = parse_num(&arg, v)?;
                    } else if let Some(v) = lower.strip_prefix("-sklen:") {
                        cfg.key_len = parse_num(&arg, v)?;
                    } else {
                        return Err(SortError::Config(format!("unrecognized switch '{arg}'")));
                    }
                }
            }
        }

        match positional.len() {
            2 => {
                cfg.sortin = PathBuf::from(&positional[0]);
                cfg.sortout = PathBuf::from(&positional[1]);
            }
            n => {
                return Err(SortError::Config(format!(
                    "expected a sort input and a sort output file, got {n} file name(s)"
                )));
            }
        }

        cfg.validate();
        Ok(cfg)
    }

    fn validate(&mut self) {
        if self.key_len == 0 {
            warn!(
                "no sort key length was specified, using the default: {DEFAULT_SORT_KEY_LENGTH}"
            );
            self.key_len = DEFAULT_SORT_KEY_LENGTH;
        }
        if self.max_recl < MIN_MAX_RECL {
            self.max_recl = MIN_MAX_RECL;
        }
    }

    /// Picks the memory model: an explicit switch wins, otherwise inputs up
    /// to 1 GiB are sorted in memory.
    pub fn resolve_model(&self, input_size: u64) -> MemoryModel {
        match self.model {
            Some(m) => m,
            None => {
                if input_size <= IN_MEMORY_LIMIT {
                    MemoryModel::InMemory
                } else {
                    MemoryModel::OnDisk
                }
            }
        }
    }
}

fn parse_num(switch: &str, value: &str) -> Result<usize, SortError> {
    value
        .parse()
        .map_err(|_| SortError::Config(format!("switch '{switch}' needs a numeric value")))
}
