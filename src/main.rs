//! ugsort command-line testbed.
//!
//! ```text
//! ugsort <in> <out> [-pm | -nopm] [-inmem | -ondisk] [-maxrecl:N]
//!                   [-skoffset:N] [-sklen:N] [-ska | -skd] [-sks]
//! ```

use std::process::ExitCode;

use log::{error, info};

use ugsort::{MemoryModel, SortConfig, Sorter};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cfg = match SortConfig::from_args(std::env::args().skip(1)) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}");
            error!(
                "usage: ugsort <in> <out> [-pm|-nopm] [-inmem|-ondisk] [-maxrecl:N] \
                 [-skoffset:N] [-sklen:N] [-ska|-skd] [-sks]"
            );
            return ExitCode::FAILURE;
        }
    };

    let input_size = match std::fs::metadata(&cfg.sortin) {
        Ok(m) => m.len(),
        Err(e) => {
            error!("sort input file '{}' cannot be accessed: {e}", cfg.sortin.display());
            return ExitCode::FAILURE;
        }
    };
    info!("sort input file: '{}', size: {input_size}", cfg.sortin.display());
    info!("sort output file: '{}'", cfg.sortout.display());

    let model = cfg.resolve_model(input_size);
    match model {
        MemoryModel::InMemory => info!("the sort will be processed in-memory"),
        MemoryModel::OnDisk => info!("the sort will be processed on-disk"),
    }
    info!(
        "the sort will be on a key of length: {} at offset: {}, sequence: {}{}",
        cfg.key_len,
        cfg.key_offset,
        if cfg.ascending { "ascending" } else { "descending" },
        if cfg.stable { ", stable for duplicate keys" } else { "" }
    );
    info!(
        "preemptive merging is {}",
        if cfg.pm_enabled { "enabled" } else { "NOT enabled" }
    );

    let mut sorter = Sorter::new();
    sorter.enable_notifications();
    sorter.enable_timings();

    let result = match (cfg.stable, model) {
        (false, MemoryModel::InMemory) => sorter.sort_file_in_memory(
            &cfg.sortin,
            &cfg.sortout,
            cfg.key_offset,
            cfg.key_len,
            cfg.ascending,
            cfg.pm_enabled,
        ),
        (false, MemoryModel::OnDisk) => sorter.sort_file_on_disk(
            &cfg.sortin,
            &cfg.sortout,
            cfg.max_recl,
            cfg.key_offset,
            cfg.key_len,
            cfg.ascending,
            cfg.pm_enabled,
        ),
        (true, MemoryModel::InMemory) => sorter.sort_stable_file_in_memory(
            &cfg.sortin,
            &cfg.sortout,
            cfg.key_offset,
            cfg.key_len,
            cfg.ascending,
            cfg.pm_enabled,
        ),
        (true, MemoryModel::OnDisk) => sorter.sort_stable_file_on_disk(
            &cfg.sortin,
            &cfg.sortout,
            cfg.max_recl,
            cfg.key_offset,
            cfg.key_len,
            cfg.ascending,
            cfg.pm_enabled,
        ),
    };

    match result {
        Ok(summary) => {
            info!("the sort operation has completed: {} records", summary.records);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("the requested sort could not be completed: {e}");
            ExitCode::FAILURE
        }
    }
}
