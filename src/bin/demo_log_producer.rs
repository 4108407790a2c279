// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Log producer process.
//
// Usage:
//   demo_log_producer <name> <count>
//
// Posts <count> records to the broker's queue under sender <name>. If the
// coordination semaphore set and shared state segment exist, each record
// is also counted in `SharedState::produced` under the state lock.

use std::process::ExitCode;

use sysvipc::config::{SemaphoreId, SharedState};
use sysvipc::{IpcConfig, LogLevel, Logger, SemaphoreSet, SharedMemory, Termination};

/// Shared counters, present only when run under the coordinator.
struct Tally {
    set: SemaphoreSet<SemaphoreId>,
    state: SharedMemory<SharedState>,
}

impl Tally {
    fn open(config: &IpcConfig, termination: Termination) -> sysvipc::Result<Option<Self>> {
        let set = match SemaphoreSet::get(config.semaphore_key) {
            Ok(set) => set.with_termination(termination),
            Err(sysvipc::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut state = SharedMemory::get(config.shared_memory_key)?;
        state.attach()?;
        Ok(Some(Self { set, state }))
    }

    fn locked<R>(&self, f: impl FnOnce(&mut SharedState) -> R) -> sysvipc::Result<R> {
        let lock = self.set.semaphore(SemaphoreId::StateLock);
        lock.wait()?;
        let r = self.state.update(f);
        lock.signal()?;
        r
    }
}

fn level_for(i: u64) -> LogLevel {
    match i % 4 {
        0 => LogLevel::Debug,
        1 => LogLevel::Info,
        2 => LogLevel::Warning,
        _ => LogLevel::Error,
    }
}

fn run(name: &str, count: u64) -> sysvipc::Result<()> {
    let termination = Termination::install_handlers()?;
    let config = IpcConfig::from_env()?;
    let logger = Logger::from_config(name, &config)?.with_termination(termination);
    let tally = Tally::open(&config, termination)?;

    for i in 0..count {
        logger.log(level_for(i), &format!("record {i} of {count}"))?;
        if let Some(t) = &tally {
            t.locked(|s| s.produced += 1)?;
        }
    }
    if let Some(t) = &tally {
        t.locked(|s| s.producers_done += 1)?;
    }
    tracing::debug!(name, count, "producer done");
    Ok(())
}

fn main() -> ExitCode {
    sysvipc::init_tracing();
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("usage: demo_log_producer <name> <count>");
        return ExitCode::FAILURE;
    }
    let Ok(count) = args[2].parse::<u64>() else {
        eprintln!("count must be a non-negative integer, got {:?}", args[2]);
        return ExitCode::FAILURE;
    };

    match run(&args[1], count) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "producer failed");
            ExitCode::FAILURE
        }
    }
}
