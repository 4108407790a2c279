// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Coordinator: owns every shared object and the lifetime of its children.
//
// Usage:
//   demo_coordinator [producers] [records_per_producer]
//
// 1. creates the coordination semaphore set and shared state segment
// 2. starts demo_log_broker and waits for its readiness byte
// 3. starts the producers and waits for all of them
// 4. waits for the broker to drain the queue, then SIGTERMs it
// 5. checks the shared tally and removes the objects it created
//
// demo_log_broker and demo_log_producer are looked up next to this binary.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use sysvipc::clock::sleep_for;
use sysvipc::config::{SemaphoreId, SharedState};
use sysvipc::{
    Error, IpcConfig, MessageQueue, MonotonicTime, Process, Resource, SemaphoreSet, SharedMemory,
    Target, Termination,
};

const DEFAULT_PRODUCERS: u32 = 3;
const DEFAULT_RECORDS: u64 = 10;
const DRAIN_POLL: Duration = Duration::from_millis(10);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

fn sibling(name: &str) -> sysvipc::Result<String> {
    let exe = std::env::current_exe()
        .map_err(|e| Error::from_io(Target::new(Resource::Process), e))?;
    let path: PathBuf = exe.with_file_name(name);
    path.into_os_string().into_string().map_err(|p| {
        Error::invalid(
            Target::new(Resource::Process),
            format!("non UTF-8 path {p:?}"),
        )
    })
}

/// Block until the broker has consumed everything or `DRAIN_TIMEOUT` passes.
fn wait_for_drain(config: &IpcConfig, termination: &Termination) -> sysvipc::Result<()> {
    let queue = MessageQueue::get(config.log_queue_key)?;
    let deadline = MonotonicTime::now() + DRAIN_TIMEOUT;
    while queue.pending()? > 0 {
        if MonotonicTime::now() >= deadline {
            tracing::warn!(pending = queue.pending()?, "broker did not drain in time");
            return Ok(());
        }
        sleep_for(DRAIN_POLL, termination)?;
    }
    Ok(())
}

fn run(producers: u32, records: u64) -> sysvipc::Result<bool> {
    let termination = Termination::install_handlers()?;
    let config = IpcConfig::from_env()?;

    let mut sems = SemaphoreSet::<SemaphoreId>::create(
        config.semaphore_key,
        &SemaphoreId::INITIAL,
        config.permissions,
    )?
    .with_termination(termination);
    let mut state = SharedMemory::<SharedState>::create(config.shared_memory_key, config.permissions)?;

    let mut broker = Process::create_ready(&[sibling("demo_log_broker")?])?;
    tracing::info!(pid = broker.pid(), "broker ready");

    let producer_exe = sibling("demo_log_producer")?;
    let mut children = Vec::with_capacity(producers as usize);
    for i in 0..producers {
        let name = format!("producer-{i}");
        let child = Process::create(&[producer_exe.clone(), name, records.to_string()])?
            .with_termination(termination);
        children.push(child);
    }

    let mut all_ok = true;
    for child in &mut children {
        let pid = child.pid();
        let status = child.wait()?;
        if !status.success() {
            tracing::warn!(pid, ?status, "producer failed");
            all_ok = false;
        }
    }

    wait_for_drain(&config, &termination)?;
    let status = broker.term_wait()?;
    tracing::info!(?status, "broker stopped");
    all_ok &= status.success();

    let lock = sems.semaphore(SemaphoreId::StateLock);
    lock.wait()?;
    let tally = state.read()?;
    lock.signal()?;

    let expected = u64::from(producers) * records;
    tracing::info!(
        produced = tally.produced,
        expected,
        done = tally.producers_done,
        "final tally"
    );
    all_ok &= tally.produced == expected && tally.producers_done == producers;

    state.remove()?;
    sems.remove()?;
    Ok(all_ok)
}

fn parse_arg<T: std::str::FromStr>(arg: Option<&String>, default: T) -> Option<T> {
    match arg {
        None => Some(default),
        Some(s) => s.parse().ok(),
    }
}

fn main() -> ExitCode {
    sysvipc::init_tracing();
    let args: Vec<String> = std::env::args().collect();
    let (Some(producers), Some(records)) = (
        parse_arg(args.get(1), DEFAULT_PRODUCERS),
        parse_arg(args.get(2), DEFAULT_RECORDS),
    ) else {
        eprintln!("usage: demo_coordinator [producers] [records_per_producer]");
        return ExitCode::FAILURE;
    };

    match run(producers, records) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) if e.is_interrupted() => {
            tracing::warn!("interrupted before completion, shutdown was partial");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "coordinator failed");
            ExitCode::FAILURE
        }
    }
}
