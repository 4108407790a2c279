// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Readiness handshake demo child.
//
// Usage:
//   demo_ready_child <delay_ms>
//
// Pretends to initialise for <delay_ms>, signals readiness on fd 3, then
// idles until SIGINT/SIGTERM and exits 0.

use std::process::ExitCode;
use std::time::Duration;

use sysvipc::clock::{sleep_for, sleep_until};
use sysvipc::{CurrentProcess, MonotonicTime, Termination};

const IDLE_TICK: Duration = Duration::from_secs(1);

fn run(delay: Duration) -> sysvipc::Result<()> {
    let termination = Termination::install_handlers()?;

    sleep_for(delay, &termination)?;
    CurrentProcess::signal_ready()?;
    tracing::debug!(pid = CurrentProcess::pid(), "ready");

    let mut next = MonotonicTime::now();
    loop {
        next += IDLE_TICK;
        match sleep_until(next, &termination) {
            Ok(()) => {}
            Err(e) if e.is_interrupted() => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

fn main() -> ExitCode {
    sysvipc::init_tracing();
    let args: Vec<String> = std::env::args().collect();
    let delay_ms = match args.get(1).map(|s| s.parse::<u64>()) {
        Some(Ok(ms)) if args.len() == 2 => ms,
        _ => {
            eprintln!("usage: demo_ready_child <delay_ms>");
            return ExitCode::FAILURE;
        }
    };

    match run(Duration::from_millis(delay_ms)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "ready child failed");
            ExitCode::FAILURE
        }
    }
}
