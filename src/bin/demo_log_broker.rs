// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Log broker process.
//
// Usage:
//   demo_log_broker
//
// Creates the log queue (key from SYSVIPC_LOG_QUEUE_KEY, default 33889),
// signals readiness on fd 3 when started through `Process::create_ready`,
// then prints every record to stdout until SIGINT/SIGTERM. The queue is
// removed on exit.

use std::io;
use std::process::ExitCode;

use sysvipc::{CurrentProcess, IpcConfig, LogBroker, Termination};

fn run() -> sysvipc::Result<()> {
    let termination = Termination::install_handlers()?;
    let config = IpcConfig::from_env()?;

    let broker = LogBroker::from_config(&config)?.with_termination(termination);
    tracing::info!(key = %config.log_queue_key, "log broker up");

    // Started by hand there is no readiness pipe; that is not an error.
    if let Err(e) = CurrentProcess::signal_ready() {
        tracing::debug!(error = %e, "no readiness pipe");
    }

    let stdout = io::stdout();
    broker.run(&mut stdout.lock())?;
    tracing::info!("log broker shutting down");
    Ok(())
}

fn main() -> ExitCode {
    sysvipc::init_tracing();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "log broker failed");
            ExitCode::FAILURE
        }
    }
}
