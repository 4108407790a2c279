// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Ownership-tracked System V IPC (message queues, semaphore sets, shared
// memory) plus the process plumbing cooperating programs need: fork/exec
// with a readiness handshake, termination-aware blocking calls, and a
// log broker built on a message queue.
//
// Every kernel object handle records whether it owns the object. Owning
// handles remove it when dropped; copies never do.

pub mod error;
pub use error::{Error, Resource, Result, Target};

pub mod key;
pub use key::Key;

pub mod termination;
pub use termination::Termination;

mod platform;
mod handle;

pub mod plain;
pub use plain::Plain;

pub mod msg_queue;
pub use msg_queue::{MessageQueue, MessageType};

pub mod semaphore;
pub use semaphore::{Semaphore, SemaphoreSet, SemaphoreSlot};

pub mod shared_memory;
pub use shared_memory::SharedMemory;

pub mod pipe;
pub use pipe::{PipeReader, PipeWriter};

pub mod process;
pub use process::{CurrentProcess, Process, SignalSet, WaitStatus, READY_FD, TERM_GRACE};

pub mod clock;
pub use clock::MonotonicTime;

pub mod monitor;
pub use monitor::Monitor;

pub mod config;
pub use config::IpcConfig;

pub mod log;
pub use log::{LogBroker, LogLevel, LogRecord, Logger};

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber writing to stderr, filtered by `RUST_LOG`
/// (default `info`). Stdout stays free for program output.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
