// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Log aggregation over one message queue: many `Logger`s post fixed-layout
// records, a single `LogBroker` owns the queue, drains it and prints.

use std::fmt;
use std::io::Write;

use chrono::{DateTime, Local};

use crate::config::IpcConfig;
use crate::error::{Error, Resource, Result, Target};
use crate::key::Key;
use crate::msg_queue::{MessageQueue, MessageType};
use crate::plain::{copy_str_to_array, str_from_array, Plain};
use crate::process::CurrentProcess;
use crate::termination::Termination;

pub const SENDER_CAPACITY: usize = 32;
pub const MESSAGE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
}

impl LogLevel {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(LogLevel::Debug),
            1 => Some(LogLevel::Info),
            2 => Some(LogLevel::Warning),
            3 => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One log line as it travels through the queue. Text fields are
/// NUL-padded and truncated to leave room for a terminator.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct LogRecord {
    level: u8,
    _pad0: [u8; 3],
    pid: i32,
    sender: [u8; SENDER_CAPACITY],
    message: [u8; MESSAGE_CAPACITY],
    timestamp_secs: i64,
    timestamp_nanos: u32,
    _pad1: u32,
}

// repr(C), explicit padding, integers and byte arrays only.
unsafe impl Plain for LogRecord {}

impl LogRecord {
    pub fn new(level: LogLevel, sender: &str, message: &str, pid: i32, at: DateTime<Local>) -> Self {
        let mut rec = Self {
            level: level as u8,
            _pad0: [0; 3],
            pid,
            sender: [0; SENDER_CAPACITY],
            message: [0; MESSAGE_CAPACITY],
            timestamp_secs: at.timestamp(),
            timestamp_nanos: at.timestamp_subsec_nanos(),
            _pad1: 0,
        };
        copy_str_to_array(sender, &mut rec.sender);
        copy_str_to_array(message, &mut rec.message);
        rec
    }

    /// Unknown raw levels (from a mismatched sender) read as `Error`.
    pub fn level(&self) -> LogLevel {
        LogLevel::from_raw(self.level).unwrap_or(LogLevel::Error)
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn sender(&self) -> std::borrow::Cow<'_, str> {
        str_from_array(&self.sender)
    }

    pub fn message(&self) -> std::borrow::Cow<'_, str> {
        str_from_array(&self.message)
    }

    pub fn timestamp(&self) -> Option<DateTime<Local>> {
        DateTime::from_timestamp(self.timestamp_secs, self.timestamp_nanos)
            .map(|utc| utc.with_timezone(&Local))
    }
}

impl fmt::Debug for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRecord")
            .field("level", &self.level())
            .field("pid", &self.pid)
            .field("sender", &self.sender())
            .field("message", &self.message())
            .finish()
    }
}

/// `[YYYY-MM-DD HH:MM:SS] LEVEL sender(pid): message`
impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestamp() {
            Some(ts) => write!(f, "[{}] ", ts.format("%Y-%m-%d %H:%M:%S"))?,
            None => f.write_str("[????-??-?? ??:??:??] ")?,
        }
        write!(
            f,
            "{} {}({}): {}",
            self.level(),
            self.sender(),
            self.pid,
            self.message()
        )
    }
}

/// Producer side: a non-owning queue handle bound to a sender name.
#[derive(Debug)]
pub struct Logger {
    name: String,
    pid: i32,
    queue: MessageQueue,
}

impl Logger {
    /// Look up the broker's queue by key.
    pub fn connect(name: &str, key: Key) -> Result<Self> {
        let queue = MessageQueue::get(key)?;
        Ok(Self::from_queue(name, &queue))
    }

    /// Look up the queue named by `config`.
    pub fn from_config(name: &str, config: &IpcConfig) -> Result<Self> {
        Self::connect(name, config.log_queue_key)
    }

    /// Bind to an already opened queue. The logger only ever holds a copy.
    pub fn from_queue(name: &str, queue: &MessageQueue) -> Self {
        let mut truncated = [0u8; SENDER_CAPACITY];
        copy_str_to_array(name, &mut truncated);
        Self {
            name: str_from_array(&truncated).into_owned(),
            pid: CurrentProcess::pid(),
            queue: queue.copy(),
        }
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.queue = self.queue.with_termination(termination);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self, level: LogLevel, message: &str) -> Result<()> {
        let rec = LogRecord::new(level, &self.name, message, self.pid, Local::now());
        self.queue.send(rec, MessageType::LOG, true)
    }

    pub fn debug(&self, message: &str) -> Result<()> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> Result<()> {
        self.log(LogLevel::Info, message)
    }

    pub fn warning(&self, message: &str) -> Result<()> {
        self.log(LogLevel::Warning, message)
    }

    pub fn error(&self, message: &str) -> Result<()> {
        self.log(LogLevel::Error, message)
    }
}

/// Consumer side: owns the queue and is the only process that removes it.
#[derive(Debug)]
pub struct LogBroker {
    queue: MessageQueue,
}

impl LogBroker {
    /// Create the log queue. Fails with `AlreadyExists` if another broker
    /// (or a stale queue) holds the key.
    pub fn create(key: Key, permissions: u32) -> Result<Self> {
        Ok(Self {
            queue: MessageQueue::create(key, permissions)?,
        })
    }

    /// Create the queue named by `config`.
    pub fn from_config(config: &IpcConfig) -> Result<Self> {
        Self::create(config.log_queue_key, config.permissions)
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.queue = self.queue.with_termination(termination);
        self
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    /// A logger posting to this broker from the current process.
    pub fn logger(&self, name: &str) -> Logger {
        Logger::from_queue(name, &self.queue)
    }

    /// Block for the next record.
    pub fn receive(&self) -> Result<LogRecord> {
        self.queue.receive(MessageType::LOG, true)
    }

    /// Print records until termination is requested.
    ///
    /// Returning because of a termination request is a normal shutdown and
    /// yields `Ok(())`; any other failure is returned as is.
    pub fn run<W: Write>(&self, out: &mut W) -> Result<()> {
        loop {
            match self.receive() {
                Ok(rec) => write_record(out, &rec)?,
                Err(e) if e.is_interrupted() => {
                    tracing::debug!("log broker interrupted, shutting down");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Print whatever is queued right now without blocking. Returns how many
    /// records were written.
    pub fn drain<W: Write>(&self, out: &mut W) -> Result<usize> {
        let mut n = 0;
        loop {
            match self.queue.try_receive::<LogRecord>(MessageType::LOG) {
                Ok(rec) => {
                    write_record(out, &rec)?;
                    n += 1;
                }
                Err(Error::WouldBlock { .. }) => return Ok(n),
                Err(e) => return Err(e),
            }
        }
    }

    /// Remove the queue now instead of on drop.
    pub fn remove(&mut self) -> Result<()> {
        self.queue.remove()
    }
}

fn write_record<W: Write>(out: &mut W, rec: &LogRecord) -> Result<()> {
    writeln!(out, "{rec}")
        .and_then(|()| out.flush())
        .map_err(|source| Error::Os {
            target: Target::new(Resource::LogOutput),
            source,
        })
}
