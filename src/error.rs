// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error taxonomy shared by every IPC wrapper, the pipe helpers and process
// control.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::key::Key;

/// Kind of object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    MessageQueue,
    SemaphoreSet,
    SharedMemory,
    Process,
    Pipe,
    Clock,
    Config,
    LogOutput,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::MessageQueue => "message queue",
            Resource::SemaphoreSet => "semaphore set",
            Resource::SharedMemory => "shared memory",
            Resource::Process => "process",
            Resource::Pipe => "pipe",
            Resource::Clock => "clock",
            Resource::Config => "config",
            Resource::LogOutput => "log output",
        })
    }
}

/// The object an operation failed on: its kind plus whatever identifies it.
///
/// The key survives in non-owning copies, so errors raised through a copy
/// still name the key the object was created under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub resource: Resource,
    pub key: Option<Key>,
    /// Kernel object id, pid or file descriptor depending on `resource`.
    pub id: Option<i32>,
}

impl Target {
    pub const fn new(resource: Resource) -> Self {
        Self {
            resource,
            key: None,
            id: None,
        }
    }

    pub const fn with_key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    pub const fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource)?;
        if let Some(key) = self.key {
            write!(f, " key {key}")?;
        }
        if let Some(id) = self.id {
            let label = match self.resource {
                Resource::Process => "pid",
                Resource::Pipe => "fd",
                _ => "id",
            };
            write!(f, " {label} {id}")?;
        }
        Ok(())
    }
}

/// Errors returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An object already exists for the requested key.
    #[error("{target}: already exists")]
    AlreadyExists { target: Target },

    /// No object exists for the requested key.
    #[error("{target}: not found")]
    NotFound { target: Target },

    /// The caller lacks the permissions the object was created with.
    #[error("{target}: permission denied")]
    PermissionDenied { target: Target },

    /// An argument was rejected, either locally or by the kernel.
    #[error("{target}: invalid argument: {reason}")]
    InvalidArgument { target: Target, reason: String },

    /// A non-blocking call had nothing to do.
    #[error("{target}: operation would block")]
    WouldBlock { target: Target },

    /// A blocking call was abandoned because termination was requested.
    #[error("{target}: interrupted by termination request")]
    Interrupted { target: Target },

    /// Any other OS failure.
    #[error("{target}: {source}")]
    Os {
        target: Target,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Classify a raw errno reported while operating on `target`.
    pub fn from_errno(target: Target, errno: i32) -> Self {
        match errno {
            libc::EEXIST => Error::AlreadyExists { target },
            libc::ENOENT => Error::NotFound { target },
            libc::EACCES | libc::EPERM => Error::PermissionDenied { target },
            libc::EINVAL => Error::InvalidArgument {
                target,
                reason: io::Error::from_raw_os_error(errno).to_string(),
            },
            libc::ENOMSG => Error::WouldBlock { target },
            e if e == libc::EAGAIN || e == libc::EWOULDBLOCK => Error::WouldBlock { target },
            libc::EINTR => Error::Interrupted { target },
            _ => Error::Os {
                target,
                source: io::Error::from_raw_os_error(errno),
            },
        }
    }

    /// Classify an `io::Error` produced by the platform layer.
    pub fn from_io(target: Target, err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(errno) => Self::from_errno(target, errno),
            None => Error::Os { target, source: err },
        }
    }

    pub fn invalid(target: Target, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            target,
            reason: reason.into(),
        }
    }

    /// The object this error refers to.
    pub fn target(&self) -> &Target {
        match self {
            Error::AlreadyExists { target }
            | Error::NotFound { target }
            | Error::PermissionDenied { target }
            | Error::InvalidArgument { target, .. }
            | Error::WouldBlock { target }
            | Error::Interrupted { target }
            | Error::Os { target, .. } => target,
        }
    }

    /// The errno behind this error, if it came from the OS.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::AlreadyExists { .. } => Some(libc::EEXIST),
            Error::NotFound { .. } => Some(libc::ENOENT),
            Error::PermissionDenied { .. } => Some(libc::EACCES),
            Error::WouldBlock { .. } => Some(libc::EAGAIN),
            Error::Interrupted { .. } => Some(libc::EINTR),
            Error::Os { source, .. } => source.raw_os_error(),
            Error::InvalidArgument { .. } => None,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted { .. })
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
