// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Owned pipe ends used by the readiness handshake.

use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

use crate::error::{Error, Resource, Result, Target};
use crate::termination::{errno, Termination};

fn target(fd: RawFd) -> Target {
    Target::new(Resource::Pipe).with_id(fd)
}

fn set_nonblocking(fd: RawFd) -> Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags == -1 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) == -1 {
            return Err(Error::from_errno(target(fd), errno()));
        }
    }
    Ok(())
}

/// Create a pipe whose ends are close-on-exec in this process.
pub fn pipe() -> Result<(PipeReader, PipeWriter)> {
    let mut fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } == -1 {
        return Err(Error::from_errno(Target::new(Resource::Pipe), errno()));
    }
    // Freshly created by pipe2 and owned by nobody else.
    let (r, w) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    Ok((
        PipeReader {
            fd: r,
            termination: Termination::process(),
        },
        PipeWriter {
            fd: w,
            termination: Termination::process(),
        },
    ))
}

/// Read end of a pipe. Closed on drop.
#[derive(Debug)]
pub struct PipeReader {
    fd: OwnedFd,
    termination: Termination,
}

impl PipeReader {
    /// Take ownership of `fd`.
    ///
    /// # Safety
    /// `fd` must be an open descriptor not owned by anything else.
    pub unsafe fn from_raw_fd(fd: RawFd, blocking: bool) -> Result<Self> {
        if !blocking {
            set_nonblocking(fd)?;
        }
        Ok(Self {
            fd: OwnedFd::from_raw_fd(fd),
            termination: Termination::process(),
        })
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    /// Read one byte. `Ok(None)` means the write end was closed.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let fd = self.fd.as_raw_fd();
        let mut byte = 0u8;
        let n = self.termination.retry(target(fd), || {
            let n = unsafe { libc::read(fd, (&mut byte as *mut u8).cast(), 1) };
            if n < 0 {
                Err(errno())
            } else {
                Ok(n)
            }
        })?;
        Ok((n == 1).then_some(byte))
    }

    pub fn set_nonblocking(&self) -> Result<()> {
        set_nonblocking(self.fd.as_raw_fd())
    }
}

impl AsRawFd for PipeReader {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Write end of a pipe. Closed on drop.
#[derive(Debug)]
pub struct PipeWriter {
    fd: OwnedFd,
    termination: Termination,
}

impl PipeWriter {
    /// Take ownership of `fd`.
    ///
    /// # Safety
    /// `fd` must be an open descriptor not owned by anything else.
    pub unsafe fn from_raw_fd(fd: RawFd, blocking: bool) -> Result<Self> {
        if !blocking {
            set_nonblocking(fd)?;
        }
        Ok(Self {
            fd: OwnedFd::from_raw_fd(fd),
            termination: Termination::process(),
        })
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        let fd = self.fd.as_raw_fd();
        self.termination.retry(target(fd), || {
            let n = unsafe { libc::write(fd, (&byte as *const u8).cast(), 1) };
            if n < 0 {
                Err(errno())
            } else {
                Ok(())
            }
        })
    }

    /// Give the descriptor up without closing it.
    pub fn into_raw_fd(self) -> RawFd {
        self.fd.into_raw_fd()
    }
}

impl AsRawFd for PipeWriter {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_roundtrip_then_eof() {
        let (mut r, mut w) = pipe().expect("pipe");
        w.write_byte(b'!').expect("write");
        assert_eq!(r.read_byte().expect("read"), Some(b'!'));
        drop(w);
        assert_eq!(r.read_byte().expect("read"), None);
    }

    #[test]
    fn nonblocking_empty_read_would_block() {
        let (mut r, _w) = pipe().expect("pipe");
        r.set_nonblocking().expect("nonblock");
        assert!(matches!(r.read_byte(), Err(Error::WouldBlock { .. })));
    }

    #[test]
    fn requested_termination_stops_read() {
        let (r, _w) = pipe().expect("pipe");
        let t = Termination::detached();
        t.request();
        let mut r = r.with_termination(t);
        assert!(r.read_byte().unwrap_err().is_interrupted());
    }
}
