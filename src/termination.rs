// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Process-wide termination flag and the retry discipline every blocking
// primitive shares.
//
// The flag starts cleared. Its only asynchronous writers are the SIGINT and
// SIGTERM handlers installed by `Termination::install_handlers`, which do a
// single lock-free atomic store.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Resource, Result, Target};

static TERMINATE_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_terminate_signal(_sig: libc::c_int) {
    TERMINATE_REQUESTED.store(true, Ordering::SeqCst);
}

/// Capability to observe (and request) termination.
///
/// Blocking calls take one of these instead of reading a hidden global, so
/// tests can hand a primitive its own flag via [`Termination::detached`].
#[derive(Clone, Copy)]
pub struct Termination {
    flag: &'static AtomicBool,
}

impl Termination {
    /// The process-wide flag, set by the SIGINT/SIGTERM handlers.
    pub fn process() -> Self {
        Self {
            flag: &TERMINATE_REQUESTED,
        }
    }

    /// A fresh flag independent of signals. The flag is leaked; create these
    /// sparingly (tests, in-process workers).
    pub fn detached() -> Self {
        Self {
            flag: Box::leak(Box::new(AtomicBool::new(false))),
        }
    }

    /// Register SIGINT and SIGTERM handlers that set the process-wide flag.
    ///
    /// `SA_RESTART` is not set: blocked syscalls must return `EINTR` to
    /// observe the flag.
    pub fn install_handlers() -> Result<Self> {
        for sig in [libc::SIGINT, libc::SIGTERM] {
            add_handler(sig, on_terminate_signal)
                .map_err(|e| Error::from_io(Target::new(Resource::Process), e))?;
        }
        tracing::debug!("termination handlers installed for SIGINT/SIGTERM");
        Ok(Self::process())
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request termination without a signal.
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Run a blocking syscall under the retry-or-abort discipline.
    ///
    /// `call` returns `Ok` or the errno it failed with. `EINTR` is retried
    /// while termination has not been requested; once it has, the call is
    /// abandoned with [`Error::Interrupted`]. The flag is also checked
    /// before the first attempt so a request that arrived before we
    /// blocked is not missed.
    pub(crate) fn retry<T, F>(&self, target: Target, mut call: F) -> Result<T>
    where
        F: FnMut() -> std::result::Result<T, i32>,
    {
        loop {
            if self.is_requested() {
                return Err(Error::Interrupted { target });
            }
            match call() {
                Ok(v) => return Ok(v),
                Err(libc::EINTR) => continue,
                Err(errno) => return Err(Error::from_errno(target, errno)),
            }
        }
    }
}

impl Default for Termination {
    fn default() -> Self {
        Self::process()
    }
}

impl std::fmt::Debug for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Termination")
            .field("requested", &self.is_requested())
            .finish()
    }
}

/// Install `handler` for `sig` with an empty mask and no flags.
pub fn add_handler(sig: libc::c_int, handler: extern "C" fn(libc::c_int)) -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler as usize;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        if libc::sigaction(sig, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Last errno as a plain integer, for the `retry` closures.
pub(crate) fn errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_flags_are_independent() {
        let a = Termination::detached();
        let b = Termination::detached();
        a.request();
        assert!(a.is_requested());
        assert!(!b.is_requested());
    }

    #[test]
    fn retry_retries_eintr_until_success() {
        let t = Termination::detached();
        let mut attempts = 0;
        let out = t.retry(Target::new(Resource::Pipe), || {
            attempts += 1;
            if attempts < 3 {
                Err(libc::EINTR)
            } else {
                Ok(attempts)
            }
        });
        assert_eq!(out.expect("retry"), 3);
    }

    #[test]
    fn retry_aborts_once_requested() {
        let t = Termination::detached();
        let mut attempts = 0;
        let out: Result<()> = t.retry(Target::new(Resource::Pipe), || {
            attempts += 1;
            t.request();
            Err(libc::EINTR)
        });
        assert!(out.unwrap_err().is_interrupted());
        assert_eq!(attempts, 1);
    }

    #[test]
    fn retry_does_not_enter_kernel_after_request() {
        let t = Termination::detached();
        t.request();
        let mut called = false;
        let out: Result<()> = t.retry(Target::new(Resource::Pipe), || {
            called = true;
            Ok(())
        });
        assert!(out.unwrap_err().is_interrupted());
        assert!(!called);
    }

    #[test]
    fn other_errno_is_classified() {
        let t = Termination::detached();
        let out: Result<()> = t.retry(Target::new(Resource::MessageQueue), || Err(libc::EIDRM));
        assert!(matches!(out, Err(Error::Os { .. })));
    }
}
