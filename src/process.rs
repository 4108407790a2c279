// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// fork/exec process control with descriptor and signal-mask sanitisation,
// the one-byte readiness handshake, and SIGTERM-based shutdown.
//
// Lifecycle of a spawned child: Spawned -> (Ready) -> Running -> Terminated.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use crate::error::{Error, Resource, Result, Target};
use crate::pipe::{self, PipeReader, PipeWriter};
use crate::termination::{errno, Termination};

/// Descriptor a child created by [`Process::create_ready`] writes its
/// readiness byte to.
pub const READY_FD: RawFd = 3;

/// How long [`Process::term_wait`] and drop give a child to exit after
/// SIGTERM before sending SIGKILL.
pub const TERM_GRACE: Duration = Duration::from_secs(2);

const REAP_POLL: Duration = Duration::from_millis(10);

fn target(pid: libc::pid_t) -> Target {
    Target::new(Resource::Process).with_id(pid)
}

/// Raw `waitpid` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitStatus(libc::c_int);

impl WaitStatus {
    pub fn raw(self) -> libc::c_int {
        self.0
    }

    /// Exit code if the child exited normally.
    pub fn exit_code(self) -> Option<i32> {
        libc::WIFEXITED(self.0).then(|| libc::WEXITSTATUS(self.0))
    }

    /// Terminating signal if the child was killed by one.
    pub fn signal(self) -> Option<i32> {
        libc::WIFSIGNALED(self.0).then(|| libc::WTERMSIG(self.0))
    }

    pub fn success(self) -> bool {
        self.exit_code() == Some(0)
    }
}

/// Argument vector prepared before `fork` so the child never allocates.
struct Argv {
    _strings: Vec<CString>,
    ptrs: Vec<*const libc::c_char>,
}

impl Argv {
    fn new<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let t = Target::new(Resource::Process);
        if args.is_empty() {
            return Err(Error::invalid(t, "empty argument vector"));
        }
        let strings = args
            .iter()
            .map(|a| CString::new(a.as_ref()).map_err(|e| Error::invalid(t, e.to_string())))
            .collect::<Result<Vec<_>>>()?;
        let mut ptrs: Vec<*const libc::c_char> = strings.iter().map(|s| s.as_ptr()).collect();
        ptrs.push(std::ptr::null());
        Ok(Self {
            _strings: strings,
            ptrs,
        })
    }
}

fn open_max() -> libc::c_int {
    match unsafe { libc::sysconf(libc::_SC_OPEN_MAX) } {
        -1 => 1024,
        n => n.min(libc::c_int::MAX as libc::c_long) as libc::c_int,
    }
}

/// Write a fixed message to stderr and leave the child. Async-signal-safe.
fn child_fail(msg: &[u8]) -> ! {
    unsafe {
        libc::write(libc::STDERR_FILENO, msg.as_ptr().cast(), msg.len());
        libc::_exit(1)
    }
}

/// `close_range(2)` over `first..=last`; an empty range counts as done.
#[cfg(target_os = "linux")]
unsafe fn close_range(first: RawFd, last: libc::c_uint) -> bool {
    let first = first as libc::c_uint;
    first > last || libc::syscall(libc::SYS_close_range, first, last, 0 as libc::c_uint) == 0
}

/// Close every descriptor from 3 up except `keep_fd`. Falls back to one
/// `close` per descriptor below `max_fd` where `close_range` is missing.
unsafe fn close_inherited(keep_fd: Option<RawFd>, max_fd: libc::c_int) {
    #[cfg(target_os = "linux")]
    {
        let closed = match keep_fd {
            Some(k) if k >= 3 => {
                close_range(3, (k - 1) as libc::c_uint) && close_range(k + 1, libc::c_uint::MAX)
            }
            _ => close_range(3, libc::c_uint::MAX),
        };
        if closed {
            return;
        }
    }
    for fd in 3..max_fd {
        if Some(fd) != keep_fd {
            libc::close(fd);
        }
    }
}

/// Runs in the forked child only: close inherited descriptors, clear the
/// signal mask, exec. Never returns.
///
/// # Safety
/// Must only be called between `fork` and `exec`. Uses no allocation.
unsafe fn exec_child(argv: &Argv, keep_fd: Option<RawFd>, max_fd: libc::c_int) -> ! {
    close_inherited(keep_fd, max_fd);

    let mut set: libc::sigset_t = std::mem::zeroed();
    libc::sigemptyset(&mut set);
    if libc::pthread_sigmask(libc::SIG_SETMASK, &set, std::ptr::null_mut()) != 0 {
        child_fail(b"pthread_sigmask failed\n");
    }

    libc::execvp(argv.ptrs[0], argv.ptrs.as_ptr());
    child_fail(b"execvp failed\n")
}

/// Handle to a child process.
///
/// An owning handle that has not been reaped sends SIGTERM when dropped,
/// then SIGKILL if the child outlives [`TERM_GRACE`].
#[derive(Debug)]
pub struct Process {
    pid: libc::pid_t,
    owner: bool,
    termination: Termination,
}

impl Process {
    /// Non-owning handle for an existing pid.
    pub fn from_pid(pid: libc::pid_t) -> Self {
        Self {
            pid,
            owner: false,
            termination: Termination::process(),
        }
    }

    /// Fork and exec `argv`. `argv[0]` is looked up in `PATH`.
    pub fn create<S: AsRef<str>>(argv: &[S]) -> Result<Self> {
        let argv = Argv::new(argv)?;
        let max_fd = open_max();

        let pid = unsafe { libc::fork() };
        match pid {
            -1 => Err(Error::from_errno(Target::new(Resource::Process), errno())),
            0 => unsafe { exec_child(&argv, None, max_fd) },
            pid => {
                tracing::debug!(pid, argv0 = ?argv._strings[0], "spawned");
                Ok(Self::owned(pid))
            }
        }
    }

    /// Like [`create`](Self::create), but the child gets the write end of a
    /// fresh pipe on descriptor `fd_to_keep`; the parent gets the read end.
    pub fn create_with_pipe<S: AsRef<str>>(
        argv: &[S],
        fd_to_keep: RawFd,
    ) -> Result<(PipeReader, Process)> {
        let argv = Argv::new(argv)?;
        let max_fd = open_max();
        let (reader, writer) = pipe::pipe()?;

        let pid = unsafe { libc::fork() };
        match pid {
            -1 => Err(Error::from_errno(Target::new(Resource::Process), errno())),
            0 => unsafe {
                let w = writer.as_raw_fd();
                if w == fd_to_keep {
                    // dup2 onto itself would leave close-on-exec set.
                    libc::fcntl(w, libc::F_SETFD, 0);
                } else if libc::dup2(w, fd_to_keep) == -1 {
                    child_fail(b"dup2 failed\n");
                }
                exec_child(&argv, Some(fd_to_keep), max_fd)
            },
            pid => {
                drop(writer);
                tracing::debug!(pid, fd_to_keep, "spawned with pipe");
                Ok((reader, Self::owned(pid)))
            }
        }
    }

    /// Spawn `argv` and block until it signals readiness on [`READY_FD`].
    ///
    /// The child must call [`CurrentProcess::signal_ready`] once initialised.
    /// If it exits first, this fails and the child is reaped.
    pub fn create_ready<S: AsRef<str>>(argv: &[S]) -> Result<Self> {
        let (mut pipe, child) = Self::create_with_pipe(argv, READY_FD)?;
        Self::wait_ready(&mut pipe)?;
        tracing::debug!(pid = child.pid, "child ready");
        Ok(child)
    }

    /// Read the readiness byte. EOF means the child went away before
    /// signalling.
    pub fn wait_ready(pipe: &mut PipeReader) -> Result<()> {
        match pipe.read_byte()? {
            Some(_) => Ok(()),
            None => Err(Error::Os {
                target: Target::new(Resource::Pipe).with_id(pipe.as_raw_fd()),
                source: io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "child closed the readiness pipe without signalling",
                ),
            }),
        }
    }

    fn owned(pid: libc::pid_t) -> Self {
        Self {
            pid,
            owner: true,
            termination: Termination::process(),
        }
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    pub fn pid(&self) -> libc::pid_t {
        self.pid
    }

    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Stop this handle from terminating the child on drop.
    pub fn disown(&mut self) {
        self.owner = false;
    }

    pub fn signal(&self, sig: libc::c_int) -> Result<()> {
        if unsafe { libc::kill(self.pid, sig) } == -1 {
            return Err(Error::from_errno(target(self.pid), errno()));
        }
        Ok(())
    }

    /// Block until the child changes state and return its raw status.
    ///
    /// Interrupted waits are retried until termination is requested.
    pub fn wait(&mut self) -> Result<WaitStatus> {
        let pid = self.pid;
        let status = self.termination.retry(target(pid), || reap(pid))?;
        self.owner = false;
        Ok(status)
    }

    /// SIGTERM, wait up to [`TERM_GRACE`], then SIGKILL.
    pub fn term_wait(&mut self) -> Result<WaitStatus> {
        self.term_wait_within(TERM_GRACE)
    }

    /// SIGTERM, wait up to `grace`, then SIGKILL and reap.
    ///
    /// The full grace period applies even when this process has itself been
    /// asked to terminate, so a child can still clean up its IPC objects.
    pub fn term_wait_within(&mut self, grace: Duration) -> Result<WaitStatus> {
        self.signal(libc::SIGTERM)?;
        let status = reap_within(self.pid, grace)?;
        self.owner = false;
        Ok(status)
    }
}

fn reap(pid: libc::pid_t) -> std::result::Result<WaitStatus, i32> {
    let mut status: libc::c_int = 0;
    if unsafe { libc::waitpid(pid, &mut status, 0) } == -1 {
        return Err(errno());
    }
    Ok(WaitStatus(status))
}

/// `waitpid` with `WNOHANG`; `None` while the child is still running.
fn try_reap(pid: libc::pid_t) -> Result<Option<WaitStatus>> {
    let mut status: libc::c_int = 0;
    loop {
        match unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) } {
            0 => return Ok(None),
            -1 if errno() == libc::EINTR => continue,
            -1 => return Err(Error::from_errno(target(pid), errno())),
            _ => return Ok(Some(WaitStatus(status))),
        }
    }
}

/// Poll for the child until `grace` has passed, then SIGKILL it. The final
/// blocking wait cannot outlive the kill.
fn reap_within(pid: libc::pid_t, grace: Duration) -> Result<WaitStatus> {
    let deadline = Instant::now() + grace;
    loop {
        if let Some(status) = try_reap(pid)? {
            return Ok(status);
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(REAP_POLL.min(deadline - now));
    }

    tracing::warn!(pid, ?grace, "child still running after grace period, sending SIGKILL");
    if unsafe { libc::kill(pid, libc::SIGKILL) } == -1 {
        return Err(Error::from_errno(target(pid), errno()));
    }
    loop {
        match reap(pid) {
            Ok(s) => return Ok(s),
            Err(libc::EINTR) => continue,
            Err(e) => return Err(Error::from_errno(target(pid), e)),
        }
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if !self.owner {
            return;
        }
        self.owner = false;
        let res = self
            .signal(libc::SIGTERM)
            .and_then(|()| reap_within(self.pid, TERM_GRACE));
        if let Err(e) = res {
            tracing::warn!(error = %e, "failed to terminate child on drop");
        }
    }
}

/// Operations on the calling process.
pub struct CurrentProcess;

impl CurrentProcess {
    pub fn pid() -> libc::pid_t {
        unsafe { libc::getpid() }
    }

    /// Write the readiness byte to [`READY_FD`] and close it.
    ///
    /// Call once, after initialisation, in a child started with
    /// [`Process::create_ready`].
    pub fn signal_ready() -> Result<()> {
        // The descriptor was handed to us by the parent and nothing else owns it.
        let mut w = unsafe { PipeWriter::from_raw_fd(READY_FD, false)? };
        w.write_byte(0)
    }

    /// Send `sig` to ourselves.
    pub fn raise(sig: libc::c_int) -> Result<()> {
        Process::from_pid(Self::pid()).signal(sig)
    }
}

/// A set of signals consumed synchronously with `sigwait`.
pub struct SignalSet {
    set: libc::sigset_t,
}

impl SignalSet {
    pub fn new(signals: &[libc::c_int]) -> Self {
        let mut set: libc::sigset_t = unsafe { std::mem::zeroed() };
        unsafe {
            libc::sigemptyset(&mut set);
            for &s in signals {
                libc::sigaddset(&mut set, s);
            }
        }
        Self { set }
    }

    /// Block the set in the calling thread. Threads spawned afterwards
    /// inherit the mask, so do this before spawning workers.
    pub fn block(&self) -> Result<()> {
        let eno = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &self.set, std::ptr::null_mut()) };
        if eno != 0 {
            return Err(Error::from_errno(Target::new(Resource::Process), eno));
        }
        Ok(())
    }

    /// Wait for one signal of the set and return its number.
    pub fn wait(&self) -> Result<libc::c_int> {
        let mut sig: libc::c_int = 0;
        let eno = unsafe { libc::sigwait(&self.set, &mut sig) };
        if eno != 0 {
            return Err(Error::from_errno(Target::new(Resource::Process), eno));
        }
        Ok(sig)
    }
}
