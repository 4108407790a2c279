// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Monotonic time source and an interruptible sleep-until-deadline.

use std::ops::{Add, AddAssign, Sub};
use std::time::Duration;

use crate::error::{Resource, Result, Target};
use crate::termination::Termination;

/// A point on `CLOCK_MONOTONIC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonotonicTime(Duration);

impl MonotonicTime {
    pub fn now() -> Self {
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        // CLOCK_MONOTONIC cannot fail with a valid timespec pointer.
        unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        Self(Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32))
    }

    pub fn since_boot(self) -> Duration {
        self.0
    }

    fn as_timespec(self) -> libc::timespec {
        libc::timespec {
            tv_sec: self.0.as_secs() as libc::time_t,
            tv_nsec: self.0.subsec_nanos() as libc::c_long,
        }
    }
}

impl Add<Duration> for MonotonicTime {
    type Output = MonotonicTime;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<Duration> for MonotonicTime {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs;
    }
}

impl Sub for MonotonicTime {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Sleep until `deadline`, resuming after signals unless termination has
/// been requested, in which case `Interrupted` is returned early.
pub fn sleep_until(deadline: MonotonicTime, termination: &Termination) -> Result<()> {
    let ts = deadline.as_timespec();
    termination.retry(Target::new(Resource::Clock), || {
        // clock_nanosleep returns the error number directly.
        match unsafe {
            libc::clock_nanosleep(libc::CLOCK_MONOTONIC, libc::TIMER_ABSTIME, &ts, std::ptr::null_mut())
        } {
            0 => Ok(()),
            eno => Err(eno),
        }
    })
}

pub fn sleep_for(duration: Duration, termination: &Termination) -> Result<()> {
    sleep_until(MonotonicTime::now() + duration, termination)
}
