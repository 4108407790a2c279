// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Mutex + condition variable around a piece of in-process state, with
// waits that give up once termination is requested.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{Error, Resource, Result, Target};
use crate::termination::Termination;

/// How often a waiter re-checks the termination flag. A condvar wait is
/// not interrupted by signals, so the flag is polled.
const TERMINATION_POLL: Duration = Duration::from_millis(20);

/// Shared state whose transitions are broadcast to waiters.
pub struct Monitor<T> {
    state: Mutex<T>,
    changed: Condvar,
}

impl<T> Monitor<T> {
    pub fn new(state: T) -> Self {
        Self {
            state: Mutex::new(state),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the state and wake every waiter.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let r = f(&mut self.lock());
        self.changed.notify_all();
        r
    }

    /// Read the state under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.lock())
    }

    /// Wake every waiter without changing anything, e.g. after termination
    /// was requested.
    pub fn notify(&self) {
        let _guard = self.lock();
        self.changed.notify_all();
    }

    /// Block while `pred` holds. The predicate is re-evaluated after every
    /// wake-up, spurious or not.
    ///
    /// Returns the guard with `pred` false, or `Interrupted` once
    /// `termination` is requested.
    pub fn wait_while<F>(&self, termination: &Termination, mut pred: F) -> Result<MutexGuard<'_, T>>
    where
        F: FnMut(&T) -> bool,
    {
        let mut guard = self.lock();
        while pred(&guard) {
            if termination.is_requested() {
                return Err(Error::Interrupted {
                    target: Target::new(Resource::Process),
                });
            }
            guard = self
                .changed
                .wait_timeout(guard, TERMINATION_POLL)
                .map(|(g, _)| g)
                .unwrap_or_else(|e| e.into_inner().0);
        }
        Ok(guard)
    }
}

impl<T: Default> Default for Monitor<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
