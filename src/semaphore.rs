// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// System V semaphore sets addressed through an application enum.

use std::marker::PhantomData;

use crate::error::{Error, Resource, Result, Target};
use crate::handle::{open_id, OpenMode, RawHandle};
use crate::key::Key;
use crate::platform;
use crate::termination::Termination;

/// An enum naming the slots of a semaphore set.
///
/// `COUNT` is the number of slots; `index` must map every variant into
/// `0..COUNT`.
pub trait SemaphoreSlot: Copy {
    const COUNT: usize;

    fn index(self) -> u16;
}

/// A fixed-size array of counting semaphores, one per `E` variant.
pub struct SemaphoreSet<E: SemaphoreSlot> {
    raw: RawHandle,
    termination: Termination,
    _slots: PhantomData<E>,
}

impl<E: SemaphoreSlot> SemaphoreSet<E> {
    /// Create the set and write every slot's initial value.
    ///
    /// `initial.len()` must equal `E::COUNT`; otherwise this fails with
    /// `InvalidArgument` before touching the kernel. Other processes can
    /// observe the set between `semget` and `SETALL`; it is only ready once
    /// this returns. If `SETALL` fails the freshly created set is removed.
    pub fn create(key: Key, initial: &[u16], permissions: u32) -> Result<Self> {
        let target = Target::new(Resource::SemaphoreSet).with_key(key);
        if initial.len() != E::COUNT {
            return Err(Error::invalid(
                target,
                format!(
                    "{} initial values for a set of {} semaphores",
                    initial.len(),
                    E::COUNT
                ),
            ));
        }

        let mut set = Self::open(key, OpenMode::Create, permissions, true)?;
        if let Err(errno) = platform::sem::set_all(set.raw.id(), initial) {
            let err = Error::from_errno(set.raw.target(), errno);
            if let Err(e) = set.raw.remove() {
                tracing::warn!(error = %e, "failed to remove half-initialised semaphore set");
            }
            return Err(err);
        }
        tracing::debug!(object = %set.raw.target(), values = ?initial, "semaphore set created");
        Ok(set)
    }

    /// Attach to an existing set without taking ownership.
    ///
    /// Fails with `InvalidArgument` if the set does not have exactly
    /// `E::COUNT` slots.
    pub fn get(key: Key) -> Result<Self> {
        Self::open(key, OpenMode::Open, 0, false)
    }

    /// Attach if present, otherwise create with every slot at zero.
    pub fn get_or_create(key: Key, permissions: u32, owner: bool) -> Result<Self> {
        Self::open(key, OpenMode::CreateOrOpen, permissions, owner)
    }

    fn open(key: Key, mode: OpenMode, permissions: u32, owner: bool) -> Result<Self> {
        let target = Target::new(Resource::SemaphoreSet).with_key(key);
        let id = open_id(target, || {
            platform::sem::get(key.raw(), E::COUNT, mode.flags(permissions))
        })?;
        let mut set = Self {
            raw: RawHandle::new(Resource::SemaphoreSet, key, id, owner),
            termination: Termination::process(),
            _slots: PhantomData,
        };
        if mode != OpenMode::Create {
            if let Err(e) = set.check_count() {
                // A mismatched set was not created here; leave it in place.
                set.raw.disown();
                return Err(e);
            }
        }
        Ok(set)
    }

    /// `semget` accepts a smaller `nsems` than the existing set has, so the
    /// slot count is compared against `IPC_STAT`.
    fn check_count(&self) -> Result<()> {
        let actual = platform::sem::count(self.raw.id())
            .map_err(|errno| Error::from_errno(self.raw.target(), errno))?;
        if actual != E::COUNT {
            return Err(Error::invalid(
                self.raw.target(),
                format!("set has {actual} semaphores, expected {}", E::COUNT),
            ));
        }
        Ok(())
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    /// Non-owning handle to the same set.
    pub fn copy(&self) -> Self {
        Self {
            raw: self.raw.copy(),
            termination: self.termination,
            _slots: PhantomData,
        }
    }

    pub fn disown(&mut self) {
        self.raw.disown();
    }

    pub fn remove(&mut self) -> Result<()> {
        self.raw.remove()
    }

    pub fn id(&self) -> i32 {
        self.raw.id()
    }

    pub fn key(&self) -> Key {
        self.raw.key()
    }

    pub fn is_owner(&self) -> bool {
        self.raw.is_owner()
    }

    /// A reference to one slot of this set.
    pub fn semaphore(&self, slot: E) -> Semaphore {
        Semaphore {
            target: self.raw.target(),
            set_id: self.raw.id(),
            num: slot.index(),
            termination: self.termination,
        }
    }
}

impl<E: SemaphoreSlot> std::fmt::Debug for SemaphoreSet<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemaphoreSet")
            .field("key", &self.raw.key())
            .field("id", &self.raw.id())
            .field("owner", &self.raw.is_owner())
            .field("slots", &E::COUNT)
            .finish()
    }
}

/// One slot of a [`SemaphoreSet`]. Does not keep the set alive.
#[derive(Debug, Clone, Copy)]
pub struct Semaphore {
    target: Target,
    set_id: libc::c_int,
    num: u16,
    termination: Termination,
}

impl Semaphore {
    /// Decrement, blocking while the value is zero.
    pub fn wait(&self) -> Result<()> {
        self.op(-1)
    }

    /// Increment, waking a waiter if any.
    pub fn signal(&self) -> Result<()> {
        self.op(1)
    }

    /// Block until the value is zero.
    pub fn wait_for_zero(&self) -> Result<()> {
        self.op(0)
    }

    /// Decrement without blocking; `WouldBlock` if the value is zero.
    pub fn try_wait(&self) -> Result<()> {
        platform::sem::op(self.set_id, self.num, -1, libc::IPC_NOWAIT as libc::c_short)
            .map_err(|errno| Error::from_errno(self.target, errno))
    }

    /// Current value (`GETVAL`).
    pub fn value(&self) -> Result<i32> {
        platform::sem::value(self.set_id, self.num)
            .map_err(|errno| Error::from_errno(self.target, errno))
    }

    pub fn index(&self) -> u16 {
        self.num
    }

    fn op(&self, delta: i16) -> Result<()> {
        let (id, num) = (self.set_id, self.num);
        self.termination
            .retry(self.target, || platform::sem::op(id, num, delta, 0))
    }
}
