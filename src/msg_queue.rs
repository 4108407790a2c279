// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// System V message queue carrying fixed-size typed payloads.
//
// Wire layout of a message is `{ c_long mtype; T payload }` with no padding
// between the two, which holds as long as `align_of::<T>() <= align_of::<c_long>()`.
// That bound is checked at compile time for every payload type used.

use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};

use crate::error::{Error, Resource, Result, Target};
use crate::handle::{open_id, OpenMode, RawHandle};
use crate::key::Key;
use crate::plain::Plain;
use crate::platform;
use crate::termination::Termination;

/// Message type tag. Partitions one queue into independent FIFO channels.
///
/// Always strictly positive: `0` means "any type" to `msgrcv` and negative
/// values select by priority, neither of which this wrapper exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageType(libc::c_long);

impl MessageType {
    /// Channel used by the log broker.
    pub const LOG: MessageType = MessageType::new(1);

    /// Panics (at compile time in const context) if `tag <= 0`.
    pub const fn new(tag: libc::c_long) -> Self {
        assert!(tag > 0, "message type tags must be positive");
        Self(tag)
    }

    pub fn try_new(tag: i64) -> Result<Self> {
        match libc::c_long::try_from(tag) {
            Ok(t) if t > 0 => Ok(Self(t)),
            _ => Err(Error::invalid(
                Target::new(Resource::MessageQueue),
                format!("message type {tag} must be positive"),
            )),
        }
    }

    pub const fn raw(self) -> libc::c_long {
        self.0
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
struct RawMessage<T> {
    mtype: libc::c_long,
    payload: T,
}

struct PayloadLayout<T>(PhantomData<T>);

impl<T> PayloadLayout<T> {
    const CHECK: () = assert!(
        mem::align_of::<T>() <= mem::align_of::<libc::c_long>(),
        "payload alignment must not exceed that of c_long"
    );
}

/// A handle to a System V message queue.
///
/// Owning handles remove the queue when dropped. Non-owning handles, from
/// [`MessageQueue::get`] or [`MessageQueue::copy`], never do.
#[derive(Debug)]
pub struct MessageQueue {
    raw: RawHandle,
    termination: Termination,
}

impl MessageQueue {
    /// Create a new queue for `key`. Fails with `AlreadyExists` if one is
    /// already there. The returned handle owns the queue.
    pub fn create(key: Key, permissions: u32) -> Result<Self> {
        let q = Self::open(key, OpenMode::Create, permissions, true)?;
        tracing::debug!(object = %q.raw.target(), "message queue created");
        Ok(q)
    }

    /// Create the queue if missing, attach otherwise. `owner` decides whether
    /// this handle will remove it.
    pub fn get_or_create(key: Key, permissions: u32, owner: bool) -> Result<Self> {
        Self::open(key, OpenMode::CreateOrOpen, permissions, owner)
    }

    /// Attach to an existing queue without taking ownership.
    pub fn get(key: Key) -> Result<Self> {
        Self::open(key, OpenMode::Open, 0, false)
    }

    fn open(key: Key, mode: OpenMode, permissions: u32, owner: bool) -> Result<Self> {
        let target = Target::new(Resource::MessageQueue).with_key(key);
        let id = open_id(target, || platform::msg::get(key.raw(), mode.flags(permissions)))?;
        Ok(Self {
            raw: RawHandle::new(Resource::MessageQueue, key, id, owner),
            termination: Termination::process(),
        })
    }

    /// Use `termination` instead of the process-wide flag for blocking calls.
    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    /// Another handle to the same queue that will never remove it.
    pub fn copy(&self) -> Self {
        Self {
            raw: self.raw.copy(),
            termination: self.termination,
        }
    }

    /// Give up ownership without removing the queue, e.g. in a forked child
    /// that inherited an owning handle.
    pub fn disown(&mut self) {
        self.raw.disown();
    }

    /// Remove the queue if owned. Always leaves the handle non-owning.
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

    /// Post `payload` under `mtype`.
    ///
    /// With `wait` the call blocks while the queue is full, retrying across
    /// signal interruptions until termination is requested. Without it a
    /// full queue yields `WouldBlock`.
    pub fn send<T: Plain>(&self, payload: T, mtype: MessageType, wait: bool) -> Result<()> {
        #[allow(clippy::let_unit_value)]
        let () = PayloadLayout::<T>::CHECK;

        let msg = RawMessage {
            mtype: mtype.raw(),
            payload,
        };
        let msgp = &msg as *const RawMessage<T> as *const libc::c_void;
        let size = mem::size_of::<T>();
        let id = self.raw.id();
        let target = self.raw.target();

        if wait {
            self.termination
                .retry(target, || unsafe { platform::msg::send(id, msgp, size, 0) })
        } else {
            unsafe { platform::msg::send(id, msgp, size, libc::IPC_NOWAIT) }
                .map_err(|errno| Error::from_errno(target, errno))
        }
    }

    /// Take the oldest message tagged `mtype`.
    ///
    /// Blocking and interruption behave as in [`send`](Self::send); an empty
    /// queue without `wait` yields `WouldBlock`.
    pub fn receive<T: Plain>(&self, mtype: MessageType, wait: bool) -> Result<T> {
        #[allow(clippy::let_unit_value)]
        let () = PayloadLayout::<T>::CHECK;

        let mut msg = MaybeUninit::<RawMessage<T>>::zeroed();
        let msgp = msg.as_mut_ptr() as *mut libc::c_void;
        let size = mem::size_of::<T>();
        let id = self.raw.id();
        let target = self.raw.target();

        let flags = if wait { 0 } else { libc::IPC_NOWAIT };
        let got = if wait {
            self.termination.retry(target, || unsafe {
                platform::msg::receive(id, msgp, size, mtype.raw(), flags)
            })?
        } else {
            unsafe { platform::msg::receive(id, msgp, size, mtype.raw(), flags) }
                .map_err(|errno| Error::from_errno(target, errno))?
        };
        if got != size {
            return Err(Error::invalid(
                target,
                format!("received {got} bytes, expected {size}"),
            ));
        }
        // Zero-initialised and fully overwritten by the kernel; `T: Plain`
        // accepts any byte pattern a sender produced.
        Ok(unsafe { msg.assume_init() }.payload)
    }

    pub fn try_send<T: Plain>(&self, payload: T, mtype: MessageType) -> Result<()> {
        self.send(payload, mtype, false)
    }

    pub fn try_receive<T: Plain>(&self, mtype: MessageType) -> Result<T> {
        self.receive(mtype, false)
    }

    /// Number of messages currently queued, across all types.
    pub fn pending(&self) -> Result<usize> {
        platform::msg::pending(self.raw.id())
            .map_err(|errno| Error::from_errno(self.raw.target(), errno))
    }
}
