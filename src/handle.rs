// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Ownership core shared by MessageQueue, SemaphoreSet and SharedMemory.
//
// A kernel IPC object outlives the process that created it, so exactly one
// in-process value is responsible for removing it. `RawHandle` carries the
// object's id, the key it was looked up by, and that responsibility.
// It is not `Clone`: duplicates are made with `copy()`, which
// never carries ownership.

use crate::error::{Error, Resource, Result, Target};
use crate::key::Key;
use crate::platform;

/// Creation intent passed down to `*get` syscalls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenMode {
    /// `IPC_CREAT | IPC_EXCL`: fail if the key is taken.
    Create,
    /// No flags: fail if the key is unknown.
    Open,
    /// `IPC_CREAT`: attach if present, create otherwise.
    CreateOrOpen,
}

impl OpenMode {
    pub(crate) fn flags(self, permissions: u32) -> libc::c_int {
        let perms = (permissions & 0o777) as libc::c_int;
        match self {
            OpenMode::Create => perms | libc::IPC_CREAT | libc::IPC_EXCL,
            OpenMode::Open => 0,
            OpenMode::CreateOrOpen => perms | libc::IPC_CREAT,
        }
    }
}

#[derive(Debug)]
pub(crate) struct RawHandle {
    resource: Resource,
    key: Key,
    id: libc::c_int,
    owner: bool,
}

impl RawHandle {
    pub(crate) fn new(resource: Resource, key: Key, id: libc::c_int, owner: bool) -> Self {
        Self {
            resource,
            key,
            id,
            owner,
        }
    }

    pub(crate) fn id(&self) -> libc::c_int {
        self.id
    }

    pub(crate) fn key(&self) -> Key {
        self.key
    }

    pub(crate) fn is_owner(&self) -> bool {
        self.owner
    }

    pub(crate) fn target(&self) -> Target {
        Target::new(self.resource).with_key(self.key).with_id(self.id)
    }

    /// Same object, never owning.
    pub(crate) fn copy(&self) -> Self {
        Self {
            resource: self.resource,
            key: self.key,
            id: self.id,
            owner: false,
        }
    }

    pub(crate) fn disown(&mut self) {
        self.owner = false;
    }

    /// Remove the kernel object if this handle owns it.
    ///
    /// Ownership is cleared whatever the outcome, so a second call (or the
    /// implicit one in `Drop`) is a no-op.
    pub(crate) fn remove(&mut self) -> Result<()> {
        if !self.owner {
            return Ok(());
        }
        self.owner = false;
        let res = match self.resource {
            Resource::MessageQueue => platform::msg::remove(self.id),
            Resource::SemaphoreSet => platform::sem::remove(self.id),
            Resource::SharedMemory => platform::shm::remove(self.id),
            other => {
                return Err(Error::invalid(
                    self.target(),
                    format!("{other} is not a System V object"),
                ))
            }
        };
        res.map_err(|errno| Error::from_errno(self.target(), errno))?;
        tracing::debug!(object = %self.target(), "removed");
        Ok(())
    }
}

impl Drop for RawHandle {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            tracing::warn!(error = %e, "failed to remove IPC object on drop");
        }
    }
}

/// Look up or create an object and wrap the id, mapping failures onto `target`.
pub(crate) fn open_id<F>(target: Target, get: F) -> Result<libc::c_int>
where
    F: FnOnce() -> std::result::Result<libc::c_int, i32>,
{
    get().map_err(|errno| Error::from_errno(target, errno))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_handle(owner: bool) -> (Key, RawHandle) {
        let key = Key::PRIVATE;
        let id = platform::msg::get(key.raw(), OpenMode::Create.flags(0o600)).expect("msgget");
        (key, RawHandle::new(Resource::MessageQueue, key, id, owner))
    }

    fn queue_exists(id: libc::c_int) -> bool {
        platform::msg::pending(id).is_ok()
    }

    #[test]
    fn copy_is_never_owner() {
        let (_, mut h) = queue_handle(true);
        let c = h.copy();
        assert!(h.is_owner());
        assert!(!c.is_owner());
        assert_eq!(c.id(), h.id());
        assert_eq!(c.key(), h.key());
        drop(c);
        assert!(queue_exists(h.id()));
        h.remove().expect("remove");
    }

    #[test]
    fn remove_is_idempotent() {
        let (_, mut h) = queue_handle(true);
        let id = h.id();
        h.remove().expect("first remove");
        assert!(!h.is_owner());
        assert!(!queue_exists(id));
        h.remove().expect("second remove is a no-op");
    }

    #[test]
    fn non_owner_remove_keeps_object() {
        let (_, mut owner) = queue_handle(true);
        let mut other = owner.copy();
        other.remove().expect("no-op");
        assert!(queue_exists(owner.id()));
        owner.remove().expect("remove");
    }

    #[test]
    fn disown_leaves_object_behind() {
        let (_, mut h) = queue_handle(true);
        let id = h.id();
        h.disown();
        drop(h);
        assert!(queue_exists(id));
        platform::msg::remove(id).expect("cleanup");
    }

    #[test]
    fn open_mode_flags() {
        assert_eq!(OpenMode::Open.flags(0o666), 0);
        assert_eq!(
            OpenMode::Create.flags(0o640),
            0o640 | libc::IPC_CREAT | libc::IPC_EXCL
        );
        assert_eq!(OpenMode::CreateOrOpen.flags(0o7777), 0o777 | libc::IPC_CREAT);
    }
}
