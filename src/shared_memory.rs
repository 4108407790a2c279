// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A single typed System V shared memory segment.
//
// Creation/removal and attach/detach are independent: ownership decides who
// removes the segment, attachment is per handle and is always undone before
// the handle goes away.

use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::error::{Error, Resource, Result, Target};
use crate::handle::{open_id, OpenMode, RawHandle};
use crate::key::Key;
use crate::plain::Plain;
use crate::platform;

/// A handle to a shared memory segment holding one `T`.
///
/// No synchronisation is provided; pair it with a
/// [`SemaphoreSet`](crate::SemaphoreSet) when several processes mutate it.
#[derive(Debug)]
pub struct SharedMemory<T: Plain> {
    raw: RawHandle,
    mem: Option<NonNull<T>>,
    _marker: PhantomData<T>,
}

impl<T: Plain> SharedMemory<T> {
    /// Create a segment of `size_of::<T>()` bytes, attach it and zero it.
    ///
    /// The returned handle owns the segment and is attached. If attaching
    /// fails the segment is removed again.
    pub fn create(key: Key, permissions: u32) -> Result<Self> {
        let mut shm = Self::open(key, OpenMode::Create, permissions, true)?;
        if let Err(err) = shm.attach() {
            if let Err(e) = shm.remove() {
                tracing::warn!(error = %e, "failed to remove unattachable shared memory");
            }
            return Err(err);
        }
        if let Some(p) = shm.mem {
            unsafe { std::ptr::write_bytes(p.as_ptr(), 0, 1) };
        }
        tracing::debug!(object = %shm.raw.target(), size = std::mem::size_of::<T>(), "shared memory created");
        Ok(shm)
    }

    /// Look up an existing segment. The handle is neither owning nor
    /// attached; call [`attach`](Self::attach) before accessing it.
    pub fn get(key: Key) -> Result<Self> {
        Self::open(key, OpenMode::Open, 0, false)
    }

    /// Attach-or-create; a created segment is *not* zeroed here beyond the
    /// kernel's own zero fill.
    pub fn get_or_create(key: Key, permissions: u32, owner: bool) -> Result<Self> {
        Self::open(key, OpenMode::CreateOrOpen, permissions, owner)
    }

    fn open(key: Key, mode: OpenMode, permissions: u32, owner: bool) -> Result<Self> {
        let target = Target::new(Resource::SharedMemory).with_key(key);
        let size = std::mem::size_of::<T>().max(1);
        let id = open_id(target, || {
            platform::shm::get(key.raw(), size, mode.flags(permissions))
        })?;
        Ok(Self {
            raw: RawHandle::new(Resource::SharedMemory, key, id, owner),
            mem: None,
            _marker: PhantomData,
        })
    }

    /// Map the segment into this process. Attaching twice is a no-op.
    pub fn attach(&mut self) -> Result<()> {
        if self.mem.is_some() {
            return Ok(());
        }
        let addr = platform::shm::attach(self.raw.id())
            .map_err(|errno| Error::from_errno(self.raw.target(), errno))?;
        self.mem = NonNull::new(addr.cast::<T>());
        Ok(())
    }

    /// Unmap the segment from this process. Detaching twice is a no-op.
    pub fn detach(&mut self) -> Result<()> {
        let Some(p) = self.mem.take() else {
            return Ok(());
        };
        unsafe { platform::shm::detach(p.as_ptr().cast()) }
            .map_err(|errno| Error::from_errno(self.raw.target(), errno))
    }

    pub fn is_attached(&self) -> bool {
        self.mem.is_some()
    }

    /// Non-owning, unattached handle to the same segment.
    pub fn copy(&self) -> Self {
        Self {
            raw: self.raw.copy(),
            mem: None,
            _marker: PhantomData,
        }
    }

    pub fn disown(&mut self) {
        self.raw.disown();
    }

    /// Remove the segment if owned. The kernel keeps the memory until every
    /// process has detached; this handle's own mapping stays valid.
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

    /// Number of mappings of this segment across all processes.
    pub fn attach_count(&self) -> Result<usize> {
        platform::shm::attach_count(self.raw.id())
            .map_err(|errno| Error::from_errno(self.raw.target(), errno))
    }

    /// Raw pointer to the mapped value.
    pub fn as_ptr(&self) -> Result<*mut T> {
        self.mem
            .map(NonNull::as_ptr)
            .ok_or_else(|| Error::invalid(self.raw.target(), "segment is not attached"))
    }

    /// Copy the current value out.
    pub fn read(&self) -> Result<T> {
        let p = self.as_ptr()?;
        Ok(unsafe { std::ptr::read_volatile(p) })
    }

    /// Overwrite the value.
    pub fn write(&self, value: T) -> Result<()> {
        let p = self.as_ptr()?;
        unsafe { std::ptr::write_volatile(p, value) };
        Ok(())
    }

    /// Read-modify-write. Not atomic with respect to other processes.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut v = self.read()?;
        let r = f(&mut v);
        self.write(v)?;
        Ok(r)
    }
}

// The mapping is process-wide; moving the handle across threads is fine.
unsafe impl<T: Plain + Send> Send for SharedMemory<T> {}

impl<T: Plain> Drop for SharedMemory<T> {
    fn drop(&mut self) {
        // Detach before the RawHandle field removes the segment.
        if let Err(e) = self.detach() {
            tracing::warn!(error = %e, "failed to detach shared memory on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Counters {
        hits: u64,
        misses: u32,
        flag: u8,
    }

    unsafe impl Plain for Counters {}

    #[test]
    fn create_is_attached_and_zeroed() {
        let shm = SharedMemory::<Counters>::create(Key::PRIVATE, 0o600).expect("create");
        assert!(shm.is_attached());
        assert_eq!(
            shm.read().expect("read"),
            Counters {
                hits: 0,
                misses: 0,
                flag: 0
            }
        );
    }

    #[test]
    fn copy_is_detached_until_attach() {
        let shm = SharedMemory::<u64>::create(Key::PRIVATE, 0o600).expect("create");
        shm.write(41).expect("write");

        let mut other = shm.copy();
        assert!(!other.is_attached());
        assert!(!other.is_owner());
        assert!(matches!(other.read(), Err(Error::InvalidArgument { .. })));

        other.attach().expect("attach");
        other.update(|v| *v += 1).expect("update");
        assert_eq!(shm.read().expect("read"), 42);
        assert_eq!(shm.attach_count().expect("nattch"), 2);

        other.detach().expect("detach");
        other.detach().expect("second detach is a no-op");
        assert_eq!(shm.attach_count().expect("nattch"), 1);
    }
}
