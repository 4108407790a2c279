// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Thin System V syscall layer. Every function returns the raw errno on
// failure so callers can feed it through the termination retry loop and
// classify it against their own `Target`.

use crate::termination::errno;

type SysResult<T> = std::result::Result<T, i32>;

fn check(ret: libc::c_int) -> SysResult<libc::c_int> {
    if ret == -1 {
        Err(errno())
    } else {
        Ok(ret)
    }
}

// ---------------------------------------------------------------------------
// Message queues
// ---------------------------------------------------------------------------

pub mod msg {
    use super::*;

    pub fn get(key: libc::key_t, flags: libc::c_int) -> SysResult<libc::c_int> {
        check(unsafe { libc::msgget(key, flags) })
    }

    /// `msgp` must point at a `{ c_long mtype; u8 mtext[size] }` block.
    pub unsafe fn send(
        id: libc::c_int,
        msgp: *const libc::c_void,
        size: usize,
        flags: libc::c_int,
    ) -> SysResult<()> {
        check(libc::msgsnd(id, msgp, size, flags)).map(|_| ())
    }

    /// Returns the number of bytes copied into `mtext`.
    pub unsafe fn receive(
        id: libc::c_int,
        msgp: *mut libc::c_void,
        size: usize,
        mtype: libc::c_long,
        flags: libc::c_int,
    ) -> SysResult<usize> {
        let n = libc::msgrcv(id, msgp, size, mtype, flags);
        if n < 0 {
            Err(errno())
        } else {
            Ok(n as usize)
        }
    }

    pub fn remove(id: libc::c_int) -> SysResult<()> {
        check(unsafe { libc::msgctl(id, libc::IPC_RMID, std::ptr::null_mut()) }).map(|_| ())
    }

    /// Number of messages currently on the queue.
    pub fn pending(id: libc::c_int) -> SysResult<usize> {
        let mut ds: libc::msqid_ds = unsafe { std::mem::zeroed() };
        check(unsafe { libc::msgctl(id, libc::IPC_STAT, &mut ds) })?;
        Ok(ds.msg_qnum as usize)
    }
}

// ---------------------------------------------------------------------------
// Semaphore sets
// ---------------------------------------------------------------------------

pub mod sem {
    use super::*;

    pub fn get(key: libc::key_t, count: usize, flags: libc::c_int) -> SysResult<libc::c_int> {
        check(unsafe { libc::semget(key, count as libc::c_int, flags) })
    }

    /// `SETALL`. The `semun` argument is passed as its pointer member, which
    /// occupies the same variadic slot as the union itself.
    pub fn set_all(id: libc::c_int, values: &[libc::c_ushort]) -> SysResult<()> {
        let mut buf = values.to_vec();
        check(unsafe { libc::semctl(id, 0, libc::SETALL, buf.as_mut_ptr()) }).map(|_| ())
    }

    pub fn value(id: libc::c_int, num: u16) -> SysResult<i32> {
        check(unsafe { libc::semctl(id, libc::c_int::from(num), libc::GETVAL) })
    }

    /// Number of semaphores in the set (`sem_nsems` from `IPC_STAT`).
    pub fn count(id: libc::c_int) -> SysResult<usize> {
        let mut ds: libc::semid_ds = unsafe { std::mem::zeroed() };
        check(unsafe { libc::semctl(id, 0, libc::IPC_STAT, &mut ds as *mut libc::semid_ds) })?;
        Ok(ds.sem_nsems as usize)
    }

    pub fn op(id: libc::c_int, num: u16, delta: i16, flags: libc::c_short) -> SysResult<()> {
        let mut sop = libc::sembuf {
            sem_num: num,
            sem_op: delta,
            sem_flg: flags,
        };
        check(unsafe { libc::semop(id, &mut sop, 1) }).map(|_| ())
    }

    pub fn remove(id: libc::c_int) -> SysResult<()> {
        check(unsafe { libc::semctl(id, 0, libc::IPC_RMID) }).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Shared memory
// ---------------------------------------------------------------------------

pub mod shm {
    use super::*;

    pub fn get(key: libc::key_t, size: usize, flags: libc::c_int) -> SysResult<libc::c_int> {
        check(unsafe { libc::shmget(key, size, flags) })
    }

    pub fn attach(id: libc::c_int) -> SysResult<*mut u8> {
        let mem = unsafe { libc::shmat(id, std::ptr::null(), 0) };
        if mem as isize == -1 {
            return Err(errno());
        }
        Ok(mem.cast())
    }

    /// # Safety
    /// `addr` must be an address previously returned by [`attach`] and not
    /// yet detached.
    pub unsafe fn detach(addr: *mut u8) -> SysResult<()> {
        check(libc::shmdt(addr as *const libc::c_void)).map(|_| ())
    }

    pub fn remove(id: libc::c_int) -> SysResult<()> {
        check(unsafe { libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut()) }).map(|_| ())
    }

    /// Current number of attachments across all processes.
    pub fn attach_count(id: libc::c_int) -> SysResult<usize> {
        let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
        check(unsafe { libc::shmctl(id, libc::IPC_STAT, &mut ds) })?;
        Ok(ds.shm_nattch as usize)
    }
}
