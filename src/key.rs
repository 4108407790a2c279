// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Kernel object keys. Cooperating processes agree on keys out-of-band,
// usually as compiled-in constants or via `ftok` on a shared path.

use std::ffi::CString;
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::error::{Error, Resource, Result, Target};

/// A System V IPC key (`key_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(libc::key_t);

impl Key {
    /// `IPC_PRIVATE`: always creates a fresh object nobody else can look up.
    pub const PRIVATE: Key = Key(libc::IPC_PRIVATE);

    pub const fn new(raw: libc::key_t) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> libc::key_t {
        self.0
    }

    /// Derive a key from an existing path and a project id, like `ftok(3)`.
    ///
    /// Only the low 8 bits of `proj_id` are used and they must not be zero.
    pub fn from_path(path: &Path, proj_id: u8) -> Result<Self> {
        let target = Target::new(Resource::Config);
        if proj_id == 0 {
            return Err(Error::invalid(target, "ftok project id must be non-zero"));
        }
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| Error::invalid(target, e.to_string()))?;
        let key = unsafe { libc::ftok(c_path.as_ptr(), libc::c_int::from(proj_id)) };
        if key == -1 {
            return Err(Error::from_io(target, std::io::Error::last_os_error()));
        }
        Ok(Self(key))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<libc::key_t> for Key {
    fn from(raw: libc::key_t) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ftok_is_stable_for_same_path() {
        let dir = std::env::temp_dir();
        let a = Key::from_path(&dir, 7).expect("ftok");
        let b = Key::from_path(&dir, 7).expect("ftok");
        let c = Key::from_path(&dir, 8).expect("ftok");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn ftok_rejects_zero_project() {
        let err = Key::from_path(Path::new("/"), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn ftok_missing_path_is_not_found() {
        let err = Key::from_path(Path::new("/definitely/not/here/sysvipc"), 1).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn display_is_decimal() {
        assert_eq!(Key::new(33889).to_string(), "33889");
    }
}
