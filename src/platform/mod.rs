// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

#[cfg(unix)]
pub mod posix;

// Re-export the syscall layer under a uniform name.

#[cfg(unix)]
pub use posix::{msg, sem, shm};
