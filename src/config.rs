// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Keys, permissions and shared layouts the cooperating processes agree on.
//
// Defaults are compiled in; each can be overridden through the environment,
// which exec'd children inherit.

use std::env;

use crate::error::{Error, Resource, Result, Target};
use crate::key::Key;
use crate::plain::Plain;
use crate::semaphore::SemaphoreSlot;

/// Default key of the log message queue.
pub const LOG_QUEUE_KEY: Key = Key::new(33889);
/// Default key of the coordination semaphore set.
pub const SEMAPHORE_KEY: Key = Key::new(33889);
/// Default key of the shared state segment.
pub const SHARED_MEMORY_KEY: Key = Key::new(33890);
/// Default object permissions.
pub const PERMISSIONS: u32 = 0o666;

pub const ENV_LOG_QUEUE_KEY: &str = "SYSVIPC_LOG_QUEUE_KEY";
pub const ENV_SEMAPHORE_KEY: &str = "SYSVIPC_SEMAPHORE_KEY";
pub const ENV_SHM_KEY: &str = "SYSVIPC_SHM_KEY";
pub const ENV_PERMISSIONS: &str = "SYSVIPC_PERMISSIONS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpcConfig {
    pub log_queue_key: Key,
    pub semaphore_key: Key,
    pub shared_memory_key: Key,
    pub permissions: u32,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            log_queue_key: LOG_QUEUE_KEY,
            semaphore_key: SEMAPHORE_KEY,
            shared_memory_key: SHARED_MEMORY_KEY,
            permissions: PERMISSIONS,
        }
    }
}

impl IpcConfig {
    /// Defaults overridden by `SYSVIPC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup(ENV_LOG_QUEUE_KEY) {
            cfg.log_queue_key = parse_key(ENV_LOG_QUEUE_KEY, &v)?;
        }
        if let Some(v) = lookup(ENV_SEMAPHORE_KEY) {
            cfg.semaphore_key = parse_key(ENV_SEMAPHORE_KEY, &v)?;
        }
        if let Some(v) = lookup(ENV_SHM_KEY) {
            cfg.shared_memory_key = parse_key(ENV_SHM_KEY, &v)?;
        }
        if let Some(v) = lookup(ENV_PERMISSIONS) {
            let digits = v.trim().trim_start_matches("0o");
            cfg.permissions = u32::from_str_radix(digits, 8)
                .ok()
                .filter(|p| *p <= 0o777)
                .ok_or_else(|| bad_value(ENV_PERMISSIONS, &v))?;
        }
        Ok(cfg)
    }

    /// The variables a child needs to see the same objects as this config.
    pub fn to_env(&self) -> [(&'static str, String); 4] {
        [
            (ENV_LOG_QUEUE_KEY, self.log_queue_key.to_string()),
            (ENV_SEMAPHORE_KEY, self.semaphore_key.to_string()),
            (ENV_SHM_KEY, self.shared_memory_key.to_string()),
            (ENV_PERMISSIONS, format!("{:o}", self.permissions)),
        ]
    }
}

/// Slots of the coordination semaphore set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaphoreId {
    /// Binary semaphore guarding [`SharedState`]. Starts at 1.
    StateLock,
}

impl SemaphoreId {
    /// Initial values, indexed like the set.
    pub const INITIAL: [u16; 1] = [1];
}

impl SemaphoreSlot for SemaphoreId {
    const COUNT: usize = 1;

    fn index(self) -> u16 {
        self as u16
    }
}

/// Contents of the shared state segment.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SharedState {
    /// Records posted by all producers so far.
    pub produced: u64,
    /// Producers that have finished.
    pub producers_done: u32,
    pub _pad: u32,
}

unsafe impl Plain for SharedState {}

fn bad_value(name: &str, value: &str) -> Error {
    Error::invalid(
        Target::new(Resource::Config),
        format!("{name}={value:?} is not valid"),
    )
}

fn parse_key(name: &str, value: &str) -> Result<Key> {
    let v = value.trim();
    let parsed = match v.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => v.parse::<i64>(),
    };
    parsed
        .ok()
        .and_then(|n| libc::key_t::try_from(n).ok())
        .map(Key::new)
        .ok_or_else(|| bad_value(name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let cfg = IpcConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(cfg, IpcConfig::default());
        assert_eq!(cfg.log_queue_key, Key::new(33889));
        assert_eq!(cfg.shared_memory_key, Key::new(33890));
        assert_eq!(cfg.permissions, 0o666);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = IpcConfig::from_lookup(lookup(&[
            (ENV_LOG_QUEUE_KEY, "0x1234"),
            (ENV_SEMAPHORE_KEY, " 77 "),
            (ENV_PERMISSIONS, "600"),
        ]))
        .expect("config");
        assert_eq!(cfg.log_queue_key, Key::new(0x1234));
        assert_eq!(cfg.semaphore_key, Key::new(77));
        assert_eq!(cfg.shared_memory_key, SHARED_MEMORY_KEY);
        assert_eq!(cfg.permissions, 0o600);
    }

    #[test]
    fn malformed_values_fail() {
        let err = IpcConfig::from_lookup(lookup(&[(ENV_SHM_KEY, "banana")])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        let err = IpcConfig::from_lookup(lookup(&[(ENV_PERMISSIONS, "999")])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn env_roundtrip() {
        let cfg = IpcConfig {
            log_queue_key: Key::new(5),
            semaphore_key: Key::new(6),
            shared_memory_key: Key::new(7),
            permissions: 0o640,
        };
        let vars = cfg.to_env();
        let pairs: Vec<(&str, &str)> = vars.iter().map(|(k, v)| (*k, v.as_str())).collect();
        assert_eq!(IpcConfig::from_lookup(lookup(&pairs)).expect("config"), cfg);
    }
}
