//! Configuration loading.
//!
//! Settings come from process environment variables, overlaid on an optional
//! `lpac-kn.env` file in the working directory. The process environment
//! always wins over the file.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::constants;

/// Primary device identifier variable.
pub const DRIVER_IFID_VAR: &str = "DRIVER_IFID";
/// Fallback device identifier variable.
pub const AT_DEVICE_VAR: &str = "AT_DEVICE";
/// Router base address; its presence selects the HTTP backend.
pub const KN_ADDRESS_VAR: &str = "AT_KN_ADDRESS";
/// Router login.
pub const KN_LOGIN_VAR: &str = "AT_KN_LOGIN";
/// Router password.
pub const KN_PASSWORD_VAR: &str = "AT_KN_PASSWORD";
/// Serial read timeout in seconds.
pub const TIMEOUT_VAR: &str = "AT_TIMEOUT";

/// Which transport the backend talks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Local serial AT port.
    Serial,
    /// AT interface tunnelled through a Keenetic router's HTTP API.
    Keenetic,
}

/// Credentials and address for the router HTTP API.
#[derive(Clone)]
pub struct KeeneticConfig {
    /// Base URL of the router API (e.g. `http://192.168.1.1/`).
    pub address: String,
    /// Router account name.
    pub login: String,
    /// Router account password.
    pub password: String,
}

impl std::fmt::Debug for KeeneticConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeeneticConfig")
            .field("address", &self.address)
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

/// Runtime configuration for the bridge.
#[derive(Debug, Clone)]
pub struct Config {
    /// Serial port name/path, or router interface id for the HTTP backend.
    pub device: Option<String>,
    /// Router settings; `Some` selects [`BackendKind::Keenetic`].
    pub keenetic: Option<KeeneticConfig>,
    /// Time allowed for a serial reply to reach its terminal marker.
    pub read_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: None,
            keenetic: None,
            read_timeout: constants::DEFAULT_READ_TIMEOUT,
        }
    }
}

impl Config {
    /// Loads configuration from the environment and `lpac-kn.env`.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(constants::ENV_FILE))
    }

    /// Loads configuration from the environment overlaid on `env_file`.
    ///
    /// A variable set in the process environment hides the file's value.
    pub fn load_from(env_file: &Path) -> Result<Self> {
        let file = load_env_file(env_file);
        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .or_else(|| file.get(key).cloned())
        })
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let device = get(DRIVER_IFID_VAR).or_else(|| get(AT_DEVICE_VAR));

        let keenetic = match get(KN_ADDRESS_VAR) {
            Some(address) => {
                let Some(login) = get(KN_LOGIN_VAR) else {
                    bail!("{KN_LOGIN_VAR} is empty");
                };
                let Some(password) = get(KN_PASSWORD_VAR) else {
                    bail!("{KN_PASSWORD_VAR} is empty");
                };
                Some(KeeneticConfig {
                    address,
                    login,
                    password,
                })
            }
            None => None,
        };

        let mut read_timeout = constants::DEFAULT_READ_TIMEOUT;
        if let Some(raw) = get(TIMEOUT_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => read_timeout = Duration::from_secs(secs),
                _ => log::warn!("Ignoring invalid {TIMEOUT_VAR}={raw}"),
            }
        }

        Ok(Self {
            device,
            keenetic,
            read_timeout,
        })
    }

    /// Returns which backend this configuration selects.
    pub fn backend_kind(&self) -> BackendKind {
        if self.keenetic.is_some() {
            BackendKind::Keenetic
        } else {
            BackendKind::Serial
        }
    }
}

/// Reads a `KEY=VALUE` file, returning an empty map if it is absent.
pub fn load_env_file(path: &Path) -> HashMap<String, String> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            log::debug!("Loaded settings from {}", path.display());
            parse_env_file(&content)
        }
        Err(_) => HashMap::new(),
    }
}

/// Parses `KEY=VALUE` lines. The first `=` splits; other lines are skipped.
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            let value = value.trim_end_matches('\r');
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
