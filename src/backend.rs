//! APDU backend capability interface.
//!
//! The bridge only ever talks to a [`ApduBackend`]. Two variants exist, both
//! built on the AT logic-channel engine:
//!
//! ```text
//! ApduBackend (trait)
//!     │
//!     └── AtEngine<T: AtTransport>
//!         ├── T = SerialTransport   (local modem port)
//!         └── T = KeeneticSession   (router HTTP tunnel)
//! ```
//!
//! The variant is chosen once at start-up by [`open_backend`] from
//! configuration presence.

use anyhow::{bail, Context, Result};

use crate::at::{AtEngine, SerialTransport};
use crate::config::{BackendKind, Config};
use crate::discovery::BackendDescriptor;
use crate::keenetic::KeeneticSession;

/// Identifier of the logical channel currently open on the card.
///
/// `-1` means no channel is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogicChannelId(i32);

impl LogicChannelId {
    /// No channel open.
    pub const NONE: Self = Self(-1);

    /// Wraps a channel number reported by the modem.
    pub fn new(id: u32) -> Self {
        i32::try_from(id).map_or(Self::NONE, Self)
    }

    /// Raw value as carried in `ecode`.
    pub fn get(self) -> i32 {
        self.0
    }

    /// Returns `true` when a channel is open.
    pub fn is_open(self) -> bool {
        self.0 >= 0
    }
}

impl Default for LogicChannelId {
    fn default() -> Self {
        Self::NONE
    }
}

impl std::fmt::Display for LogicChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operations an APDU backend offers to the engine.
///
/// Every operation is soft: transport and parse failures are reported through
/// the return value, never as a panic or error that aborts the bridge.
pub trait ApduBackend: Send {
    /// Prepares the backend for traffic (open port / authenticate).
    fn connect(&mut self) -> bool;

    /// Releases the backend's connection.
    fn disconnect(&mut self) -> bool;

    /// Opens a logical channel to the application `aid`.
    ///
    /// Returns [`LogicChannelId::NONE`] on failure.
    fn logic_channel_open(&mut self, aid: &str) -> LogicChannelId;

    /// Closes the current logical channel.
    fn logic_channel_close(&mut self) -> bool;

    /// Sends a hex-encoded APDU on the current channel and returns the
    /// hex-encoded response.
    fn transmit(&mut self, apdu: &str) -> Option<String>;

    /// Enumerates backends this variant can reach.
    fn list_backends(&mut self) -> Vec<BackendDescriptor>;
}

/// Builds the backend selected by `config`.
///
/// With `require_device` set (launching the engine), a missing device
/// identifier is a setup error. Discovery listing passes `false`.
pub fn open_backend(config: &Config, require_device: bool) -> Result<Box<dyn ApduBackend>> {
    if require_device && config.device.is_none() {
        bail!(
            "No AT device configured: set {} or {}",
            crate::config::DRIVER_IFID_VAR,
            crate::config::AT_DEVICE_VAR
        );
    }

    match (config.backend_kind(), &config.keenetic) {
        (BackendKind::Keenetic, Some(kn)) => {
            log::info!("Using Keenetic backend at {}", kn.address);
            let session = KeeneticSession::new(
                &kn.address,
                config.device.clone(),
                &kn.login,
                &kn.password,
            )
            .context("Failed to create router session")?;
            Ok(Box::new(AtEngine::new(session)))
        }
        _ => {
            if let Some(device) = &config.device {
                log::info!("Using serial backend on {device}");
            }
            let transport = SerialTransport::new(config.device.clone(), config.read_timeout)?;
            Ok(Box::new(AtEngine::new(transport)))
        }
    }
}
