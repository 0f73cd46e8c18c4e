//! lpac-bridge - stdio APDU backend for AT-command modems.
//!
//! This crate lets an eSIM management engine that speaks the line-delimited
//! JSON "stdio" APDU backend protocol reach an eUICC behind an AT-command
//! modem, either on a local serial port or tunnelled through a Keenetic
//! router's HTTP API.
//!
//! # Architecture
//!
//! - **Bridge** - Owns the engine subprocess and answers its requests
//! - **Backend** - Capability interface the bridge dispatches to
//! - **AT engine** - Logic-channel lifecycle over any AT transport
//! - **Transports** - Serial port or router HTTP session
//!
//! # Modules
//!
//! - [`bridge`] - Engine subprocess and request dispatch
//! - [`backend`] - `ApduBackend` trait and start-up selection
//! - [`at`] - AT logic-channel protocol and serial transport
//! - [`keenetic`] - Router HTTP transport
//! - [`discovery`] - Backend listing
//! - [`config`] - Configuration loading

pub mod at;
pub mod backend;
pub mod bridge;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod keenetic;

// Re-export commonly used types
pub use backend::{open_backend, ApduBackend, LogicChannelId};
pub use bridge::{EngineCommand, RequestBridge};
pub use config::{BackendKind, Config};
pub use discovery::BackendDescriptor;
