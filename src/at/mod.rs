//! AT-command logic-channel protocol.
//!
//! An [`AtTransport`] carries one command and returns the reply lines; the
//! [`AtEngine`] turns the three logical operations (open, transmit, close)
//! into `AT+CCHO`, `AT+CGLA` and `AT+CCHC` and parses the replies.
//!
//! # Modules
//!
//! - [`engine`] - Logic-channel state and command mapping
//! - [`response`] - Reply framing and tolerant parsing
//! - [`serial`] - Local serial port transport

pub mod engine;
pub mod response;
pub mod serial;

pub use engine::AtEngine;
pub use serial::SerialTransport;

use crate::discovery::BackendDescriptor;

/// Errors that can occur while exchanging a command with a modem.
#[derive(Debug)]
pub enum TransportError {
    /// No open connection to send through.
    NotConnected,
    /// No terminal marker arrived within the read timeout.
    Timeout,
    /// Underlying I/O failure on the port.
    Io(std::io::Error),
    /// Router answered with an unexpected HTTP status.
    Http(u16),
    /// Router rejected the credentials.
    Unauthorized,
    /// Request could not be built or the reply was malformed.
    Protocol(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "Transport not connected"),
            Self::Timeout => write!(f, "Timed out waiting for modem reply"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Http(status) => write!(f, "Unexpected HTTP status {status}"),
            Self::Unauthorized => write!(f, "Authentication rejected"),
            Self::Protocol(msg) => write!(f, "Protocol error: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::Timeout
        } else {
            Self::Io(e)
        }
    }
}

/// A medium that can carry one AT command and return its reply.
///
/// `send` returns the reply split into non-empty lines, which is the shape
/// the [`response`] parsers consume.
pub trait AtTransport: Send {
    /// Opens the medium.
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Closes the medium.
    fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Sends `command` and waits for the complete reply.
    fn send(&mut self, command: &str) -> Result<Vec<String>, TransportError>;

    /// Enumerates backends reachable through this kind of medium.
    fn list_backends(&mut self) -> Vec<BackendDescriptor>;
}
