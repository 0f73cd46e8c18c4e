//! Serial port transport for local AT modems.
//!
//! Replies have no length prefix, so a command exchange is framed by polling:
//! every available chunk is appended to an accumulator until a terminal
//! marker (`OK`, `ERROR`, `+CME ERROR`, `+CMS ERROR`) opens a line, or the
//! read timeout expires. A timeout is a transport failure; an `ERROR` reply is
//! a successful exchange carrying an error payload.

use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};

use super::response::{has_terminal_marker, split_lines};
use super::{AtTransport, TransportError};
use crate::constants;
use crate::discovery::{self, BackendDescriptor};

/// AT transport over a local serial port (115200-8-N-1).
pub struct SerialTransport {
    device: Option<String>,
    read_timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("device", &self.device)
            .field("read_timeout", &self.read_timeout)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl SerialTransport {
    /// Creates a transport for `device` without opening it.
    ///
    /// # Errors
    ///
    /// Returns an error if `device` is set but is neither an existing path nor
    /// a port the OS reports.
    pub fn new(device: Option<String>, read_timeout: Duration) -> Result<Self> {
        if let Some(name) = &device {
            if !port_exists(name) {
                bail!("Serial Port {name} not found");
            }
        }
        Ok(Self {
            device,
            read_timeout,
            port: None,
        })
    }

    /// Returns `true` while the port is open.
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl AtTransport for SerialTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        let Some(device) = &self.device else {
            return Err(TransportError::NotConnected);
        };
        let port = serialport::new(device, constants::BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(constants::SERIAL_POLL_TIMEOUT)
            .open()
            .map_err(|e| TransportError::Io(e.into()))?;
        log::info!("Opened serial port {device}");
        self.port = Some(port);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        if self.port.take().is_some() {
            log::info!("Closed serial port");
        }
        Ok(())
    }

    fn send(&mut self, command: &str) -> Result<Vec<String>, TransportError> {
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        port.clear(ClearBuffer::All)
            .map_err(|e| TransportError::Io(e.into()))?;
        let raw = exchange(&mut **port, command, self.read_timeout)?;
        Ok(split_lines(&raw))
    }

    fn list_backends(&mut self) -> Vec<BackendDescriptor> {
        discovery::serial_ports()
    }
}

/// Writes `command` and accumulates the reply until a terminal marker.
///
/// `port` reads are expected to return what is currently available, either
/// `Ok(0)` or a `TimedOut`/`WouldBlock` error when nothing has arrived.
pub fn exchange<P>(port: &mut P, command: &str, timeout: Duration) -> Result<String, TransportError>
where
    P: Read + Write + ?Sized,
{
    log::debug!("AT >> {command}");
    port.write_all(command.as_bytes())?;
    port.write_all(constants::AT_LINE_ENDING.as_bytes())?;
    port.flush()?;

    let deadline = Instant::now() + timeout;
    let mut accumulated = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        match port.read(&mut chunk) {
            Ok(0) => std::thread::sleep(constants::SERIAL_IDLE_BACKOFF),
            Ok(n) => {
                accumulated.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&accumulated);
                if has_terminal_marker(&text) {
                    log::debug!("AT << {text:?}");
                    return Ok(text.into_owned());
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(TransportError::Io(e)),
        }

        if Instant::now() >= deadline {
            log::warn!(
                "No terminal marker after {:?}; partial reply {:?}",
                timeout,
                String::from_utf8_lossy(&accumulated)
            );
            return Err(TransportError::Timeout);
        }
    }
}

/// A device is usable if it is an existing path or an enumerated port name.
fn port_exists(name: &str) -> bool {
    Path::new(name).exists()
        || serialport::available_ports()
            .map(|ports| ports.iter().any(|p| p.port_name.eq_ignore_ascii_case(name)))
            .unwrap_or(false)
}
