//! Backend discovery for the engine's `driver apdu list` request.
//!
//! Discovery is independent of the transmit path: it enumerates candidate
//! backends (local serial ports, or router modem interfaces) and renders them
//! as the `lpa` listing envelope the engine prints.

use serde::Serialize;
use serialport::SerialPortType;

use crate::bridge::messages::{BridgeResponse, LpaListing};
use crate::constants;

/// One discoverable backend: an identifier to put in `DRIVER_IFID`, plus a
/// human-readable name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendDescriptor {
    /// Port name or router interface id.
    pub env: String,
    /// Human-readable description.
    pub name: String,
}

impl BackendDescriptor {
    /// Creates a descriptor.
    pub fn new(env: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            name: name.into(),
        }
    }
}

/// Returns `true` if the forwarded arguments ask for the backend listing.
///
/// Every word of `driver apdu list` must be present, in any order and case.
pub fn is_listing_request<S: AsRef<str>>(args: &[S]) -> bool {
    constants::LISTING_ARGS
        .iter()
        .all(|word| args.iter().any(|a| a.as_ref().eq_ignore_ascii_case(word)))
}

/// Enumerates local serial ports.
///
/// Enumeration failure yields an empty list.
pub fn serial_ports() -> Vec<BackendDescriptor> {
    match serialport::available_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(|p| {
                let name = port_label(&p.port_type);
                BackendDescriptor::new(p.port_name, name)
            })
            .collect(),
        Err(e) => {
            log::warn!("Serial port enumeration failed: {e}");
            Vec::new()
        }
    }
}

/// USB product string, else manufacturer, else a port-type label.
fn port_label(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => usb
            .product
            .clone()
            .or_else(|| usb.manufacturer.clone())
            .unwrap_or_else(|| format!("USB Serial Device {:04x}:{:04x}", usb.vid, usb.pid)),
        SerialPortType::PciPort => "PCI Serial Port".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth Serial Port".to_string(),
        SerialPortType::Unknown => "Serial Port".to_string(),
    }
}

/// Renders the `{"type":"lpa","payload":{"data":[...]}}` listing line.
pub fn listing_response(items: &[BackendDescriptor]) -> Result<String, serde_json::Error> {
    let envelope = BridgeResponse::lpa(LpaListing {
        data: items.to_vec(),
    });
    envelope.to_line()
}
