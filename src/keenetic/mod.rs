//! Keenetic router transport.
//!
//! The router exposes the modem's AT port through its HTTP API, so the same
//! logic-channel engine drives a remote modem:
//!
//! 1. `GET auth`: `200` means the session cookie is still valid. `401`
//!    carries `X-NDM-Realm` and `X-NDM-Challenge` headers.
//! 2. `POST auth` with `{"login", "password": digest}`: `200` means the
//!    session is established.
//! 3. `POST rci/interface/<id>/tty/send` with `{"command": ...}` returns the
//!    reply lines in `tty-out`.
//!
//! Authentication is checked before every command; the cookie store keeps
//! the session between calls.
//!
//! # Modules
//!
//! - [`digest`] - Challenge-response password digest

pub mod digest;

use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};
use serde_json::{json, Value};

use crate::at::{AtTransport, TransportError};
use crate::constants;
use crate::discovery::BackendDescriptor;

/// Authenticated HTTP session with a Keenetic router.
#[derive(Clone)]
pub struct KeeneticSession {
    client: Client,
    base: Url,
    interface: Option<String>,
    login: String,
    password: String,
}

impl std::fmt::Debug for KeeneticSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeeneticSession")
            .field("base", &self.base.as_str())
            .field("interface", &self.interface)
            .field("login", &self.login)
            .finish_non_exhaustive()
    }
}

impl KeeneticSession {
    /// Creates a session for the router at `address`.
    ///
    /// `interface` is the modem interface id used for `tty/send`; it may be
    /// `None` when only listing interfaces.
    ///
    /// # Errors
    ///
    /// Returns an error if `address` is not a valid URL or the HTTP client
    /// cannot be built.
    pub fn new(
        address: &str,
        interface: Option<String>,
        login: &str,
        password: &str,
    ) -> Result<Self, TransportError> {
        let mut normalized = address.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base = Url::parse(&normalized)
            .map_err(|e| TransportError::Protocol(format!("Invalid router address {address:?}: {e}")))?;

        let client = Client::builder()
            .cookie_store(true)
            .timeout(constants::HTTP_REQUEST_TIMEOUT)
            .build()
            .map_err(request_error)?;

        Ok(Self {
            client,
            base,
            interface,
            login: login.to_string(),
            password: password.to_string(),
        })
    }

    /// Returns the normalized router base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path)
            .map_err(|e| TransportError::Protocol(format!("Invalid endpoint {path:?}: {e}")))
    }

    fn get(&self, path: &str) -> Result<Response, TransportError> {
        self.client
            .get(self.endpoint(path)?)
            .send()
            .map_err(request_error)
    }

    fn post(&self, path: &str, body: &Value) -> Result<Response, TransportError> {
        self.client
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .map_err(request_error)
    }

    /// Ensures the session is authenticated, answering one challenge if the
    /// router asks for it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unauthorized`] if the router rejects the
    /// digest, or another error if the exchange fails.
    pub fn authenticate(&self) -> Result<(), TransportError> {
        let response = self.get("auth")?;
        match response.status() {
            StatusCode::OK => return Ok(()),
            StatusCode::UNAUTHORIZED => {}
            other => return Err(TransportError::Http(other.as_u16())),
        }

        let realm = header_value(&response, constants::REALM_HEADER)?;
        let challenge = header_value(&response, constants::CHALLENGE_HEADER)?;
        let password = digest::password_digest(&self.login, &realm, &self.password, &challenge);

        let response = self.post(
            "auth",
            &json!({ "login": self.login, "password": password }),
        )?;
        match response.status() {
            StatusCode::OK => {
                log::debug!("Authenticated with router as {}", self.login);
                Ok(())
            }
            StatusCode::UNAUTHORIZED => Err(TransportError::Unauthorized),
            other => Err(TransportError::Http(other.as_u16())),
        }
    }

    /// Lists the router's USB LTE modem interfaces.
    ///
    /// Any failure yields an empty list.
    pub fn interfaces(&self) -> Vec<BackendDescriptor> {
        match self.fetch_interfaces() {
            Ok(items) => items,
            Err(e) => {
                log::warn!("Router interface listing failed: {e}");
                Vec::new()
            }
        }
    }

    fn fetch_interfaces(&self) -> Result<Vec<BackendDescriptor>, TransportError> {
        self.authenticate()?;
        let response = self.get("rci/show/interface")?;
        if response.status() != StatusCode::OK {
            return Err(TransportError::Http(response.status().as_u16()));
        }
        let body: Value = response.json().map_err(request_error)?;
        Ok(usb_lte_interfaces(&body))
    }

    fn tty_send(&self, command: &str) -> Result<Vec<String>, TransportError> {
        let interface = self
            .interface
            .as_deref()
            .ok_or_else(|| TransportError::Protocol("No router interface configured".into()))?;

        log::debug!("AT >> {command} (via {interface})");
        let response = self.post(
            &format!("rci/interface/{interface}/tty/send"),
            &json!({ "command": command }),
        )?;
        if response.status() != StatusCode::OK {
            return Err(TransportError::Http(response.status().as_u16()));
        }
        let body: Value = response.json().map_err(request_error)?;
        let lines = tty_out_lines(&body);
        log::debug!("AT << {lines:?}");
        Ok(lines)
    }
}

impl AtTransport for KeeneticSession {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.authenticate()
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn send(&mut self, command: &str) -> Result<Vec<String>, TransportError> {
        self.authenticate()?;
        self.tty_send(command)
    }

    fn list_backends(&mut self) -> Vec<BackendDescriptor> {
        self.interfaces()
    }
}

fn header_value(response: &Response, name: &str) -> Result<String, TransportError> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| TransportError::Protocol(format!("Missing {name} header")))
}

fn request_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Protocol(e.to_string())
    }
}

/// Picks the `UsbLte` entries out of a `show/interface` object.
///
/// The object key is the interface id; the description (empty when absent)
/// becomes the name.
pub fn usb_lte_interfaces(body: &Value) -> Vec<BackendDescriptor> {
    let Some(interfaces) = body.as_object() else {
        return Vec::new();
    };
    interfaces
        .iter()
        .filter(|(_, iface)| iface["type"].as_str() == Some(constants::USB_LTE_INTERFACE_TYPE))
        .map(|(id, iface)| {
            let name = iface["description"].as_str().unwrap_or_default();
            BackendDescriptor::new(id.as_str(), name)
        })
        .collect()
}

/// Extracts the non-blank `tty-out` lines of a `tty/send` reply.
fn tty_out_lines(body: &Value) -> Vec<String> {
    body["tty-out"]
        .as_array()
        .map(|lines| {
            lines
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
