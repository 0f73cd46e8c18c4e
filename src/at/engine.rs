//! Logic-channel driver on top of an [`AtTransport`].
//!
//! The engine owns the single live [`LogicChannelId`] for its connection:
//!
//! ```text
//! Idle ──open ok──▶ ChannelOpen(id) ──transmit*──▶ ChannelOpen(id)
//!  ▲                        │
//!  └──────── close ─────────┘      (open failure keeps Idle, id = -1)
//! ```
//!
//! Only the bridge's dispatch loop calls into the engine, one request at a
//! time, so the channel id needs no lock.

use super::response::{parse_cgla, parse_channel_id};
use super::AtTransport;
use crate::backend::{ApduBackend, LogicChannelId};
use crate::discovery::BackendDescriptor;

/// AT logic-channel engine.
#[derive(Debug)]
pub struct AtEngine<T> {
    transport: T,
    channel: LogicChannelId,
}

impl<T: AtTransport> AtEngine<T> {
    /// Creates an idle engine over `transport`.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            channel: LogicChannelId::NONE,
        }
    }

    /// Currently open channel, or [`LogicChannelId::NONE`].
    pub fn channel(&self) -> LogicChannelId {
        self.channel
    }

    /// Borrows the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `AT+CCHO="<aid>"` and records the returned channel.
    pub fn open_channel(&mut self, aid: &str) -> LogicChannelId {
        let command = format!("AT+CCHO=\"{aid}\"");
        self.channel = match self.transport.send(&command) {
            Ok(lines) => match parse_channel_id(&lines) {
                Some(id) => LogicChannelId::new(id),
                None => {
                    log::warn!("No channel id in reply to {command}: {lines:?}");
                    LogicChannelId::NONE
                }
            },
            Err(e) => {
                log::warn!("{command} failed: {e}");
                LogicChannelId::NONE
            }
        };
        log::debug!("Logic channel now {}", self.channel);
        self.channel
    }

    /// Sends `AT+CCHC=<id>`.
    ///
    /// Always reports success: the modem's answer to a close is not
    /// surfaced. Closing while idle sends nothing.
    pub fn close_channel(&mut self) -> bool {
        if !self.channel.is_open() {
            log::debug!("Close requested with no open channel");
            return true;
        }
        let command = format!("AT+CCHC={}", self.channel);
        if let Err(e) = self.transport.send(&command) {
            log::warn!("{command} failed: {e}");
        }
        self.channel = LogicChannelId::NONE;
        true
    }

    /// Sends `AT+CGLA=<id>,<len>,"<apdu>"` and returns the response data.
    ///
    /// `<len>` is the length of the hex string, not of the decoded bytes.
    pub fn transmit(&mut self, apdu: &str) -> Option<String> {
        if !self.channel.is_open() {
            log::warn!("Transmit requested with no open channel");
            return None;
        }
        let command = format!("AT+CGLA={},{},\"{apdu}\"", self.channel, apdu.len());
        let lines = match self.transport.send(&command) {
            Ok(lines) => lines,
            Err(e) => {
                log::warn!("{command} failed: {e}");
                return None;
            }
        };
        let Some(reply) = parse_cgla(&lines) else {
            log::warn!("No +CGLA payload in reply: {lines:?}");
            return None;
        };
        if !reply.length_matches() {
            // Some firmwares count bytes, some count hex digits.
            log::warn!(
                "+CGLA declared length {} but data has {} characters",
                reply.declared_len,
                reply.data.len()
            );
        }
        Some(reply.data)
    }
}

impl<T: AtTransport> ApduBackend for AtEngine<T> {
    fn connect(&mut self) -> bool {
        match self.transport.connect() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Connect failed: {e}");
                false
            }
        }
    }

    fn disconnect(&mut self) -> bool {
        self.channel = LogicChannelId::NONE;
        match self.transport.disconnect() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Disconnect failed: {e}");
                false
            }
        }
    }

    fn logic_channel_open(&mut self, aid: &str) -> LogicChannelId {
        self.open_channel(aid)
    }

    fn logic_channel_close(&mut self) -> bool {
        self.close_channel()
    }

    fn transmit(&mut self, apdu: &str) -> Option<String> {
        AtEngine::transmit(self, apdu)
    }

    fn list_backends(&mut self) -> Vec<BackendDescriptor> {
        self.transport.list_backends()
    }
}
