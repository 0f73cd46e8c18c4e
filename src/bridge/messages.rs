//! JSON envelopes exchanged with the engine over stdio.
//!
//! Every message is one line: `{"type": <kind>, "payload": {...}}`.
//! Requests and responses carry no id; they are correlated by order.

use serde::{Deserialize, Serialize};

use crate::discovery::BackendDescriptor;

/// Envelope kind for APDU backend traffic.
pub const TYPE_APDU: &str = "apdu";
/// Envelope kind for engine-level (LPA) output.
pub const TYPE_LPA: &str = "lpa";

/// Pre-encoded `{"ecode":-1}` response, sent when a response cannot be encoded.
pub const APDU_ERROR_LINE: &str = r#"{"type":"apdu","payload":{"ecode":-1}}"#;

/// Any line the engine emits, decoded just far enough to route it.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeRequest {
    /// Envelope kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// Kind-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl BridgeRequest {
    /// Returns `true` for APDU backend requests.
    pub fn is_apdu(&self) -> bool {
        self.kind == TYPE_APDU
    }

    /// Decodes the payload of an APDU request.
    pub fn apdu_payload(&self) -> Result<ApduRequest, serde_json::Error> {
        ApduRequest::deserialize(&self.payload)
    }
}

/// Payload of an `apdu` request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApduRequest {
    /// Backend function name.
    pub func: String,
    /// Function argument (AID for open, hex APDU for transmit).
    #[serde(default)]
    pub param: Option<String>,
}

/// Backend functions the engine can call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApduFunc {
    /// Prepare the backend.
    Connect,
    /// Release the backend.
    Disconnect,
    /// Open a logical channel to an AID.
    LogicChannelOpen,
    /// Close the current logical channel.
    LogicChannelClose,
    /// Exchange one APDU.
    Transmit,
    /// Anything else.
    Unknown(String),
}

impl From<&str> for ApduFunc {
    fn from(name: &str) -> Self {
        match name {
            "connect" => Self::Connect,
            "disconnect" => Self::Disconnect,
            "logic_channel_open" => Self::LogicChannelOpen,
            "logic_channel_close" => Self::LogicChannelClose,
            "transmit" => Self::Transmit,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Payload of an `apdu` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApduResponse {
    /// `0` or a channel id on success, `-1` on failure.
    pub ecode: i32,
    /// Hex response data (transmit only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl ApduResponse {
    /// `{"ecode":0}`
    pub fn ok() -> Self {
        Self::code(0)
    }

    /// `{"ecode":-1}`
    pub fn error() -> Self {
        Self::code(-1)
    }

    /// `{"ecode":<code>}`
    pub fn code(ecode: i32) -> Self {
        Self { ecode, data: None }
    }

    /// `{"ecode":0,"data":<data>}`
    pub fn data(data: String) -> Self {
        Self {
            ecode: 0,
            data: Some(data),
        }
    }
}

/// Payload of the discovery listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LpaListing {
    /// Discovered backends.
    pub data: Vec<BackendDescriptor>,
}

/// Outgoing envelope.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeResponse<P> {
    /// Envelope kind.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Kind-specific payload.
    pub payload: P,
}

impl BridgeResponse<ApduResponse> {
    /// Wraps an APDU response payload.
    pub fn apdu(payload: ApduResponse) -> Self {
        Self {
            kind: TYPE_APDU,
            payload,
        }
    }
}

impl BridgeResponse<LpaListing> {
    /// Wraps a discovery listing payload.
    pub fn lpa(payload: LpaListing) -> Self {
        Self {
            kind: TYPE_LPA,
            payload,
        }
    }
}

impl<P: Serialize> BridgeResponse<P> {
    /// Serializes the envelope as a single JSON line (no trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_apdu_request_with_param() {
        let req: BridgeRequest = serde_json::from_str(
            r#"{"type":"apdu","payload":{"func":"transmit","param":"00A4040000"}}"#,
        )
        .unwrap();
        assert!(req.is_apdu());
        let payload = req.apdu_payload().unwrap();
        assert_eq!(payload.func, "transmit");
        assert_eq!(payload.param.as_deref(), Some("00A4040000"));
    }

    #[test]
    fn test_decode_apdu_request_without_param() {
        let req: BridgeRequest =
            serde_json::from_str(r#"{"type":"apdu","payload":{"func":"connect"}}"#).unwrap();
        assert_eq!(req.apdu_payload().unwrap().param, None);
    }

    #[test]
    fn test_decode_null_param() {
        let req: BridgeRequest = serde_json::from_str(
            r#"{"type":"apdu","payload":{"func":"logic_channel_open","param":null}}"#,
        )
        .unwrap();
        assert_eq!(req.apdu_payload().unwrap().param, None);
    }

    #[test]
    fn test_decode_non_apdu_request() {
        let req: BridgeRequest =
            serde_json::from_str(r#"{"type":"lpa","payload":{"code":0}}"#).unwrap();
        assert!(!req.is_apdu());
    }

    #[test]
    fn test_apdu_func_names() {
        assert_eq!(ApduFunc::from("connect"), ApduFunc::Connect);
        assert_eq!(ApduFunc::from("logic_channel_open"), ApduFunc::LogicChannelOpen);
        assert_eq!(ApduFunc::from("logic_channel_close"), ApduFunc::LogicChannelClose);
        assert_eq!(ApduFunc::from("reset"), ApduFunc::Unknown("reset".to_string()));
    }

    #[test]
    fn test_error_line_matches_encoded_error() {
        assert_eq!(
            BridgeResponse::apdu(ApduResponse::error()).to_line().unwrap(),
            APDU_ERROR_LINE
        );
    }

    #[test]
    fn test_to_line_reports_serialization_failure() {
        struct Unencodable;
        impl Serialize for Unencodable {
            fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("unencodable payload"))
            }
        }

        let envelope = BridgeResponse {
            kind: TYPE_APDU,
            payload: Unencodable,
        };
        let err = envelope.to_line().unwrap_err();
        assert!(err.to_string().contains("unencodable payload"));
    }

    #[test]
    fn test_encode_apdu_responses() {
        assert_eq!(
            BridgeResponse::apdu(ApduResponse::ok()).to_line().unwrap(),
            r#"{"type":"apdu","payload":{"ecode":0}}"#
        );
        assert_eq!(
            BridgeResponse::apdu(ApduResponse::error()).to_line().unwrap(),
            r#"{"type":"apdu","payload":{"ecode":-1}}"#
        );
        assert_eq!(
            BridgeResponse::apdu(ApduResponse::data("9000".to_string())).to_line().unwrap(),
            r#"{"type":"apdu","payload":{"ecode":0,"data":"9000"}}"#
        );
    }
}
