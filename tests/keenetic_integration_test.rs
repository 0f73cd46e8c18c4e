//! Integration tests for the Keenetic router transport.
//!
//! A wiremock server stands in for the router. The blocking HTTP client must
//! not be created or dropped on the test runtime, so each session lives
//! entirely inside `spawn_blocking`.

use lpac_bridge::at::{AtEngine, AtTransport, TransportError};
use lpac_bridge::keenetic::digest::password_digest;
use lpac_bridge::keenetic::KeeneticSession;
use lpac_bridge::{ApduBackend, BackendDescriptor};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LOGIN: &str = "admin";
const PASSWORD: &str = "secret";
const REALM: &str = "Keenetic Giga";
const CHALLENGE: &str = "ABCDEF";
const AID: &str = "A0000005591010FFFFFFFF8900000100";

fn challenge_response() -> ResponseTemplate {
    ResponseTemplate::new(401)
        .insert_header("X-NDM-Realm", REALM)
        .insert_header("X-NDM-Challenge", CHALLENGE)
}

fn expected_auth_body() -> serde_json::Value {
    json!({
        "login": LOGIN,
        "password": password_digest(LOGIN, REALM, PASSWORD, CHALLENGE),
    })
}

/// Router that always challenges and accepts the correct digest.
async fn challenging_router() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(challenge_response())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .and(body_json(expected_auth_body()))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

fn session(uri: &str, interface: Option<&str>) -> KeeneticSession {
    KeeneticSession::new(uri, interface.map(str::to_string), LOGIN, PASSWORD)
        .expect("valid router address")
}

/// Runs `f` against a fresh session on a blocking thread.
async fn with_session<F, R>(server: &MockServer, interface: Option<&'static str>, f: F) -> R
where
    F: FnOnce(KeeneticSession) -> R + Send + 'static,
    R: Send + 'static,
{
    let uri = server.uri();
    tokio::task::spawn_blocking(move || f(session(&uri, interface)))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_challenge_then_success() {
    let server = challenging_router().await;
    let result = with_session(&server, None, |mut transport| transport.connect()).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_valid_session_skips_challenge() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = with_session(&server, None, |transport| transport.authenticate()).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_second_unauthorized_is_a_hard_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(challenge_response())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let result = with_session(&server, None, |transport| transport.authenticate()).await;
    assert!(matches!(result, Err(TransportError::Unauthorized)));
}

#[tokio::test]
async fn test_missing_challenge_header_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(401).insert_header("X-NDM-Realm", REALM))
        .mount(&server)
        .await;

    let result = with_session(&server, None, |transport| transport.authenticate()).await;
    assert!(matches!(result, Err(TransportError::Protocol(_))));
}

#[tokio::test]
async fn test_tty_send_returns_tty_out_lines() {
    let server = challenging_router().await;
    Mock::given(method("POST"))
        .and(path("/rci/interface/UsbLte0/tty/send"))
        .and(body_json(json!({ "command": "AT+CCHC=1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tty-out": ["", "OK"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lines = with_session(&server, Some("UsbLte0"), |mut transport| {
        transport.send("AT+CCHC=1")
    })
    .await
    .unwrap();
    assert_eq!(lines, vec!["OK"]);
}

#[tokio::test]
async fn test_engine_over_router_open_transmit_close() {
    let server = challenging_router().await;
    Mock::given(method("POST"))
        .and(path("/rci/interface/UsbLte0/tty/send"))
        .and(body_json(json!({ "command": format!("AT+CCHO=\"{AID}\"") })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tty-out": ["+CCHO: 2", "OK"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rci/interface/UsbLte0/tty/send"))
        .and(body_json(json!({ "command": "AT+CGLA=2,10,\"00A4040000\"" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tty-out": ["+CGLA: 4,\"9000\"", "OK"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rci/interface/UsbLte0/tty/send"))
        .and(body_json(json!({ "command": "AT+CCHC=2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tty-out": ["OK"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (channel, data, closed, after) = with_session(&server, Some("UsbLte0"), |transport| {
        let mut engine = AtEngine::new(transport);
        let channel = engine.logic_channel_open(AID);
        let data = engine.transmit("00A4040000");
        let closed = engine.logic_channel_close();
        (channel.get(), data, closed, engine.channel().get())
    })
    .await;

    assert_eq!(channel, 2);
    assert_eq!(data.as_deref(), Some("9000"));
    assert!(closed);
    assert_eq!(after, -1);
}

#[tokio::test]
async fn test_tty_send_non_ok_status_is_soft_failure() {
    let server = challenging_router().await;
    Mock::given(method("POST"))
        .and(path("/rci/interface/UsbLte0/tty/send"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let channel = with_session(&server, Some("UsbLte0"), |transport| {
        let mut engine = AtEngine::new(transport);
        engine.logic_channel_open(AID).get()
    })
    .await;
    assert_eq!(channel, -1);
}

#[tokio::test]
async fn test_interface_listing_keeps_usb_lte() {
    let server = challenging_router().await;
    Mock::given(method("GET"))
        .and(path("/rci/show/interface"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Bridge0": { "type": "Bridge", "description": "Home network" },
            "UsbLte0": { "type": "UsbLte", "description": "Fibocom L850" },
            "Wireguard0": { "type": "Wireguard", "description": "VPN" }
        })))
        .mount(&server)
        .await;

    let items = with_session(&server, None, |mut transport| transport.list_backends()).await;
    assert_eq!(items, vec![BackendDescriptor::new("UsbLte0", "Fibocom L850")]);
}

#[tokio::test]
async fn test_interface_listing_failure_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(challenge_response())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let items = with_session(&server, None, |session| session.interfaces()).await;
    assert!(items.is_empty());
}
