//! Request bridge between the engine subprocess and an APDU backend.
//!
//! # Architecture
//!
//! ```text
//!            stdout lines                    dispatch
//! engine ───────────────▶ RequestBridge::serve ──────▶ ApduBackend
//!   ▲                             │
//!   │ stdin                       │ publish(response)
//!   └──── pump thread ◀── ResponseSlot (one pending response)
//! ```
//!
//! The engine runs with `LPAC_APDU=stdio`. Each line it prints is echoed to
//! the operator's output. `apdu` requests are dispatched synchronously and
//! exactly one response is published per request; anything else passes
//! through untouched. Because the engine blocks on its stdin after every
//! request, the single slot is always drained before the next publish.
//!
//! # Modules
//!
//! - [`messages`] - JSON envelopes
//! - [`slot`] - Single-slot stdin handoff

pub mod messages;
pub mod slot;

use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::backend::ApduBackend;
use crate::constants;
use messages::{ApduFunc, ApduRequest, ApduResponse, BridgeRequest, BridgeResponse};
use slot::{spawn_pump, ResponseSlot};

/// How to launch the external engine.
#[derive(Debug, Clone)]
pub struct EngineCommand {
    /// Executable name or path.
    pub program: OsString,
    /// Arguments forwarded verbatim.
    pub args: Vec<OsString>,
}

impl EngineCommand {
    /// Creates a launch description.
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<OsString>,
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env(constants::ENGINE_APDU_ENV, constants::ENGINE_APDU_STDIO)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }
}

/// Routes engine requests to a backend and feeds responses back.
pub struct RequestBridge<O = io::Stdout> {
    backend: Box<dyn ApduBackend>,
    operator: O,
}

impl<O> std::fmt::Debug for RequestBridge<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBridge").finish_non_exhaustive()
    }
}

impl RequestBridge<io::Stdout> {
    /// Creates a bridge that echoes traffic to standard output.
    pub fn new(backend: Box<dyn ApduBackend>) -> Self {
        Self::with_output(backend, io::stdout())
    }
}

impl<O: Write> RequestBridge<O> {
    /// Creates a bridge that echoes traffic to `operator`.
    pub fn with_output(backend: Box<dyn ApduBackend>, operator: O) -> Self {
        Self { backend, operator }
    }

    /// Consumes the bridge, returning the operator output.
    pub fn into_output(self) -> O {
        self.operator
    }

    /// Launches the engine and serves it until its output ends.
    ///
    /// Returns the engine's exit code (`-1` if it was killed by a signal).
    pub fn run(&mut self, engine: &EngineCommand) -> Result<i32> {
        let mut child = engine
            .to_command()
            .spawn()
            .with_context(|| format!("Failed to launch engine {:?}", engine.program))?;
        log::info!("Engine started (pid {})", child.id());

        let stdin = child.stdin.take().context("Engine stdin not captured")?;
        let stdout = child.stdout.take().context("Engine stdout not captured")?;

        let slot = Arc::new(ResponseSlot::new());
        let pump = spawn_pump(Arc::clone(&slot), stdin);

        let served = self.serve(BufReader::new(stdout), &slot);

        slot.close();
        if served.is_err() {
            // The engine may still be blocked on its stdin.
            if let Err(e) = child.kill() {
                log::warn!("Failed to stop engine: {e}");
            }
        }
        if pump.join().is_err() {
            log::error!("Stdin pump panicked");
        }
        let status = child.wait().context("Failed to wait for engine")?;
        served?;

        let code = status.code().unwrap_or(-1);
        log::info!("Engine exited with code {code}");
        Ok(code)
    }

    /// Reads engine output lines until EOF, publishing one response per
    /// `apdu` request.
    pub fn serve<R: BufRead>(&mut self, mut input: R, slot: &ResponseSlot) -> Result<()> {
        let mut raw = Vec::new();
        loop {
            raw.clear();
            let read = input
                .read_until(b'\n', &mut raw)
                .context("Failed to read engine output")?;
            if read == 0 {
                return Ok(());
            }

            let text = String::from_utf8_lossy(&raw);
            let line = text.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }

            writeln!(self.operator, "{line}").context("Failed to echo engine output")?;

            if let Some(response) = self.handle_line(line) {
                writeln!(self.operator, "{response}").context("Failed to echo response")?;
                self.operator.flush().context("Failed to flush operator output")?;
                slot.publish(response);
            }
        }
    }

    /// Handles one engine output line.
    ///
    /// Returns the response line for `apdu` requests, `None` for anything
    /// that is not ours to answer.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        let request: BridgeRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                log::debug!("Passing through non-JSON line ({e})");
                return None;
            }
        };
        if !request.is_apdu() {
            return None;
        }

        // The engine waits for an answer to every apdu line, so a payload we
        // cannot decode still gets a failure response.
        let payload = match request.apdu_payload() {
            Ok(payload) => dispatch(self.backend.as_mut(), &payload),
            Err(e) => {
                log::warn!("Malformed apdu payload: {e}");
                ApduResponse::error()
            }
        };
        let line = BridgeResponse::apdu(payload).to_line().unwrap_or_else(|e| {
            log::error!("Failed to encode apdu response: {e}");
            messages::APDU_ERROR_LINE.to_string()
        });
        Some(line)
    }
}

/// Runs one APDU request against `backend`.
pub fn dispatch(backend: &mut dyn ApduBackend, request: &ApduRequest) -> ApduResponse {
    let param = request.param.as_deref();
    log::debug!("apdu {} {:?}", request.func, param);

    match (ApduFunc::from(request.func.as_str()), param) {
        (ApduFunc::Connect, _) => status(backend.connect()),
        (ApduFunc::Disconnect, _) => status(backend.disconnect()),
        (ApduFunc::LogicChannelOpen, Some(aid)) => {
            ApduResponse::code(backend.logic_channel_open(aid).get())
        }
        (ApduFunc::LogicChannelClose, _) => status(backend.logic_channel_close()),
        (ApduFunc::Transmit, Some(apdu)) => match backend.transmit(apdu) {
            Some(data) => ApduResponse::data(data),
            None => ApduResponse::error(),
        },
        (ApduFunc::LogicChannelOpen | ApduFunc::Transmit, None) => {
            log::warn!("{} called without param", request.func);
            ApduResponse::error()
        }
        (ApduFunc::Unknown(name), _) => {
            log::warn!("Unrecognized apdu func {name:?}");
            ApduResponse::error()
        }
    }
}

fn status(ok: bool) -> ApduResponse {
    if ok {
        ApduResponse::ok()
    } else {
        ApduResponse::error()
    }
}
