//! Application-wide constants for lpac-bridge.
//!
//! This module centralizes protocol strings, timeouts, and environment
//! names so the transports and the bridge agree on them.
//!
//! # Categories
//!
//! - **Timeouts**: Serial and HTTP exchange limits
//! - **Serial**: Fixed line parameters for local modems
//! - **Engine**: How the external engine is launched
//! - **Router**: Keenetic HTTP API names

use std::time::Duration;

// ============================================================================
// Timeouts
// ============================================================================

/// Default time allowed for a modem to finish a reply.
///
/// Matches the read timeout the modems were originally driven with. An
/// exchange that does not reach a terminal marker within this window is a
/// transport failure.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-read timeout handed to the serial driver.
///
/// Reads block at most this long, so the accumulation loop re-checks the
/// overall deadline frequently.
pub const SERIAL_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Back-off when a read returns no bytes without blocking.
pub const SERIAL_IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// HTTP client request timeout for router API calls.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Serial
// ============================================================================

/// Serial line speed (8-N-1 is applied alongside it).
pub const BAUD_RATE: u32 = 115_200;

/// Line ending written after every AT command.
pub const AT_LINE_ENDING: &str = "\r\n";

/// Markers that terminate a modem reply when they open a line.
pub const TERMINAL_MARKERS: [&str; 4] = ["OK", "ERROR", "+CME ERROR", "+CMS ERROR"];

// ============================================================================
// Engine
// ============================================================================

/// Environment variable that selects the engine's APDU backend.
pub const ENGINE_APDU_ENV: &str = "LPAC_APDU";

/// Value of [`ENGINE_APDU_ENV`] that makes the engine speak JSON over stdio.
pub const ENGINE_APDU_STDIO: &str = "stdio";

/// Default engine executable name (platform suffix is appended at runtime).
pub const DEFAULT_ENGINE: &str = "lpac.orig";

/// Arguments that, all present, request the discovery listing.
pub const LISTING_ARGS: [&str; 3] = ["driver", "apdu", "list"];

/// Optional `KEY=VALUE` file read from the working directory.
pub const ENV_FILE: &str = "lpac-kn.env";

// ============================================================================
// Router
// ============================================================================

/// Response header carrying the authentication realm.
pub const REALM_HEADER: &str = "X-NDM-Realm";

/// Response header carrying the authentication challenge.
pub const CHALLENGE_HEADER: &str = "X-NDM-Challenge";

/// Interface `type` reported for USB LTE modems.
pub const USB_LTE_INTERFACE_TYPE: &str = "UsbLte";

/// Returns the default engine program name for this platform.
pub fn default_engine() -> String {
    format!("{DEFAULT_ENGINE}{}", std::env::consts::EXE_SUFFIX)
}
