//! Reply framing and parsing for AT logic-channel commands.
//!
//! Modem firmwares disagree on reply shapes, so every parser here accepts
//! each shape that has been seen in the field:
//!
//! - `AT+CCHO` answers either `+CCHO: <id>` (labelled) or a bare `<id>` line
//!   directly followed by `OK` (legacy).
//! - `AT+CGLA` answers `+CGLA: <length>,<data>`, with `data` optionally quoted.

use crate::constants::TERMINAL_MARKERS;

/// Returns `true` once `text` contains a terminal marker opening a line.
///
/// `OK` and `ERROR` must be the whole line (followed by a line break or the
/// end of the buffer). `+CME ERROR` / `+CMS ERROR` match as prefixes, since
/// they carry an error code.
pub fn has_terminal_marker(text: &str) -> bool {
    text.match_indices('\n').any(|(idx, _)| {
        let rest = &text[idx + 1..];
        TERMINAL_MARKERS.iter().any(|marker| {
            let Some(after) = rest.strip_prefix(marker) else {
                return false;
            };
            if marker.starts_with('+') {
                return true;
            }
            after.is_empty() || after.starts_with(['\r', '\n'])
        })
    })
}

/// Splits a raw reply into trimmed, non-empty lines.
pub fn split_lines(raw: &str) -> Vec<String> {
    raw.split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extracts the channel id from an `AT+CCHO` reply.
///
/// The labelled form is searched across all lines first; only if no line
/// carries it is the legacy bare-number form tried.
pub fn parse_channel_id<S: AsRef<str>>(lines: &[S]) -> Option<u32> {
    lines
        .iter()
        .find_map(|line| labelled_channel_id(line.as_ref()))
        .or_else(|| legacy_channel_id(lines))
}

/// `+CCHO: <digits>` anywhere in the line.
fn labelled_channel_id(line: &str) -> Option<u32> {
    let (_, rest) = line.split_once("+CCHO:")?;
    leading_number(rest.trim_start()).map(|(id, _)| id)
}

/// A line that is only digits, immediately followed by an `OK` line.
fn legacy_channel_id<S: AsRef<str>>(lines: &[S]) -> Option<u32> {
    lines.windows(2).find_map(|pair| {
        let (value, status) = (pair[0].as_ref().trim(), pair[1].as_ref().trim());
        if status != "OK" || value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        value.parse().ok()
    })
}

/// Payload of a `+CGLA:` reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CglaReply {
    /// Length declared by the modem.
    pub declared_len: usize,
    /// Response data with surrounding quotes removed.
    pub data: String,
}

impl CglaReply {
    /// Returns `true` if the declared length matches the data length.
    pub fn length_matches(&self) -> bool {
        self.declared_len == self.data.len()
    }
}

/// Extracts the first `+CGLA: <length>,<data>` payload from a reply.
pub fn parse_cgla<S: AsRef<str>>(lines: &[S]) -> Option<CglaReply> {
    lines.iter().find_map(|line| cgla_line(line.as_ref()))
}

fn cgla_line(line: &str) -> Option<CglaReply> {
    let (_, rest) = line.split_once("+CGLA:")?;
    let (declared_len, rest) = leading_number(rest.trim_start())?;
    let rest = rest.strip_prefix(',')?;
    let token = rest.split(char::is_whitespace).next().unwrap_or_default();
    if token.is_empty() {
        return None;
    }
    Some(CglaReply {
        declared_len: declared_len as usize,
        data: token.trim_matches('"').to_string(),
    })
}

/// Parses a run of ASCII digits at the start of `s`.
fn leading_number(s: &str) -> Option<(u32, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let value = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}
