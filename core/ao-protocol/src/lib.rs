//! Rendezvous protocol shared by the primary ao instance and its secondaries.
//!
//! A secondary invocation connects to the rendezvous socket, writes the id of
//! the acme window it was started from as one line of ASCII decimal, and
//! closes the connection. There is no response. The primary reads that single
//! line and retargets itself.
//!
//! ```text
//! client -> server:  "42\n"
//! ```

use std::fmt;
use std::io::{self, BufRead, Read, Write};
use std::str::FromStr;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/ao";

/// Upper bound on a handoff line, newline included. A `u32` needs at most 10
/// digits; the rest is slack for a client that pads the line.
pub const MAX_MESSAGE_BYTES: usize = 32;

/// Identifier of an acme window, as found in `$winid` and the window's
/// directory name on the acme file server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u32);

impl WindowId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for WindowId {
    type Err = ErrorInfo;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ErrorInfo::new(
                "invalid_window_id",
                format!("window id must be decimal digits, got {:?}", value),
            ));
        }
        value.parse::<u32>().map(WindowId).map_err(|err| {
            ErrorInfo::new(
                "invalid_window_id",
                format!("window id {:?} is out of range: {}", value, err),
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorInfo {}

pub fn encode_handoff(id: WindowId) -> String {
    format!("{}\n", id)
}

/// Writes the single handoff line. The caller closes the connection.
pub fn write_handoff<W: Write>(writer: &mut W, id: WindowId) -> io::Result<()> {
    writer.write_all(encode_handoff(id).as_bytes())?;
    writer.flush()
}

/// Parses one handoff line. `line` must end with the newline; anything after
/// the first newline is not part of the message and is rejected.
pub fn parse_handoff(line: &[u8]) -> Result<WindowId, ErrorInfo> {
    if line.is_empty() {
        return Err(ErrorInfo::new("empty_message", "handoff message was empty"));
    }
    if line.len() > MAX_MESSAGE_BYTES {
        return Err(ErrorInfo::new(
            "message_too_large",
            "handoff message exceeded maximum size",
        ));
    }

    let body = match line.iter().position(|b| *b == b'\n') {
        Some(index) if index + 1 == line.len() => &line[..index],
        Some(_) => {
            return Err(ErrorInfo::new(
                "trailing_data",
                "handoff message carried data after the newline",
            ))
        }
        None => {
            return Err(ErrorInfo::new(
                "missing_newline",
                "handoff message was not newline terminated",
            ))
        }
    };

    let text = std::str::from_utf8(body)
        .map_err(|_| ErrorInfo::new("invalid_window_id", "handoff message was not ASCII"))?;
    text.parse()
}

/// Reads exactly one handoff line from `reader`, never more than
/// [`MAX_MESSAGE_BYTES`].
pub fn read_handoff<R: BufRead>(reader: R) -> Result<WindowId, ErrorInfo> {
    let mut line = Vec::with_capacity(16);
    reader
        .take(MAX_MESSAGE_BYTES as u64 + 1)
        .read_until(b'\n', &mut line)
        .map_err(|err| {
            ErrorInfo::new(
                "read_error",
                format!("failed to read handoff message: {}", err),
            )
        })?;
    parse_handoff(&line)
}
