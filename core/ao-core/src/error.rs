//! Error types for ao-core operations.
//!
//! Every `AoError` is fatal: the binary prints it and exits non-zero.
//! Recoverable analyzer failures use [`crate::analyzer::AnalyzerError`] and are
//! reported inside the menu window instead.

use ao_protocol::{ErrorInfo, WindowId};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AoError {
    // ─────────────────────────────────────────────────────────────────────
    // Startup
    // ─────────────────────────────────────────────────────────────────────
    #[error("ao run outside acme window ($winid is not set)")]
    MissingWindowId,

    #[error("invalid $winid: {0}")]
    InvalidWindowId(ErrorInfo),

    #[error("Cannot create analyzer: {0}")]
    AnalyzerInit(String),

    #[error("Cannot listen for clients on {path}: {source}")]
    Listen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot accept clients: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Cannot change window: {0}")]
    Handoff(#[source] std::io::Error),

    // ─────────────────────────────────────────────────────────────────────
    // Window access
    // ─────────────────────────────────────────────────────────────────────
    #[error("{context} (window {id}): {source}")]
    Window {
        id: WindowId,
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create acme window: {0}")]
    CreateWindow(#[source] std::io::Error),

    #[error("Cannot read {field} of window {id}: {details}")]
    MalformedWindowFile {
        id: WindowId,
        field: &'static str,
        details: String,
    },

    #[error("window must be non-dirty to query. Save the file and try again")]
    DirtyWindow { id: WindowId },

    // ─────────────────────────────────────────────────────────────────────
    // Offsets
    // ─────────────────────────────────────────────────────────────────────
    #[error("Cannot decode unicode: {0}")]
    Decode(String),

    // ─────────────────────────────────────────────────────────────────────
    // Event loop
    // ─────────────────────────────────────────────────────────────────────
    /// The only client of the rendezvous socket always writes one well-formed
    /// line, so this means the protocol itself was broken.
    #[error("handoff protocol violation: {0}")]
    Protocol(ErrorInfo),
}

impl AoError {
    pub fn window(id: WindowId, context: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| AoError::Window {
            id,
            context,
            source,
        }
    }
}

/// Convenience type alias for Results using AoError.
pub type Result<T> = std::result::Result<T, AoError>;
