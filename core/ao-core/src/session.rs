//! Window sessions: turning "the user's selection in window N" into a query
//! position.
//!
//! A session is opened fresh every time it is needed and never cached. After a
//! handoff the same id may name a different window, and acme windows change
//! under us anyway.

use crate::error::{AoError, Result};
use crate::offsets;
use crate::window::{WinFile, Window, WindowSystem};
use ao_protocol::WindowId;
use std::fmt;
use tracing::debug;

/// Field of the ctl record that holds the dirty flag:
/// `id taglen bodylen isdir isdirty ...`.
pub const CTL_DIRTY_FIELD: usize = 4;

/// Argument to the analyzer: a file and a byte range within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPosition {
    pub file: String,
    pub start: usize,
    pub end: usize,
}

impl fmt::Display for QueryPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:#{},#{}", self.file, self.start, self.end)
    }
}

pub struct WindowSession<W> {
    window: W,
}

impl<W: Window> WindowSession<W> {
    pub fn open<S>(system: &S, id: WindowId) -> Result<Self>
    where
        S: WindowSystem<Window = W>,
    {
        let window = system
            .open(id)
            .map_err(AoError::window(id, "Cannot open acme window"))?;
        Ok(Self { window })
    }

    pub fn id(&self) -> WindowId {
        self.window.id()
    }

    /// First whitespace-separated field of the tag.
    pub fn file_name(&mut self) -> Result<String> {
        let id = self.id();
        let tag = self
            .window
            .read_all(WinFile::Tag)
            .map_err(AoError::window(id, "Cannot get current file name"))?;
        String::from_utf8_lossy(&tag)
            .split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| AoError::MalformedWindowFile {
                id,
                field: "tag",
                details: "tag is empty".to_string(),
            })
    }

    pub fn is_dirty(&mut self) -> Result<bool> {
        let id = self.id();
        let ctl = self
            .window
            .read_all(WinFile::Ctl)
            .map_err(AoError::window(id, "Cannot read window state"))?;
        let text = String::from_utf8_lossy(&ctl);
        let dirty = text
            .split_whitespace()
            .nth(CTL_DIRTY_FIELD)
            .ok_or_else(|| AoError::MalformedWindowFile {
                id,
                field: "ctl",
                details: format!("expected at least {} fields", CTL_DIRTY_FIELD + 1),
            })?;
        Ok(dirty != "0")
    }

    /// Current selection (dot) in characters.
    pub fn selection(&mut self) -> Result<(usize, usize)> {
        let id = self.id();

        // acme resets the address when the addr file is first opened, so a
        // read after `addr=dot` on a fresh window would see 0,0. Open it first.
        let _ = self.window.read_addr();

        self.window
            .ctl("addr=dot")
            .map_err(AoError::window(id, "Cannot read acme address"))?;
        self.window
            .read_addr()
            .map_err(AoError::window(id, "Cannot read acme address"))
    }

    /// Resolves the full query position. Fails if the window has unsaved
    /// changes, since byte offsets would not match the file on disk.
    pub fn query_position(&mut self) -> Result<QueryPosition> {
        let id = self.id();
        let file = self.file_name()?;
        if self.is_dirty()? {
            return Err(AoError::DirtyWindow { id });
        }

        let (q0, q1) = self.selection()?;
        let bytes = offsets::translate(&mut self.window, q0, q1)?;
        debug!(
            window = %id,
            file = %file,
            q0,
            q1,
            b0 = bytes.start,
            b1 = bytes.end,
            "Resolved query position"
        );

        Ok(QueryPosition {
            file,
            start: bytes.start,
            end: bytes.end,
        })
    }
}

/// Opens `id` and resolves its query position.
pub fn resolve_position<S: WindowSystem>(system: &S, id: WindowId) -> Result<QueryPosition> {
    WindowSession::open(system, id)?.query_position()
}

/// Opens `id` and reads its file name.
pub fn resolve_file_name<S: WindowSystem>(system: &S, id: WindowId) -> Result<String> {
    WindowSession::open(system, id)?.file_name()
}
