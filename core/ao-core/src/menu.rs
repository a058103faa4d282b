//! The menu window: a list of query modes to middle-click, followed by the
//! output of the last query.

use crate::analyzer::{AnalyzerError, QueryOutput};
use crate::error::{AoError, Result};
use crate::window::{Data, Window};
use ao_protocol::WindowId;
use std::io::Write;

/// Query modes, grouped the way they are laid out in the menu.
pub const MODE_GROUPS: &[&[&str]] = &[
    &["callees", "callers", "callgraph", "callstack", "peers", "pointsto"],
    &["definition", "describe", "freevars"],
    &["implements", "referrers"],
];

pub const QUERY_IN_PROGRESS: &str = "querying analyzer\n";

pub fn modes() -> impl Iterator<Item = &'static str> {
    MODE_GROUPS.iter().flat_map(|group| group.iter().copied())
}

pub fn render(file: &str) -> String {
    let mut text = format!("Current file is: {}\n", file);
    for (index, group) in MODE_GROUPS.iter().enumerate() {
        if index > 0 {
            text.push('\n');
        }
        for mode in group.iter() {
            text.push_str(mode);
            text.push('\n');
        }
    }
    text
}

pub struct Menu<W> {
    window: W,
}

impl<W: Window> Menu<W> {
    pub fn new(window: W) -> Self {
        Self { window }
    }

    pub fn id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    pub fn set_name(&mut self, scope: &str) -> Result<()> {
        self.window
            .ctl(&format!("name /ao/{}", scope))
            .map_err(AoError::window(self.id(), "Cannot name menu window"))
    }

    /// Replaces the whole window body with the menu for `file`.
    pub fn redraw(&mut self, file: &str) -> Result<()> {
        self.replace_body(&render(file))
    }

    pub fn show_progress(&mut self) -> Result<()> {
        self.replace_body(QUERY_IN_PROGRESS)
    }

    /// Appends query output after the menu.
    pub fn write_result(&mut self, output: &dyn QueryOutput) -> Result<()> {
        let id = self.id();
        output
            .write_to(&mut Data(&mut self.window))
            .map_err(AoError::window(id, "Cannot write query result"))
    }

    pub fn write_error(&mut self, err: &AnalyzerError) -> Result<()> {
        let id = self.id();
        writeln!(Data(&mut self.window), "Cannot query analyzer: {}", err)
            .map_err(AoError::window(id, "Cannot write query error"))
    }

    pub fn mark_clean(&mut self) -> Result<()> {
        self.window
            .ctl("clean")
            .map_err(AoError::window(self.id(), "Cannot mark menu window clean"))
    }

    fn replace_body(&mut self, text: &str) -> Result<()> {
        let id = self.id();
        self.window
            .set_addr(",")
            .map_err(AoError::window(id, "Cannot address menu window"))?;
        Data(&mut self.window)
            .write_all(text.as_bytes())
            .map_err(AoError::window(id, "Cannot write menu window"))
    }
}
