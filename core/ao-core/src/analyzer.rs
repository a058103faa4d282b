//! The analysis backend ao drives.
//!
//! ao owns no analysis of its own. An [`Analyzer`] takes a mode name and a
//! [`QueryPosition`] and hands back something that can write itself into the
//! menu window. [`CommandAnalyzer`] runs a guru-style tool as a subprocess.

use crate::error::AoError;
use crate::session::QueryPosition;
use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

pub const DEFAULT_ANALYZER: &str = "guru";

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("{mode}: {message}")]
    Failed { mode: String, message: String },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Result of a successful query.
pub trait QueryOutput {
    fn write_to(&self, out: &mut dyn Write) -> io::Result<()>;
}

pub trait Analyzer {
    fn query(
        &mut self,
        mode: &str,
        position: &QueryPosition,
    ) -> Result<Box<dyn QueryOutput>, AnalyzerError>;
}

/// Query output that is already rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOutput(Vec<u8>);

impl TextOutput {
    pub fn new(text: impl Into<Vec<u8>>) -> Self {
        Self(text.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl QueryOutput for TextOutput {
    fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(&self.0)
    }
}

/// Runs `<program> -scope <a,b,...> <mode> <file>:#<b0>,#<b1>` per query.
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    program: PathBuf,
    scope: Vec<String>,
}

impl CommandAnalyzer {
    pub fn new(program: &str, scope: Vec<String>) -> Result<Self, AoError> {
        if scope.is_empty() {
            return Err(AoError::AnalyzerInit("analysis scope is empty".to_string()));
        }
        let program = find_program(program).ok_or_else(|| {
            AoError::AnalyzerInit(format!("{} not found in PATH", program))
        })?;
        debug!(program = %program.display(), scope = ?scope, "Analyzer ready");
        Ok(Self { program, scope })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    fn command(&self, mode: &str, position: &QueryPosition) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-scope")
            .arg(self.scope.join(","))
            .arg(mode)
            .arg(position.to_string());
        command
    }
}

impl Analyzer for CommandAnalyzer {
    fn query(
        &mut self,
        mode: &str,
        position: &QueryPosition,
    ) -> Result<Box<dyn QueryOutput>, AnalyzerError> {
        let output = self
            .command(mode, position)
            .output()
            .map_err(|source| AnalyzerError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("exited with {}", output.status),
                text => text.to_string(),
            };
            return Err(AnalyzerError::Failed {
                mode: mode.to_string(),
                message,
            });
        }

        Ok(Box::new(TextOutput::new(output.stdout)))
    }
}

fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths)
            .map(|dir| dir.join(program))
            .find(|path| path.is_file())
    })
}
