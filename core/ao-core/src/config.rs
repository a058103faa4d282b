//! Runtime configuration.
//!
//! Everything comes from the command line or the environment; there is no
//! config file. Command-line values win over environment variables.

use crate::acme::DEFAULT_MOUNT;
use crate::analyzer::DEFAULT_ANALYZER;
use crate::error::{AoError, Result};
use ao_protocol::{WindowId, DEFAULT_SOCKET_PATH};
use std::env;
use std::path::PathBuf;

/// Set by acme for commands run from a window.
pub const WINDOW_ID_ENV: &str = "winid";
pub const SOCKET_ENV: &str = "AO_SOCKET";
pub const ANALYZER_ENV: &str = "AO_ANALYZER";
pub const ACME_MOUNT_ENV: &str = "ACME_MOUNT";

/// Scope entry standing for the invoking window's file.
pub const CURRENT_FILE_SCOPE: &str = ".";

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub scope: Vec<String>,
    pub socket: Option<PathBuf>,
    pub analyzer: Option<String>,
    pub acme_mount: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub window_id: WindowId,
    /// Scope as given; `.` entries are resolved by [`resolve_scope`].
    pub scope: Vec<String>,
    pub socket_path: PathBuf,
    pub analyzer: String,
    pub acme_mount: PathBuf,
}

impl Config {
    pub fn from_env(overrides: Overrides) -> Result<Self> {
        Self::resolve(overrides, |key| env::var(key).ok())
    }

    pub fn resolve<F>(overrides: Overrides, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let window_id = lookup(WINDOW_ID_ENV)
            .ok_or(AoError::MissingWindowId)?
            .trim()
            .parse::<WindowId>()
            .map_err(AoError::InvalidWindowId)?;

        let scope = if overrides.scope.is_empty() {
            vec![CURRENT_FILE_SCOPE.to_string()]
        } else {
            overrides.scope
        };

        let socket_path = overrides
            .socket
            .or_else(|| lookup(SOCKET_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH));
        let analyzer = overrides
            .analyzer
            .or_else(|| lookup(ANALYZER_ENV))
            .unwrap_or_else(|| DEFAULT_ANALYZER.to_string());
        let acme_mount = overrides
            .acme_mount
            .or_else(|| lookup(ACME_MOUNT_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MOUNT));

        Ok(Self {
            window_id,
            scope,
            socket_path,
            analyzer,
            acme_mount,
        })
    }
}

/// Replaces every `.` in `scope` with the current file. `current_file` is
/// only called when needed, and at most once.
pub fn resolve_scope<F>(scope: &[String], current_file: F) -> Result<Vec<String>>
where
    F: FnOnce() -> Result<String>,
{
    let mut current_file = Some(current_file);
    let mut file: Option<String> = None;
    let mut resolved = Vec::with_capacity(scope.len());

    for entry in scope {
        if entry != CURRENT_FILE_SCOPE {
            resolved.push(entry.clone());
            continue;
        }
        if file.is_none() {
            if let Some(fetch) = current_file.take() {
                file = Some(fetch()?);
            }
        }
        resolved.extend(file.clone());
    }

    Ok(resolved)
}
