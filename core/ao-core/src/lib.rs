//! # ao-core
//!
//! Core library for ao, an acme front end for a source analysis tool. The
//! user middle-clicks a query mode in ao's menu window; ao resolves the
//! selection in the target window to a byte-addressed position, runs the
//! analyzer and writes the answer back into the menu window.
//!
//! Only one ao runs at a time. A later invocation hands its window to the
//! running instance over a Unix socket and exits (see [`coordinator`]).
//!
//! ## Design Principles
//!
//! - **Synchronous**: plain threads and `std::sync::mpsc`, no async runtime.
//! - **Single owner**: the event loop owns all mutable state; the other
//!   threads only feed it through a channel.
//! - **Fatal by default**: anything that goes wrong outside the analyzer ends
//!   the process with a diagnostic. Analyzer failures are shown in the window.

pub mod acme;
pub mod analyzer;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod event_loop;
pub mod menu;
pub mod offsets;
pub mod session;
pub mod window;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use analyzer::{Analyzer, AnalyzerError, CommandAnalyzer, QueryOutput, TextOutput};
pub use config::{Config, Overrides};
pub use coordinator::{Rendezvous, Role};
pub use error::{AoError, Result};
pub use event_loop::{EventLoop, LoopEvent};
pub use menu::Menu;
pub use session::{QueryPosition, WindowSession};
pub use window::{Window, WindowEvent, WindowSystem};

pub use ao_protocol::WindowId;
