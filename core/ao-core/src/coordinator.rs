//! Single-instance coordination over the rendezvous socket.
//!
//! The first ao to start binds the socket and becomes the primary. Later
//! invocations find the socket, hand their window id to the primary and exit.
//!
//! Two processes starting at the same moment can both fail to connect and
//! both become primary; the second bind then replaces the first's socket.
//! That race is accepted for a single-user tool.

use crate::error::{AoError, Result};
use crate::event_loop::LoopEvent;
use ao_protocol::{read_handoff, write_handoff, WindowId};
use fs_err as fs;
use std::io::{self, BufReader};
use std::net::Shutdown;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Outcome of trying to claim the rendezvous address.
pub enum Role {
    /// Another instance is running and has been told about our window.
    Secondary,
    /// We own the rendezvous socket.
    Primary(Rendezvous),
}

/// Connects to a running primary or, failing that, becomes the primary.
pub fn claim(path: &Path, window: WindowId) -> Result<Role> {
    match UnixStream::connect(path) {
        Ok(stream) => {
            send_handoff(stream, window)?;
            info!(path = %path.display(), window = %window, "Handed window to running instance");
            Ok(Role::Secondary)
        }
        Err(err) => {
            debug!(error = %err, path = %path.display(), "No running instance");
            Ok(Role::Primary(Rendezvous::bind(path)?))
        }
    }
}

/// Writes the handoff line and closes the connection.
pub fn send_handoff(mut stream: UnixStream, window: WindowId) -> Result<()> {
    write_handoff(&mut stream, window).map_err(AoError::Handoff)?;
    let _ = stream.shutdown(Shutdown::Both);
    Ok(())
}

/// Reads the single handoff line from an accepted connection and closes it.
pub fn receive_handoff(stream: UnixStream) -> Result<WindowId> {
    let mut reader = BufReader::new(stream);
    let window = read_handoff(&mut reader).map_err(AoError::Protocol)?;
    let _ = reader.get_ref().shutdown(Shutdown::Both);
    Ok(window)
}

/// The primary's listening socket.
pub struct Rendezvous {
    listener: UnixListener,
    path: PathBuf,
}

impl Rendezvous {
    /// Removes whatever is left at `path` from a previous primary and binds a
    /// fresh listener there. Binding is attempted once.
    pub fn bind(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| AoError::Listen {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }

        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "Removed stale rendezvous socket"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(error = %err, "Failed to remove stale rendezvous socket"),
        }

        let listener = UnixListener::bind(path).map_err(|source| AoError::Listen {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Listening for other instances");

        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves the listener onto its own thread, which forwards each accepted
    /// connection to the event loop. The thread ends when the loop is gone or
    /// accepting fails; a failure is forwarded first.
    pub fn spawn_acceptor(self, events: Sender<LoopEvent>) -> JoinHandle<()> {
        thread::spawn(move || {
            for stream in self.listener.incoming() {
                let event = match stream {
                    Ok(stream) => LoopEvent::Handoff(stream),
                    Err(err) => {
                        error!(error = %err, "Failed to accept rendezvous connection");
                        let _ = events.send(LoopEvent::AcceptFailed(err));
                        return;
                    }
                };
                if events.send(event).is_err() {
                    return;
                }
            }
        })
    }
}
