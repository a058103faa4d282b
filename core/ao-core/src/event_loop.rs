//! The primary instance's control loop.
//!
//! Two producer threads feed one channel: the event pump, which reads the
//! menu window's events, and the rendezvous acceptor. The loop consumes that
//! channel one event at a time, so the coordinator state and every window are
//! only ever touched from the loop's thread.
//!
//! ```text
//! event pump ──┐
//!              ├──> mpsc channel ──> EventLoop::run
//! acceptor   ──┘
//! ```

use crate::analyzer::Analyzer;
use crate::coordinator;
use crate::error::{AoError, Result};
use crate::menu::Menu;
use crate::session;
use crate::window::{EventStream, Window, WindowEvent, WindowSystem};
use ao_protocol::WindowId;
use std::io;
use std::os::unix::net::UnixStream;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

pub enum LoopEvent {
    Ui(WindowEvent),
    /// The menu window's event stream ended: the user closed the window.
    UiClosed,
    Handoff(UnixStream),
    AcceptFailed(io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// State owned by the loop. Only the loop's thread reads or writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorState {
    pub target: WindowId,
}

pub struct EventLoop<S: WindowSystem, A> {
    system: S,
    menu: Menu<S::Window>,
    analyzer: A,
    state: CoordinatorState,
}

impl<S: WindowSystem, A: Analyzer> EventLoop<S, A> {
    pub fn new(system: S, menu: Menu<S::Window>, analyzer: A, target: WindowId) -> Self {
        Self {
            system,
            menu,
            analyzer,
            state: CoordinatorState { target },
        }
    }

    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    pub fn menu_id(&self) -> WindowId {
        self.menu.id()
    }

    /// Draws the menu for the current target and marks the window clean.
    pub fn render(&mut self) -> Result<()> {
        let file = session::resolve_file_name(&self.system, self.state.target)?;
        self.menu.redraw(&file)?;
        self.menu.mark_clean()
    }

    /// Runs until the menu window closes. Every error is fatal.
    pub fn run(&mut self, events: Receiver<LoopEvent>) -> Result<()> {
        // Both producers gone means the pump is gone too: same as a close.
        while let Ok(event) = events.recv() {
            if self.handle(event)? == Flow::Exit {
                return Ok(());
            }
        }
        Ok(())
    }

    pub fn handle(&mut self, event: LoopEvent) -> Result<Flow> {
        match event {
            LoopEvent::Ui(event) => self.handle_ui(event),
            LoopEvent::UiClosed => {
                info!(window = %self.menu.id(), "Menu window closed");
                Ok(Flow::Exit)
            }
            LoopEvent::Handoff(stream) => {
                self.handle_handoff(stream)?;
                Ok(Flow::Continue)
            }
            LoopEvent::AcceptFailed(err) => Err(AoError::Accept(err)),
        }
    }

    fn handle_ui(&mut self, event: WindowEvent) -> Result<Flow> {
        if event.is_body_execute() {
            self.run_query(event.text.trim())?;
        } else if event.is_builtin() {
            let id = self.menu.id();
            self.menu
                .window_mut()
                .write_event(&event)
                .map_err(AoError::window(id, "Cannot write event back"))?;
        } else {
            debug!(c1 = %event.c1, c2 = %event.c2, "Ignoring event");
        }
        Ok(Flow::Continue)
    }

    fn run_query(&mut self, mode: &str) -> Result<()> {
        let target = self.state.target;
        info!(mode, target = %target, "Running query");

        self.menu.show_progress()?;
        let position = session::resolve_position(&self.system, target)?;
        let outcome = self.analyzer.query(mode, &position);

        self.menu.redraw(&position.file)?;
        match outcome {
            Ok(output) => self.menu.write_result(&*output)?,
            Err(err) => {
                warn!(mode, position = %position, error = %err, "Query failed");
                self.menu.write_error(&err)?;
            }
        }
        self.menu.mark_clean()
    }

    fn handle_handoff(&mut self, stream: UnixStream) -> Result<()> {
        let target = coordinator::receive_handoff(stream)?;
        info!(from = %self.state.target, to = %target, "Switching target window");
        self.state.target = target;
        self.render()
    }
}

/// Forwards a window's events to the loop, then reports the close.
pub fn spawn_event_pump(events: EventStream, sink: Sender<LoopEvent>) -> JoinHandle<()> {
    thread::spawn(move || {
        for event in events {
            if sink.send(LoopEvent::Ui(event)).is_err() {
                return;
            }
        }
        let _ = sink.send(LoopEvent::UiClosed);
    })
}
