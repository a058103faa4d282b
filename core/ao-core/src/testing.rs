//! In-memory acme and a scripted analyzer for tests.
//!
//! `FakeAcme` models the parts of acme's window files ao depends on: `addr`
//! is reset when first opened and sequential reads of it honour the read
//! offset, reading `data` starts at the address and
//! advances it, writing `data` replaces the addressed text, and `ctl`
//! understands `addr=dot`, `dot=addr`, `clean`, `dirty` and `name`.

use crate::analyzer::{Analyzer, AnalyzerError, QueryOutput, TextOutput};
use crate::session::QueryPosition;
use crate::window::{parse_addr, EventStream, WinFile, Window, WindowEvent, WindowSystem};
use ao_protocol::WindowId;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct FakeWindowState {
    tag: String,
    body: String,
    dot: (usize, usize),
    addr: (usize, usize),
    dirty: bool,
    ctl_override: Option<String>,
    name: Option<String>,
    ctl_log: Vec<String>,
    clean_count: usize,
    opens: usize,
    event_tx: Option<Sender<WindowEvent>>,
    event_rx: Option<Receiver<WindowEvent>>,
    written_events: Vec<WindowEvent>,
}

#[derive(Default)]
struct FakeState {
    next_id: u32,
    windows: BTreeMap<WindowId, FakeWindowState>,
}

#[derive(Clone, Default)]
pub struct FakeAcme {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeAcme {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_window<T>(&self, id: WindowId, f: impl FnOnce(&mut FakeWindowState) -> T) -> T {
        let mut state = self.lock();
        let window = state
            .windows
            .get_mut(&id)
            .unwrap_or_else(|| panic!("no fake window {}", id));
        f(window)
    }

    fn insert(&self, tag: String, body: String) -> WindowId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = WindowId::new(state.next_id);
        let (tx, rx) = mpsc::channel();
        state.windows.insert(
            id,
            FakeWindowState {
                tag,
                body,
                event_tx: Some(tx),
                event_rx: Some(rx),
                ..Default::default()
            },
        );
        id
    }

    /// Adds a clean window editing `file` with the given body.
    pub fn add_window(&self, file: &str, body: &str) -> WindowId {
        self.insert(format!("{} Del Snarf | Look ", file), body.to_string())
    }

    pub fn select(&self, id: WindowId, q0: usize, q1: usize) {
        self.with_window(id, |w| w.dot = (q0, q1));
    }

    pub fn set_dirty(&self, id: WindowId, dirty: bool) {
        self.with_window(id, |w| w.dirty = dirty);
    }

    pub fn set_ctl_override(&self, id: WindowId, ctl: &str) {
        self.with_window(id, |w| w.ctl_override = Some(ctl.to_string()));
    }

    pub fn event_sender(&self, id: WindowId) -> Sender<WindowEvent> {
        self.with_window(id, |w| {
            w.event_tx
                .clone()
                .unwrap_or_else(|| panic!("events of window {} already closed", id))
        })
    }

    /// Drops the window's own event sender. The stream ends once every sender
    /// handed out by [`FakeAcme::event_sender`] is dropped as well.
    pub fn close_events(&self, id: WindowId) {
        self.with_window(id, |w| w.event_tx = None);
    }

    pub fn body(&self, id: WindowId) -> String {
        self.with_window(id, |w| w.body.clone())
    }

    pub fn is_dirty(&self, id: WindowId) -> bool {
        self.with_window(id, |w| w.dirty)
    }

    pub fn name(&self, id: WindowId) -> Option<String> {
        self.with_window(id, |w| w.name.clone())
    }

    pub fn clean_count(&self, id: WindowId) -> usize {
        self.with_window(id, |w| w.clean_count)
    }

    pub fn ctl_log(&self, id: WindowId) -> Vec<String> {
        self.with_window(id, |w| w.ctl_log.clone())
    }

    /// How many times the window was opened by id.
    pub fn open_count(&self, id: WindowId) -> usize {
        self.with_window(id, |w| w.opens)
    }

    pub fn written_events(&self, id: WindowId) -> Vec<WindowEvent> {
        self.with_window(id, |w| w.written_events.clone())
    }

    pub fn window_count(&self) -> usize {
        self.lock().windows.len()
    }
}

impl WindowSystem for FakeAcme {
    type Window = FakeWindow;

    fn open(&self, id: WindowId) -> io::Result<FakeWindow> {
        let mut state = self.lock();
        let window = state
            .windows
            .get_mut(&id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no window {}", id)))?;
        window.opens += 1;
        Ok(FakeWindow::new(self.clone(), id))
    }

    fn create(&self) -> io::Result<FakeWindow> {
        let id = self.insert(String::new(), String::new());
        Ok(FakeWindow::new(self.clone(), id))
    }
}

pub struct FakeWindow {
    acme: FakeAcme,
    id: WindowId,
    addr_open: bool,
    addr_offset: usize,
}

impl FakeWindow {
    fn new(acme: FakeAcme, id: WindowId) -> Self {
        Self {
            acme,
            id,
            addr_open: false,
            addr_offset: 0,
        }
    }

    fn state<T>(&mut self, f: impl FnOnce(&mut FakeWindowState) -> T) -> io::Result<T> {
        let mut state = self.acme.lock();
        let window = state
            .windows
            .get_mut(&self.id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "window deleted"))?;
        Ok(f(window))
    }

    fn open_addr(&mut self) -> io::Result<()> {
        if !self.addr_open {
            self.addr_open = true;
            self.state(|w| w.addr = (0, 0))?;
        }
        Ok(())
    }

    /// The `addr` file contents as acme formats them.
    fn addr_record(&mut self) -> io::Result<String> {
        self.open_addr()?;
        self.state(|w| format!("{:11} {:11} ", w.addr.0, w.addr.1))
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn byte_index(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(index, _)| index)
}

fn parse_fake_addr(expr: &str, body_len: usize) -> io::Result<(usize, usize)> {
    let expr = expr.trim();
    let position = |part: &str| -> io::Result<usize> {
        match part {
            "$" => Ok(body_len),
            _ => part
                .trim_start_matches('#')
                .parse::<usize>()
                .map(|n| n.min(body_len))
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "bad address")),
        }
    };
    match expr.split_once(',') {
        Some((a, b)) => {
            let start = if a.is_empty() { 0 } else { position(a)? };
            let end = if b.is_empty() { body_len } else { position(b)? };
            Ok((start, end))
        }
        None => {
            let at = position(expr)?;
            Ok((at, at))
        }
    }
}

impl Window for FakeWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn read(&mut self, file: WinFile, buf: &mut [u8]) -> io::Result<usize> {
        match file {
            WinFile::Addr => {
                let record = self.addr_record()?;
                let rest = record.as_bytes().get(self.addr_offset..).unwrap_or_default();
                let n = rest.len().min(buf.len());
                buf[..n].copy_from_slice(&rest[..n]);
                self.addr_offset += n;
                Ok(n)
            }
            WinFile::Data => self.state(|w| {
                let start = byte_index(&w.body, w.addr.0);
                let mut copied = 0;
                let mut chars = 0;
                for c in w.body[start..].chars() {
                    let width = c.len_utf8();
                    if copied + width > buf.len() {
                        break;
                    }
                    c.encode_utf8(&mut buf[copied..copied + width]);
                    copied += width;
                    chars += 1;
                }
                w.addr.0 += chars;
                w.addr.1 = w.addr.1.max(w.addr.0);
                copied
            }),
            other => {
                let contents = self.read_all(other)?;
                let n = contents.len().min(buf.len());
                buf[..n].copy_from_slice(&contents[..n]);
                Ok(n)
            }
        }
    }

    fn write(&mut self, file: WinFile, data: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(data).into_owned();
        match file {
            WinFile::Addr => {
                self.open_addr()?;
                self.state(|w| {
                    let addr = parse_fake_addr(&text, char_len(&w.body))?;
                    w.addr = addr;
                    Ok::<_, io::Error>(())
                })??;
            }
            WinFile::Data => {
                self.state(|w| {
                    let start = byte_index(&w.body, w.addr.0);
                    let end = byte_index(&w.body, w.addr.1);
                    w.body.replace_range(start..end, &text);
                    let at = w.addr.0 + char_len(&text);
                    w.addr = (at, at);
                    w.dirty = true;
                })?;
            }
            WinFile::Ctl => {
                for command in text.lines().filter(|line| !line.is_empty()) {
                    self.state(|w| {
                        w.ctl_log.push(command.to_string());
                        match command {
                            "addr=dot" => w.addr = w.dot,
                            "dot=addr" => w.dot = w.addr,
                            "clean" => {
                                w.dirty = false;
                                w.clean_count += 1;
                            }
                            "dirty" => w.dirty = true,
                            _ => match command.strip_prefix("name ") {
                                Some(name) => w.name = Some(name.to_string()),
                                None => {
                                    return Err(io::Error::new(
                                        io::ErrorKind::InvalidInput,
                                        format!("unknown ctl command {:?}", command),
                                    ))
                                }
                            },
                        }
                        Ok(())
                    })??;
                }
            }
            WinFile::Tag => self.state(|w| w.tag.push_str(&text))?,
            WinFile::Body => self.state(|w| {
                w.body.push_str(&text);
                w.dirty = true;
            })?,
            WinFile::Event => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "use write_event for the event file",
                ))
            }
        }
        Ok(data.len())
    }

    fn read_addr(&mut self) -> io::Result<(usize, usize)> {
        let record = self.addr_record()?;
        parse_addr(record.as_bytes())
    }

    fn read_all(&mut self, file: WinFile) -> io::Result<Vec<u8>> {
        let id = self.id;
        self.state(|w| match file {
            WinFile::Tag => Ok(w.tag.clone().into_bytes()),
            WinFile::Body => Ok(w.body.clone().into_bytes()),
            WinFile::Ctl => Ok(w
                .ctl_override
                .clone()
                .unwrap_or_else(|| {
                    format!(
                        "{:11} {:11} {:11} {:11} {:11} {:11} /lib/font/bit/lucsans/euro.8.font {:11} ",
                        id,
                        char_len(&w.tag),
                        char_len(&w.body),
                        0,
                        u8::from(w.dirty),
                        640,
                        4
                    )
                })
                .into_bytes()),
            other => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("read_all of {}", other.name()),
            )),
        })?
    }

    fn events(&mut self) -> io::Result<EventStream> {
        let rx = self
            .state(|w| w.event_rx.take())?
            .ok_or_else(|| io::Error::new(io::ErrorKind::AlreadyExists, "events already taken"))?;
        Ok(Box::new(rx.into_iter()))
    }

    fn write_event(&mut self, event: &WindowEvent) -> io::Result<()> {
        let event = event.clone();
        self.state(|w| w.written_events.push(event))
    }
}

/// Analyzer that records its queries and answers from a script.
#[derive(Clone, Default)]
pub struct ScriptedAnalyzer {
    failures: Arc<Mutex<HashMap<String, String>>>,
    queries: Arc<Mutex<Vec<(String, QueryPosition)>>>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every query for `mode` fails with `message`.
    pub fn fail_mode(&self, mode: &str, message: &str) {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(mode.to_string(), message.to_string());
    }

    pub fn queries(&self) -> Vec<(String, QueryPosition)> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Text a successful query writes into the menu window.
    pub fn answer(mode: &str, position: &QueryPosition) -> String {
        format!("{} result for {}\n", mode, position)
    }
}

impl Analyzer for ScriptedAnalyzer {
    fn query(
        &mut self,
        mode: &str,
        position: &QueryPosition,
    ) -> Result<Box<dyn QueryOutput>, AnalyzerError> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((mode.to_string(), position.clone()));

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(mode)
            .cloned();
        match failure {
            Some(message) => Err(AnalyzerError::Failed {
                mode: mode.to_string(),
                message,
            }),
            None => Ok(Box::new(TextOutput::new(Self::answer(mode, position)))),
        }
    }
}
