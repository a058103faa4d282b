//! The editor window capability ao is written against.
//!
//! Modelled on acme's per-window files: a window is a small set of named
//! files (`tag`, `ctl`, `addr`, `data`, `body`, `event`) that are read and
//! written as byte streams. [`crate::acme`] provides the real implementation
//! on top of acme's file server; tests use [`crate::testing::FakeAcme`].

use ao_protocol::WindowId;
use std::io::{self, Read, Write};

/// A named file of an acme window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WinFile {
    Tag,
    Ctl,
    Addr,
    Data,
    Body,
    Event,
}

impl WinFile {
    pub fn name(self) -> &'static str {
        match self {
            WinFile::Tag => "tag",
            WinFile::Ctl => "ctl",
            WinFile::Addr => "addr",
            WinFile::Data => "data",
            WinFile::Body => "body",
            WinFile::Event => "event",
        }
    }
}

/// One message read from a window's event file.
///
/// `c1` names the origin (`M` mouse, `K` keyboard, `E` body/tag file write,
/// `F` other file writes) and `c2` the action (`X`/`x` execute in body/tag,
/// `L`/`l` look, `I`/`i` insert, `D`/`d` delete).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEvent {
    pub c1: char,
    pub c2: char,
    pub q0: usize,
    pub q1: usize,
    /// Range of the original (possibly null) selection when acme expanded it.
    pub orig_q0: usize,
    pub orig_q1: usize,
    pub flag: u32,
    pub text: String,
    /// Chorded argument (flag bit 8).
    pub arg: Option<String>,
    /// Location of the chorded argument (flag bit 8).
    pub loc: Option<String>,
}

impl WindowEvent {
    pub fn new(c1: char, c2: char, q0: usize, q1: usize, flag: u32, text: &str) -> Self {
        Self {
            c1,
            c2,
            q0,
            q1,
            orig_q0: q0,
            orig_q1: q1,
            flag,
            text: text.to_string(),
            arg: None,
            loc: None,
        }
    }

    /// Middle-button execute in the window body.
    pub fn is_body_execute(&self) -> bool {
        self.c1 == 'M' && self.c2 == 'X'
    }

    /// Text acme recognises as one of its own commands (`Del`, `Put`, ...).
    pub fn is_builtin(&self) -> bool {
        self.flag & 1 != 0
    }
}

/// Events of one window, in order. The iterator ends when the window is closed.
pub type EventStream = Box<dyn Iterator<Item = WindowEvent> + Send>;

pub trait Window {
    fn id(&self) -> WindowId;

    fn read(&mut self, file: WinFile, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, file: WinFile, data: &[u8]) -> io::Result<usize>;

    /// Reads the whole of a file from its start.
    fn read_all(&mut self, file: WinFile) -> io::Result<Vec<u8>>;

    /// Takes the window's event stream. Only one stream exists per window.
    fn events(&mut self) -> io::Result<EventStream>;

    fn write_event(&mut self, event: &WindowEvent) -> io::Result<()>;

    fn ctl(&mut self, command: &str) -> io::Result<()> {
        let line = format!("{}\n", command);
        self.write(WinFile::Ctl, line.as_bytes()).map(|_| ())
    }

    fn set_addr(&mut self, addr: &str) -> io::Result<()> {
        self.write(WinFile::Addr, addr.as_bytes()).map(|_| ())
    }

    /// Current address as a character range. Reads the `addr` record from
    /// offset 0 on the window's kept handle: acme honours the read offset, so
    /// a plain sequential read sees nothing the second time.
    fn read_addr(&mut self) -> io::Result<(usize, usize)>;
}

/// Opens existing windows and creates new ones.
pub trait WindowSystem {
    type Window: Window;

    fn open(&self, id: WindowId) -> io::Result<Self::Window>;

    fn create(&self) -> io::Result<Self::Window>;
}

/// Parses the `addr` file contents: two character offsets separated by
/// whitespace.
pub fn parse_addr(raw: &[u8]) -> io::Result<(usize, usize)> {
    let text = String::from_utf8_lossy(raw);
    let mut fields = text.split_whitespace().map(str::parse::<usize>);
    match (fields.next(), fields.next()) {
        (Some(Ok(q0)), Some(Ok(q1))) => Ok((q0, q1)),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("malformed address {:?}", text),
        )),
    }
}

/// `Read`/`Write` adapter over a window's `data` file.
pub struct Data<'a, W: ?Sized>(pub &'a mut W);

impl<W: Window + ?Sized> Read for Data<'_, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(WinFile::Data, buf)
    }
}

impl<W: Window + ?Sized> Write for Data<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(WinFile::Data, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_acme_address_format() {
        assert_eq!(parse_addr(b"         10          14 ").unwrap(), (10, 14));
    }

    #[test]
    fn rejects_short_address() {
        assert!(parse_addr(b"10").is_err());
        assert!(parse_addr(b"").is_err());
    }

    #[test]
    fn classifies_events() {
        let exec = WindowEvent::new('M', 'X', 3, 10, 0, "callers");
        assert!(exec.is_body_execute());
        assert!(!exec.is_builtin());

        let del = WindowEvent::new('M', 'x', 0, 3, 1, "Del");
        assert!(!del.is_body_execute());
        assert!(del.is_builtin());
    }
}
