//! Codec for acme's per-window `event` file.
//!
//! Each message is `c1 c2 q0 ' ' q1 ' ' flag ' ' nr ' ' text '\n'` where the
//! numbers are decimal and `text` holds `nr` characters. Some messages are
//! followed by extra records:
//!
//! - flag bit 2: acme expanded a null selection; the next record carries the
//!   original range (and the text, when the first record's text was too long
//!   to send).
//! - flag bit 8: chorded argument; the next two records carry the argument
//!   text and its location.

use crate::window::WindowEvent;
use std::io::{self, BufRead};

const FLAG_EXPANDED: u32 = 2;
const FLAG_CHORDED: u32 = 8;

struct Record {
    c1: char,
    c2: char,
    q0: usize,
    q1: usize,
    flag: u32,
    text: String,
}

pub struct EventReader<R> {
    reader: R,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads one complete event. `Ok(None)` means the file was closed between
    /// events.
    pub fn read_event(&mut self) -> io::Result<Option<WindowEvent>> {
        let first = match self.read_record()? {
            Some(record) => record,
            None => return Ok(None),
        };

        let mut event = WindowEvent::new(
            first.c1,
            first.c2,
            first.q0,
            first.q1,
            first.flag,
            &first.text,
        );

        if first.flag & FLAG_EXPANDED != 0 {
            let original = self.require_record()?;
            event.orig_q0 = original.q0;
            event.orig_q1 = original.q1;
            if event.text.is_empty() {
                event.text = original.text;
            }
        }

        if first.flag & FLAG_CHORDED != 0 {
            event.arg = Some(self.require_record()?.text);
            event.loc = Some(self.require_record()?.text);
        }

        Ok(Some(event))
    }

    fn require_record(&mut self) -> io::Result<Record> {
        self.read_record()?.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "event file closed inside a multi-record event",
            )
        })
    }

    fn read_record(&mut self) -> io::Result<Option<Record>> {
        let c1 = match read_char(&mut self.reader)? {
            Some(c) => c,
            None => return Ok(None),
        };
        let c2 = expect_char(&mut self.reader)?;
        let q0 = read_number(&mut self.reader)?;
        let q1 = read_number(&mut self.reader)?;
        let flag = read_number(&mut self.reader)? as u32;
        let nr = read_number(&mut self.reader)?;

        let mut text = String::with_capacity(nr);
        for _ in 0..nr {
            text.push(expect_char(&mut self.reader)?);
        }

        match expect_char(&mut self.reader)? {
            '\n' => {}
            other => {
                return Err(invalid(format!(
                    "event record not newline terminated, found {:?}",
                    other
                )))
            }
        }

        Ok(Some(Record {
            c1,
            c2,
            q0,
            q1,
            flag,
            text,
        }))
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = io::Result<WindowEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_event().transpose()
    }
}

/// Formats an event for writing back to acme, which then performs its
/// default action for it.
pub fn format_event(event: &WindowEvent) -> String {
    format!("{}{}{} {} \n", event.c1, event.c2, event.q0, event.q1)
}

fn read_char<R: BufRead>(reader: &mut R) -> io::Result<Option<char>> {
    let mut first = [0u8; 1];
    if reader.read(&mut first)? == 0 {
        return Ok(None);
    }

    let width = match first[0] {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        byte => return Err(invalid(format!("invalid UTF-8 lead byte {:#x}", byte))),
    };

    let mut bytes = [first[0], 0, 0, 0];
    reader.read_exact(&mut bytes[1..width])?;
    std::str::from_utf8(&bytes[..width])
        .ok()
        .and_then(|s| s.chars().next())
        .map(Some)
        .ok_or_else(|| invalid("invalid UTF-8 in event text".to_string()))
}

fn expect_char<R: BufRead>(reader: &mut R) -> io::Result<char> {
    read_char(reader)?.ok_or_else(|| {
        io::Error::new(io::ErrorKind::UnexpectedEof, "event file closed mid-record")
    })
}

fn read_number<R: BufRead>(reader: &mut R) -> io::Result<usize> {
    let mut digits = String::new();
    loop {
        match expect_char(reader)? {
            ' ' => break,
            c if c.is_ascii_digit() => digits.push(c),
            other => {
                return Err(invalid(format!(
                    "unexpected {:?} in event number",
                    other
                )))
            }
        }
    }
    digits
        .parse()
        .map_err(|_| invalid(format!("bad event number {:?}", digits)))
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}
