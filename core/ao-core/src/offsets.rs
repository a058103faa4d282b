//! Character-to-byte offset translation.
//!
//! acme addresses text in characters; the analyzer wants byte offsets into the
//! file. The only way to get from one to the other is to re-read the body
//! from the start and add up the UTF-8 width of each character.

use crate::error::{AoError, Result};
use crate::window::{Data, Window};
use std::io::{self, Read};

/// Byte range produced by [`char_range_to_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

/// Re-reads the window body from offset 0 and translates `q0..q1` (characters)
/// into bytes.
pub fn translate<W: Window + ?Sized>(window: &mut W, q0: usize, q1: usize) -> Result<ByteRange> {
    window
        .set_addr("0")
        .map_err(|err| AoError::Decode(format!("cannot rewind window body: {}", err)))?;
    char_range_to_bytes(Data(window), q0, q1)
}

/// Counts the bytes taken by the first `q0` and first `q1` characters of
/// `reader`, one character at a time.
///
/// A byte that does not start a valid UTF-8 sequence counts as one character
/// one byte wide.
pub fn char_range_to_bytes<R: Read>(reader: R, q0: usize, q1: usize) -> Result<ByteRange> {
    if q0 > q1 {
        return Err(AoError::Decode(format!(
            "selection start {} is after end {}",
            q0, q1
        )));
    }

    let mut chars = CharWidths::new(reader);
    let mut start = 0;
    for consumed in 0..q0 {
        start += chars.next_width(consumed)?;
    }
    let mut end = start;
    for consumed in q0..q1 {
        end += chars.next_width(consumed)?;
    }

    Ok(ByteRange { start, end })
}

struct CharWidths<R> {
    reader: R,
    pending: Vec<u8>,
    eof: bool,
}

impl<R: Read> CharWidths<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::with_capacity(8),
            eof: false,
        }
    }

    /// Width of the next character. `consumed` is only used in the error.
    fn next_width(&mut self, consumed: usize) -> Result<usize> {
        self.fill(4)
            .map_err(|err| AoError::Decode(format!("read failed: {}", err)))?;

        if self.pending.is_empty() {
            return Err(AoError::Decode(format!(
                "body ended after {} characters",
                consumed
            )));
        }

        let window = &self.pending[..self.pending.len().min(4)];
        let width = match std::str::from_utf8(window) {
            Ok(text) => text.chars().next().map_or(1, char::len_utf8),
            Err(err) if err.valid_up_to() > 0 => std::str::from_utf8(&window[..err.valid_up_to()])
                .ok()
                .and_then(|text| text.chars().next())
                .map_or(1, char::len_utf8),
            Err(_) => 1,
        };

        self.pending.drain(..width);
        Ok(width)
    }

    fn fill(&mut self, want: usize) -> io::Result<()> {
        let mut chunk = [0u8; 64];
        while !self.eof && self.pending.len() < want {
            match self.reader.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn bytes(text: &str, q0: usize, q1: usize) -> Result<ByteRange> {
        char_range_to_bytes(Cursor::new(text.as_bytes().to_vec()), q0, q1)
    }

    /// Reader that hands out one byte per call.
    struct Trickle(Vec<u8>, usize);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.1 >= self.0.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[self.1];
            self.1 += 1;
            Ok(1)
        }
    }

    #[test]
    fn ascii_offsets_are_unchanged() {
        let range = bytes("package main\n\nfunc main() {}\n", 10, 14).unwrap();
        assert_eq!(range, ByteRange { start: 10, end: 14 });
    }

    #[test]
    fn multibyte_characters_widen_offsets() {
        // 'é' is 2 bytes, '世' is 3 bytes, '🦀' is 4 bytes.
        let range = bytes("é世🦀x", 1, 3).unwrap();
        assert_eq!(range, ByteRange { start: 2, end: 9 });
    }

    #[test]
    fn zero_width_selection() {
        let range = bytes("aé世", 2, 2).unwrap();
        assert_eq!(range.start, range.end);
        assert_eq!(range.start, 3);
    }

    #[test]
    fn selection_at_end_of_body() {
        let range = bytes("ab", 2, 2).unwrap();
        assert_eq!(range, ByteRange { start: 2, end: 2 });
    }

    #[test]
    fn short_body_is_a_decode_error() {
        let err = bytes("abc", 1, 5).unwrap_err();
        assert!(matches!(err, AoError::Decode(_)));
    }

    #[test]
    fn reversed_range_is_a_decode_error() {
        assert!(matches!(bytes("abc", 2, 1), Err(AoError::Decode(_))));
    }

    #[test]
    fn invalid_bytes_count_as_one() {
        let data = vec![b'a', 0xff, b'b'];
        let range = char_range_to_bytes(Cursor::new(data), 2, 3).unwrap();
        assert_eq!(range, ByteRange { start: 2, end: 3 });
    }

    #[test]
    fn characters_split_across_reads() {
        let text = "x世🦀y";
        let range = char_range_to_bytes(Trickle(text.as_bytes().to_vec(), 0), 1, 3).unwrap();
        assert_eq!(range, ByteRange { start: 1, end: 8 });
    }

    proptest! {
        #[test]
        fn byte_range_decodes_to_char_range(
            text in "\\PC{0,40}",
            a in 0usize..64,
            b in 0usize..64,
        ) {
            let len = text.chars().count();
            let (mut c0, mut c1) = (a % (len + 1), b % (len + 1));
            if c0 > c1 {
                std::mem::swap(&mut c0, &mut c1);
            }

            let range = bytes(&text, c0, c1).unwrap();
            let expected: String = text.chars().skip(c0).take(c1 - c0).collect();
            prop_assert_eq!(&text[range.start..range.end], expected.as_str());
        }

        #[test]
        fn zero_width_maps_to_zero_width(text in "\\PC{0,40}", a in 0usize..64) {
            let c = a % (text.chars().count() + 1);
            let range = bytes(&text, c, c).unwrap();
            prop_assert_eq!(range.start, range.end);
        }
    }
}
