//! Buffered byte reader with multi-byte lookahead.
//!
//! The parser consumes its input strictly byte by byte, but several
//! constructs need to look ahead without committing: `//` comment detection,
//! `${...}` variable detection, and adjacent-quote coalescing, which peeks
//! past arbitrarily long whitespace runs. `ByteReader` wraps any [`Read`]
//! source and keeps the peeked-but-unconsumed bytes in a small inline queue
//! that only spills to the heap on long lookaheads.

use smallvec::SmallVec;
use std::io::{self, BufReader, Read};

/// Emitted for byte sequences that do not form valid UTF-8, matching the
/// lossy decoding the rest of the pipeline applies at token boundaries.
const REPLACEMENT: char = '\u{FFFD}';

/// A buffered reader over raw configuration bytes.
pub struct ByteReader<R> {
    inner: BufReader<R>,
    lookahead: SmallVec<[u8; 16]>,
}

impl<R: Read> ByteReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            inner: BufReader::new(source),
            lookahead: SmallVec::new(),
        }
    }

    /// Reads one byte. `Ok(None)` signals end of input.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if !self.lookahead.is_empty() {
            return Ok(Some(self.lookahead.remove(0)));
        }
        self.fill_one()
    }

    /// Returns the next `n` bytes without consuming them.
    ///
    /// Unlike [`read_byte`](Self::read_byte), running out of input here is
    /// an error (`ErrorKind::UnexpectedEof`): every caller peeks because it
    /// has already committed to a construct that needs more bytes.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        while self.lookahead.len() < n {
            match self.fill_one()? {
                Some(b) => self.lookahead.push(b),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "peek past end of input",
                    ))
                }
            }
        }
        Ok(&self.lookahead[..n])
    }

    /// Decodes one UTF-8 code point. `Ok(None)` signals end of input.
    ///
    /// An invalid sequence consumes exactly one byte and decodes to
    /// U+FFFD, so malformed input degrades instead of failing.
    pub fn read_rune(&mut self) -> io::Result<Option<char>> {
        let Some(first) = self.read_byte()? else {
            return Ok(None);
        };
        if first < 0x80 {
            return Ok(Some(first as char));
        }
        let width = match first {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return Ok(Some(REPLACEMENT)),
        };

        let mut bytes = [first, 0, 0, 0];
        for i in 1..width {
            let next = match self.peek(i) {
                Ok(peeked) => peeked[i - 1],
                Err(_) => return Ok(Some(REPLACEMENT)),
            };
            if next & 0xC0 != 0x80 {
                return Ok(Some(REPLACEMENT));
            }
            bytes[i] = next;
        }
        match std::str::from_utf8(&bytes[..width]) {
            Ok(s) => {
                self.consume(width - 1);
                Ok(s.chars().next())
            }
            Err(_) => Ok(Some(REPLACEMENT)),
        }
    }

    /// Consumes through the next `\n` exclusive and returns the line, with
    /// a single trailing `\r` stripped. `Ok(None)` only when the input was
    /// already exhausted.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = Vec::new();
        loop {
            match self.read_byte()? {
                None if line.is_empty() => return Ok(None),
                None | Some(b'\n') => break,
                Some(b) => line.push(b),
            }
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    fn fill_one(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn consume(&mut self, n: usize) {
        self.lookahead.drain(..n);
    }
}
