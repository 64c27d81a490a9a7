//! Decoder for `Transfer-Encoding: chunked` bodies.
//!
//! Works line by line: a chunk-size line (extensions are ignored), the chunk data
//! and its trailing CRLF, then after the zero-size chunk any trailer fields up to
//! the empty line that ends the message.

use std::cmp;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::ensure;
use crate::protocol::{ParseError, PayloadItem};

/// Longest chunk-size or trailer line we accept.
const MAX_LINE_BYTES: usize = 4 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Size,
    Data(u64),
    DataEnd,
    Trailer,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: State,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Size }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits one CRLF (or bare LF) terminated line off `src`, without the terminator.
fn take_line(src: &mut BytesMut) -> Result<Option<BytesMut>, ParseError> {
    match src.iter().position(|b| *b == b'\n') {
        Some(end) => {
            ensure!(end <= MAX_LINE_BYTES, ParseError::invalid_body("chunk line too long"));
            let mut line = src.split_to(end + 1);
            line.truncate(end);
            if line.last() == Some(&b'\r') {
                line.truncate(end - 1);
            }
            Ok(Some(line))
        }
        None => {
            ensure!(src.len() <= MAX_LINE_BYTES, ParseError::invalid_body("chunk line too long"));
            Ok(None)
        }
    }
}

fn parse_size(line: &[u8]) -> Result<u64, ParseError> {
    let digits = line.split(|b| *b == b';').next().unwrap_or_default().trim_ascii();
    ensure!(!digits.is_empty(), ParseError::invalid_body("missing chunk size"));

    let digits = std::str::from_utf8(digits).map_err(|_| ParseError::invalid_body("invalid chunk size"))?;
    u64::from_str_radix(digits, 16).map_err(|_| ParseError::invalid_body(format!("invalid chunk size: {digits}")))
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                State::Size => {
                    let Some(line) = take_line(src)? else {
                        return Ok(None);
                    };
                    let size = parse_size(&line)?;
                    self.state = if size == 0 { State::Trailer } else { State::Data(size) };
                }

                State::Data(remaining) => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let len = cmp::min(remaining, src.len() as u64);
                    #[allow(clippy::cast_possible_truncation, reason = "len never exceeds src.len()")]
                    let bytes = src.split_to(len as usize).freeze();
                    self.state = if len == remaining { State::DataEnd } else { State::Data(remaining - len) };
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                State::DataEnd => {
                    let Some(line) = take_line(src)? else {
                        return Ok(None);
                    };
                    ensure!(line.is_empty(), ParseError::invalid_body("chunk data not followed by CRLF"));
                    self.state = State::Size;
                }

                State::Trailer => {
                    let Some(line) = take_line(src)? else {
                        return Ok(None);
                    };
                    if line.is_empty() {
                        self.state = State::Done;
                    }
                }

                State::Done => return Ok(Some(PayloadItem::Eof)),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => {
                src.advance(src.len());
                Err(ParseError::Incomplete)
            }
        }
    }
}
