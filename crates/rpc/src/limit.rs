//! A reader that enforces a byte budget on whatever it wraps.
//!
//! Bodies are read through a [`LimitReader`] before they are decoded, so an
//! oversized request or response fails with a classified [`LimitExceeded`] error
//! instead of being silently truncated or buffered without bound.
//!
//! A reader with a limit of `n` delivers at most `n` bytes. Once the budget is spent
//! the next read probes the source for one more byte: a source that has ended yields
//! a normal end of stream, anything else fails with [`LimitExceeded`] and every read
//! after that fails the same way.

use std::fmt;
use std::io::{self, Read};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, ReadBuf};

use crate::code::Code;
use crate::error::{ClassifiedError, Details, NO_DETAILS};

pin_project! {
    /// Caps the number of bytes read from `R`.
    #[derive(Debug)]
    pub struct LimitReader<R> {
        #[pin]
        inner: R,
        remaining: u64,
        max: u64,
        exceeded: bool,
    }
}

impl<R> LimitReader<R> {
    pub fn new(inner: R, max: u64) -> Self {
        Self { inner, remaining: max, max, exceeded: false }
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn exceeded(max: u64) -> io::Error {
    io::Error::other(LimitExceeded { max })
}

impl<R: Read> Read for LimitReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.exceeded || self.max == 0 {
            self.exceeded = true;
            return Err(exceeded(self.max));
        }
        if buf.is_empty() {
            return Ok(0);
        }

        if self.remaining == 0 {
            let mut probe = [0u8; 1];
            return match self.inner.read(&mut probe)? {
                0 => Ok(0),
                _ => {
                    self.exceeded = true;
                    Err(exceeded(self.max))
                }
            };
        }

        let len = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..len])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

impl<R: AsyncRead> AsyncRead for LimitReader<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.project();
        if *this.exceeded || *this.max == 0 {
            *this.exceeded = true;
            return Poll::Ready(Err(exceeded(*this.max)));
        }
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        if *this.remaining == 0 {
            let mut probe = [0u8; 1];
            let mut probe = ReadBuf::new(&mut probe);
            ready!(this.inner.poll_read(cx, &mut probe))?;
            if probe.filled().is_empty() {
                return Poll::Ready(Ok(()));
            }
            *this.exceeded = true;
            return Poll::Ready(Err(exceeded(*this.max)));
        }

        let len = buf.remaining().min(usize::try_from(*this.remaining).unwrap_or(usize::MAX));
        let mut clamped = ReadBuf::new(buf.initialize_unfilled_to(len));
        ready!(this.inner.poll_read(cx, &mut clamped))?;
        let n = clamped.filled().len();
        buf.advance(n);
        *this.remaining -= n as u64;
        Poll::Ready(Ok(()))
    }
}

/// The body was larger than the reader's budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitExceeded {
    pub max: u64,
}

impl LimitExceeded {
    /// Recovers the error from the `io::Error` a [`LimitReader`] returned.
    pub fn from_io(err: &io::Error) -> Option<Self> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<LimitExceeded>()).copied()
    }
}

impl fmt::Display for LimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exceeds {} limit", bytes_to_si(self.max))
    }
}

impl std::error::Error for LimitExceeded {}

impl ClassifiedError for LimitExceeded {
    fn code(&self) -> Code {
        Code::BAD_REQUEST
    }

    fn message(&self) -> String {
        self.to_string()
    }

    fn details(&self) -> &Details {
        &NO_DETAILS
    }
}

/// Renders a byte count with an SI-style suffix.
///
/// Exact multiples of 1024 use binary prefixes (`"3.0KiB"`), everything else uses
/// decimal prefixes (`"1.5kB"`), and counts below one unit stay plain (`"37B"`).
pub fn bytes_to_si(bytes: u64) -> String {
    const DECIMAL: [char; 6] = ['k', 'M', 'G', 'T', 'P', 'E'];
    const BINARY: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    let binary = bytes != 0 && bytes % 1024 == 0;
    let unit: u64 = if binary { 1024 } else { 1000 };
    if bytes < unit {
        return format!("{bytes}B");
    }

    let (mut div, mut exp) = (unit, 0);
    let mut n = bytes / unit;
    while n >= unit {
        div *= unit;
        exp += 1;
        n /= unit;
    }

    let magnitude = bytes as f64 / div as f64;
    if binary {
        format!("{magnitude:.1}{}iB", BINARY[exp])
    } else {
        format!("{magnitude:.1}{}B", DECIMAL[exp])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(source: &[u8], max: u64) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        LimitReader::new(source, max).read_to_end(&mut out)?;
        Ok(out)
    }

    #[test]
    fn reads_up_to_the_limit() {
        assert_eq!(read_all(b"twenty regular bytes", 21).unwrap(), b"twenty regular bytes");
    }

    #[test]
    fn exact_budget_reads_everything() {
        assert_eq!(read_all(b"twenty regular bytes", 20).unwrap(), b"twenty regular bytes");
    }

    #[test]
    fn one_byte_over_fails() {
        let err = read_all(b"more than twenty regular bytes", 20).unwrap_err();
        assert_eq!(err.to_string(), "exceeds 20B limit");
        assert_eq!(LimitExceeded::from_io(&err), Some(LimitExceeded { max: 20 }));
    }

    #[test]
    fn stays_exceeded() {
        let mut reader = LimitReader::new(&b"abcdef"[..], 3);
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        reader.read(&mut buf).unwrap_err();
        reader.read(&mut buf).unwrap_err();
    }

    #[test]
    fn zero_limit_fails_first_read() {
        let mut reader = LimitReader::new(&b""[..], 0);
        let mut buf = [0u8; 8];
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.to_string(), "exceeds 0B limit");
    }

    #[test]
    fn limit_is_classified_as_bad_request() {
        let err = LimitExceeded { max: 1024 };
        assert_eq!(err.code(), Code::BAD_REQUEST);
        assert_eq!(err.message(), "exceeds 1.0KiB limit");
        assert!(err.details().is_empty());
        assert_eq!(err.to_reply().code_text, "Bad Request");
    }

    #[test]
    fn si_formatting() {
        assert_eq!(bytes_to_si(0), "0B");
        assert_eq!(bytes_to_si(20), "20B");
        assert_eq!(bytes_to_si(999), "999B");
        assert_eq!(bytes_to_si(1000), "1.0kB");
        assert_eq!(bytes_to_si(1025), "1.0kB");
        assert_eq!(bytes_to_si(1500), "1.5kB");
        assert_eq!(bytes_to_si(1024), "1.0KiB");
        assert_eq!(bytes_to_si(3 * 1024), "3.0KiB");
        assert_eq!(bytes_to_si(1024 * 1024), "1.0MiB");
        assert_eq!(bytes_to_si(1_000_000), "1.0MB");
        assert_eq!(bytes_to_si(5 * 1024 * 1024 * 1024), "5.0GiB");
    }

    #[tokio::test]
    async fn async_exact_budget_reads_everything() {
        let mut reader = LimitReader::new(&b"twenty regular bytes"[..], 20);
        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut out).await.unwrap();
        assert_eq!(out, b"twenty regular bytes");
    }

    #[tokio::test]
    async fn async_over_budget_fails() {
        let mut reader = LimitReader::new(&[7u8; 1025][..], 1024);
        let mut out = Vec::new();
        let err = tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut out).await.unwrap_err();
        assert_eq!(out.len(), 1024);
        assert_eq!(LimitExceeded::from_io(&err), Some(LimitExceeded { max: 1024 }));
    }

    #[tokio::test]
    async fn async_zero_limit_fails() {
        let mut reader = LimitReader::new(&b""[..], 0);
        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut out).await.unwrap_err();
    }
}
