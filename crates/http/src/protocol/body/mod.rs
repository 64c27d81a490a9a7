//! Streaming bodies read straight off a connection.
//!
//! [`PayloadBody`] borrows the connection's decoded message stream for as long as
//! the body is alive, so the caller pulls chunks directly from the socket without a
//! task or channel in between. When the body reaches its end it records that in a
//! flag owned by the connection; if the caller stops early the connection sees the
//! flag unset and drains the remainder before reusing the socket.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use http_body::{Body, Frame, SizeHint};
use tracing::info;

use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHeader};

/// The stream type a [`PayloadBody`] reads from.
pub type MessageStream<'conn, H> =
    dyn Stream<Item = Result<Message<(H, PayloadSize)>, ParseError>> + Send + Unpin + 'conn;

/// A request body, handed to server handlers.
pub type ReqBody<'conn> = PayloadBody<'conn, RequestHeader>;

/// A response body, handed back to clients.
pub type RespBody<'conn> = PayloadBody<'conn, ResponseHeader>;

/// A message body bound to the connection it arrives on.
pub struct PayloadBody<'conn, H> {
    stream: &'conn mut MessageStream<'conn, H>,
    eof: &'conn mut bool,
    size: PayloadSize,
}

impl<'conn, H> PayloadBody<'conn, H> {
    pub fn new(stream: &'conn mut MessageStream<'conn, H>, eof: &'conn mut bool, size: PayloadSize) -> Self {
        Self { stream, eof, size }
    }

    /// How the peer framed this body.
    pub fn payload_size(&self) -> PayloadSize {
        self.size
    }
}

impl<H> std::fmt::Debug for PayloadBody<'_, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadBody").field("size", &self.size).field("eof", &*self.eof).finish_non_exhaustive()
    }
}

impl<H> Body for PayloadBody<'_, H> {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if *this.eof {
            return Poll::Ready(None);
        }

        match ready!(this.stream.poll_next_unpin(cx)) {
            Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
            Some(Ok(Message::Payload(PayloadItem::Eof))) => {
                *this.eof = true;
                Poll::Ready(None)
            }
            Some(Ok(Message::Header(_))) => {
                Poll::Ready(Some(Err(ParseError::invalid_body("received header while reading body"))))
            }
            Some(Err(e)) => Poll::Ready(Some(Err(e))),
            None => Poll::Ready(Some(Err(ParseError::Incomplete))),
        }
    }

    fn is_end_stream(&self) -> bool {
        *self.eof
    }

    fn size_hint(&self) -> SizeHint {
        match self.size {
            PayloadSize::Length(length) => SizeHint::with_exact(length),
            PayloadSize::Empty => SizeHint::with_exact(0),
            PayloadSize::Chunked | PayloadSize::UntilClose => SizeHint::default(),
        }
    }
}

/// Reads and discards whatever is left of the current body.
///
/// Returns an error when the stream breaks before the body ends; the connection
/// cannot be reused in that case.
pub async fn skip_body<H>(stream: &mut MessageStream<'_, H>, eof: &mut bool) -> Result<(), ParseError> {
    let mut size: usize = 0;
    while !*eof {
        match stream.next().await {
            Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => size += bytes.len(),
            Some(Ok(Message::Payload(PayloadItem::Eof))) => *eof = true,
            Some(Ok(Message::Header(_))) => return Err(ParseError::invalid_body("received header while skipping body")),
            Some(Err(e)) => return Err(e),
            None => return Err(ParseError::Incomplete),
        }
    }

    if size > 0 {
        info!(size, "skip unread body");
    }
    Ok(())
}
