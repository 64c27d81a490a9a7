use std::fmt::Display;

use futures::StreamExt;
use http::{Request, Response};
use bytes::Bytes;
use http_body::Body;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::trace;

use super::{READ_BUFFER_SIZE, write_message};
use crate::codec::{RequestEncoder, ResponseDecoder};
use crate::protocol::body::{MessageStream, RespBody, skip_body};
use crate::protocol::{HttpError, Message, ParseError, RequestHeader, ResponseHeader};

/// The client half of an HTTP/1.1 connection.
///
/// [`send`](ClientConnection::send) writes a request and waits for the final
/// response head; the returned body borrows the connection, so one exchange is in
/// flight at a time. Interim `1xx` responses are skipped.
#[derive(Debug)]
pub struct ClientConnection<R, W> {
    framed_read: FramedRead<R, ResponseDecoder>,
    framed_write: FramedWrite<W, RequestEncoder>,
    body_eof: bool,
}

impl<R, W> ClientConnection<R, W>
where
    R: AsyncRead + Send + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, ResponseDecoder::new(), READ_BUFFER_SIZE),
            framed_write: FramedWrite::new(writer, RequestEncoder::new()),
            body_eof: true,
        }
    }

    /// Sends `request` and returns the response head with its body still on the wire.
    ///
    /// Any unread body of the previous response is drained first.
    pub async fn send<B>(&mut self, request: Request<B>) -> Result<Response<RespBody<'_>>, HttpError>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Display,
    {
        if !self.body_eof {
            skip_body::<ResponseHeader>(&mut self.framed_read, &mut self.body_eof).await?;
        }

        let (parts, body) = request.into_parts();
        write_message(&mut self.framed_write, RequestHeader::from(parts), body).await?;

        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header((header, _)))) if header.status().is_informational() => {
                    trace!(status = %header.status(), "skip interim response");
                }

                Some(Ok(Message::Header((header, payload_size)))) => {
                    self.body_eof = false;
                    let stream: &mut MessageStream<'_, ResponseHeader> = &mut self.framed_read;
                    return Ok(header.body(RespBody::new(stream, &mut self.body_eof, payload_size)));
                }

                // end of an interim response
                Some(Ok(Message::Payload(_))) => {}

                Some(Err(e)) => return Err(e.into()),

                None => return Err(ParseError::Incomplete.into()),
            }
        }
    }
}
