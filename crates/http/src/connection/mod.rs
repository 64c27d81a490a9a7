//! Connections driving the codecs over a socket.
//!
//! - [`ServerConnection`]: reads requests, hands them to a
//!   [`Handler`](crate::handler::Handler), writes the responses; keep-alive and
//!   `Expect: 100-continue` are handled here
//! - [`ClientConnection`]: writes one request at a time and returns the response
//!   with a body streamed off the same socket

mod client_connection;
mod server_connection;

pub use client_connection::ClientConnection;
pub use server_connection::ServerConnection;

use std::fmt::Display;

use bytes::Bytes;
use futures::SinkExt;
use http_body::Body;
use http_body_util::BodyExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::{Encoder, FramedWrite};

use crate::protocol::{HttpError, Message, PayloadItem, PayloadSize, SendError};

/// Initial read buffer of a connection
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Writes one complete message, head then every body frame, and flushes it.
///
/// Framing follows the body's size hint: an exact size becomes `Content-Length`,
/// anything else is sent chunked. Trailer frames are dropped.
async fn write_message<W, E, T, B>(framed_write: &mut FramedWrite<W, E>, head: T, mut body: B) -> Result<(), HttpError>
where
    W: AsyncWrite + Unpin,
    E: Encoder<Message<(T, PayloadSize)>, Error = SendError>,
    B: Body<Data = Bytes> + Unpin,
    B::Error: Display,
{
    let payload_size = PayloadSize::from_exact(body.size_hint().exact());
    framed_write.feed(Message::Header((head, payload_size))).await?;

    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                if let Ok(data) = frame.into_data() {
                    framed_write.feed(Message::Payload(PayloadItem::Chunk(data))).await?;
                }
            }
            Some(Err(e)) => return Err(SendError::invalid_body(format!("resolve body error: {e}")).into()),
            None => break,
        }
    }

    framed_write.feed(Message::Payload(PayloadItem::Eof)).await?;
    framed_write.flush().await?;
    Ok(())
}
