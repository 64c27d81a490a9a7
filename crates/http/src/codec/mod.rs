//! tokio-util codecs for HTTP/1.1 messages, in both directions.
//!
//! A message is coded as a sequence of [`Message`](crate::protocol::Message) frames: one
//! head followed by payload chunks and an end-of-payload marker. The same
//! [`MessageDecoder`] / [`MessageEncoder`] machinery serves both sides of a
//! connection, parameterised by a head codec:
//!
//! | side   | decodes                | encodes                |
//! |--------|------------------------|------------------------|
//! | server | [`RequestDecoder`]     | [`ResponseEncoder`]    |
//! | client | [`ResponseDecoder`]    | [`RequestEncoder`]     |
//!
//! Bodies may be framed by `Content-Length`, chunked transfer coding, or (responses
//! only) by the peer closing the connection; the decoders report a body cut short by
//! end of stream as [`ParseError::Incomplete`](crate::protocol::ParseError::Incomplete).

mod body;
mod head;
mod message_decoder;
mod message_encoder;

pub use head::{RequestHeadDecoder, RequestHeadEncoder, ResponseHeadDecoder, ResponseHeadEncoder};
pub use message_decoder::{MessageDecoder, RequestDecoder, ResponseDecoder};
pub use message_encoder::{MessageEncoder, RequestEncoder, ResponseEncoder};
