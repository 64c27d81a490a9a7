//! Body codecs for the three ways HTTP/1.1 delimits a payload.
//!
//! [`PayloadDecoder`] and [`PayloadEncoder`] dispatch on [`PayloadSize`](crate::protocol::PayloadSize)
//! to a `Content-Length`, chunked, close-delimited or empty implementation.

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
