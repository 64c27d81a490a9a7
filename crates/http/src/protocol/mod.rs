//! The HTTP/1.1 message model shared by both directions.
//!
//! - [`Message`], [`PayloadItem`] and [`PayloadSize`] describe the frames the
//!   codecs produce and consume
//! - [`RequestHeader`] and [`ResponseHeader`] are decoded heads, [`ReasonPhrase`]
//!   carries a custom status line text
//! - [`body`] turns the decoded frames back into `http_body::Body` values
//! - [`HttpError`], [`ParseError`] and [`SendError`] cover everything that can fail

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ReasonPhrase;
pub use response::ResponseHead;
pub use response::ResponseHeader;
pub use response::status_line;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
