//! Asynchronous HTTP/1.1 plumbing for micro-rpc
//!
//! This crate carries the bytes of an RPC call in both directions. It provides
//! tokio-util codecs for request and response messages, and two connection types
//! built on them:
//!
//! - [`connection::ServerConnection`] runs the request loop of one accepted socket and
//!   dispatches every request to a [`handler::Handler`]
//! - [`connection::ClientConnection`] sends a request over an established socket
//!   and streams the response body back
//!
//! Bodies are never buffered by this crate. A request or response body borrows the
//! connection it arrives on and is pulled chunk by chunk through `http_body::Body`,
//! so size limits and decoding are left to the caller.
//!
//! # Features
//!
//! - HTTP/1.0 and HTTP/1.1 heads parsed with `httparse`
//! - `Content-Length`, chunked and close-delimited bodies
//! - Keep-alive with automatic draining of unread bodies
//! - `Expect: 100-continue` on the server, interim responses skipped on the client
//! - Custom reason phrases through [`protocol::ReasonPhrase`]
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::Request;
//! use http_body_util::{BodyExt, Full};
//! use micro_rpc_http::connection::ClientConnection;
//! use tokio::net::TcpStream;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (reader, writer) = TcpStream::connect("127.0.0.1:8080").await?.into_split();
//!     let mut connection = ClientConnection::new(reader, writer);
//!
//!     let request = Request::post("http://127.0.0.1:8080/v1/say.hello")
//!         .header(http::header::CONTENT_TYPE, "application/json")
//!         .body(Full::new(Bytes::from_static(br#"{"name":"Admin"}"#)))?;
//!
//!     let response = connection.send(request).await?;
//!     println!("{}", response.status());
//!     let body = response.into_body().collect().await?.to_bytes();
//!     println!("{}", String::from_utf8_lossy(&body));
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
