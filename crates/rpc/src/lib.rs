//! A minimal RPC protocol over HTTP/1.1
//!
//! A client POSTs a serialized request to a path naming the method; the server
//! decodes it, runs the method and answers with either the serialized response at
//! status `200` or an error envelope ([`reply::Reply`]) at the status of the error's
//! [`code::Code`].
//!
//! # Features
//!
//! - Status codes that tell a service rejection ([`error::ServiceError`]) apart from
//!   a failure of the client ([`error::ClientError`]), of the wire
//!   ([`error::TransportError`]) or of infrastructure in between ([`error::InfraError`])
//! - JSON and bincode bodies negotiated through `Content-Type` and `Accept`
//! - Byte budgets on every buffered body
//! - A retry engine driven by the classified error code
//! - Cooperative cancellation through `tokio_util::sync::CancellationToken`
//!
//! # Example
//!
//! ```no_run
//! use http::Method;
//! use micro_rpc::client::Client;
//! use micro_rpc::codec::Format;
//! use micro_rpc::retry::{self, ON_RETRYABLE};
//! use serde::{Deserialize, Serialize};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Serialize)]
//! struct SayHelloRequest {
//!     name: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct SayHelloResponse {
//!     message: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::default();
//!     let token = CancellationToken::new();
//!     let message = SayHelloRequest { name: "Admin".to_owned() };
//!
//!     let response: SayHelloResponse = retry::on(&token, &ON_RETRYABLE, |token, _attempt| {
//!         let client = client.clone();
//!         let request = client.request(Format::Json, Method::POST, "http://127.0.0.1:9080/v1/say.hello", &message);
//!         async move { client.call(&token, request?).await }
//!     })
//!     .await?;
//!
//!     println!("{}", response.message);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod code;
pub mod codec;
pub mod error;
pub mod limit;
pub mod pool;
pub mod reply;
pub mod retry;
pub mod server;
pub mod wait;

pub use code::Code;
pub use error::{ClassifiedError, Error};
