//! The request handler seam of the server connection.
//!
//! A [`Handler`] receives each request with a body borrowed from the connection
//! and produces a response. Handlers may read as much or as little of the body as
//! they like; the connection drains whatever is left before the next request.
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use http_body_util::Full;
//! use micro_rpc_http::handler::Handler;
//! use micro_rpc_http::protocol::body::ReqBody;
//! use std::convert::Infallible;
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl Handler for Hello {
//!     type RespBody = Full<Bytes>;
//!     type Error = Infallible;
//!
//!     async fn call(&self, req: Request<ReqBody<'_>>) -> Result<Response<Self::RespBody>, Self::Error> {
//!         Ok(Response::new(Full::new(Bytes::from(format!("hello {}", req.uri().path())))))
//!     }
//! }
//! ```

use std::error::Error;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body::Body;

use crate::protocol::body::ReqBody;

#[async_trait]
pub trait Handler: Send + Sync {
    type RespBody: Body<Data = Bytes> + Send + Unpin;
    type Error: Into<Box<dyn Error + Send + Sync>> + Send;

    async fn call(&self, req: Request<ReqBody<'_>>) -> Result<Response<Self::RespBody>, Self::Error>;
}
