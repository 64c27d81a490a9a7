//! The server side of a call.
//!
//! A [`Responder`] is what a request handler uses to speak the protocol: it decodes
//! the request body in the format named by `Content-Type`, and turns either a
//! response message or any error into a response in the format named by `Accept`.
//! Every failure becomes an envelope; nothing escapes to the connection as a raw
//! error.
//!
//! [`Server`] accepts connections and drives each one through a
//! [`ServerConnection`] until the cancellation token fires.

use std::error::Error as StdError;
use std::fmt::Display;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use http::header::{ACCEPT, CONTENT_TYPE, HeaderValue, X_CONTENT_TYPE_OPTIONS};
use http::{Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use micro_rpc_http::connection::ServerConnection;
use micro_rpc_http::handler::Handler;
use micro_rpc_http::protocol::ReasonPhrase;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::code::Code;
use crate::codec::{Format, supported_media_types};
use crate::error::{ClassifiedError, ServiceError, classify};
use crate::limit::{LimitExceeded, LimitReader};
use crate::pool::BufferPool;
use crate::reply::Reply;

/// The default cap on a buffered request body.
pub const DEFAULT_MAX_REQUEST_BYTES: u64 = 5 * 1024 * 1024;

/// Written when not even an error envelope can be encoded.
const FALLBACK_BODY: &[u8] = br#"{"code":500,"codeText":"Internal Error","message":"failed to encode reply","details":{}}"#;

#[derive(Debug)]
pub struct ResponderBuilder {
    max_request_bytes: u64,
    pool: Option<BufferPool>,
}

impl ResponderBuilder {
    fn new() -> Self {
        Self { max_request_bytes: DEFAULT_MAX_REQUEST_BYTES, pool: None }
    }

    /// Caps the request body; larger bodies are rejected with `400`.
    pub fn max_request_bytes(mut self, max_request_bytes: u64) -> Self {
        self.max_request_bytes = max_request_bytes;
        self
    }

    pub fn pool(mut self, pool: BufferPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn build(self) -> Responder {
        Responder { max_request_bytes: self.max_request_bytes, pool: self.pool.unwrap_or_default() }
    }
}

/// Reads requests and writes replies.
#[derive(Debug, Clone)]
pub struct Responder {
    max_request_bytes: u64,
    pool: BufferPool,
}

impl Default for Responder {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Responder {
    pub fn builder() -> ResponderBuilder {
        ResponderBuilder::new()
    }

    /// Rejects anything but `POST` with [`Code::BAD_REQUEST`].
    pub fn ensure_post<B>(&self, request: &Request<B>) -> Result<(), ServiceError> {
        if request.method() == Method::POST {
            return Ok(());
        }
        Err(ServiceError::new(Code::BAD_REQUEST, format!("http method '{}' not allowed; only POST", request.method())))
    }

    /// Buffers the request body and decodes it in the format named by `Content-Type`.
    ///
    /// A body over the budget fails with [`Code::BAD_REQUEST`], an unsupported
    /// content type or an undecodable body with [`Code::CLIENT_CONTENT_ERROR`].
    pub async fn read_request<B, T>(&self, request: &mut Request<B>) -> Result<T, ServiceError>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
        T: DeserializeOwned,
    {
        let mut buf = self.pool.acquire();
        let stream = request.body_mut().into_data_stream().map_err(io::Error::other);
        let mut reader = LimitReader::new(StreamReader::new(stream), self.max_request_bytes);
        if let Err(e) = reader.read_to_end(&mut buf).await {
            return Err(match LimitExceeded::from_io(&e) {
                Some(exceeded) => ServiceError::new(exceeded.code(), exceeded.message()),
                None => ServiceError::with_source(Code::TRANSPORT_ERROR, e),
            });
        }

        let Some(format) = Format::from_content_type(request.headers()) else {
            let content_type = header_text(request.headers().get(CONTENT_TYPE));
            return Err(ServiceError::new(
                Code::CLIENT_CONTENT_ERROR,
                format!("Content-Type header '{content_type}' is invalid format or unrecognized content type"),
            ));
        };

        format.decode(&buf).map_err(|e| ServiceError::with_source(Code::CLIENT_CONTENT_ERROR, e))
    }

    /// Encodes `message` in the format named by `Accept` with `code` as the status.
    ///
    /// An unsupported `Accept` gets a JSON envelope at
    /// [`Code::CLIENT_CONTENT_ERROR`] listing the supported types instead.
    pub fn reply<B, T>(&self, request: &Request<B>, code: Code, message: &T) -> Response<Full<Bytes>>
    where
        T: Serialize + ?Sized,
    {
        match Format::from_accept(request.headers()) {
            Some(format) => encode_response(format, code, message),
            None => {
                let accept = header_text(request.headers().get(ACCEPT));
                let reply = Reply::new(
                    Code::CLIENT_CONTENT_ERROR,
                    format!(
                        "Accept header '{accept}' is invalid format or unrecognized content type, only {} are supported by this method",
                        supported_media_types()
                    ),
                );
                encode_response(Format::Json, Code::CLIENT_CONTENT_ERROR, &reply)
            }
        }
    }

    /// Replies with an envelope carrying only a message.
    pub fn reply_with_code<B>(&self, request: &Request<B>, code: Code, message: impl Into<String>) -> Response<Full<Bytes>> {
        self.reply(request, code, &Reply::new(code, message))
    }

    /// Replies with the envelope of `err`.
    ///
    /// Errors without a classification become [`Code::INTERNAL_ERROR`] carrying their
    /// rendering as the message.
    pub fn reply_error<B>(&self, request: &Request<B>, err: &(dyn StdError + 'static)) -> Response<Full<Bytes>> {
        match classify(err) {
            Some(classified) => self.reply(request, classified.code(), &classified.to_reply()),
            None => {
                error!(cause = %err, "unclassified error, replying with internal error");
                self.reply_with_code(request, Code::INTERNAL_ERROR, err.to_string())
            }
        }
    }
}

fn header_text(value: Option<&HeaderValue>) -> String {
    value.map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned()).unwrap_or_default()
}

fn encode_response<T: Serialize + ?Sized>(format: Format, code: Code, message: &T) -> Response<Full<Bytes>> {
    match format.encode(message) {
        Ok(body) => response(format, code, Bytes::from(body)),
        Err(e) => {
            error!(cause = %e, %code, "failed to encode reply");
            match format.encode(&Reply::new(Code::INTERNAL_ERROR, e.to_string())) {
                Ok(body) => response(format, Code::INTERNAL_ERROR, Bytes::from(body)),
                Err(_) => response(Format::Json, Code::INTERNAL_ERROR, Bytes::from_static(FALLBACK_BODY)),
            }
        }
    }
}

fn response(format: Format, code: Code, body: Bytes) -> Response<Full<Bytes>> {
    let status = code.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, format.header_value());
    response.headers_mut().insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response.extensions_mut().insert(ReasonPhrase::from_static(Code::from(status).text()));
    response
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("handler must be set")]
    MissingHandler,
    #[error("address or listener must be set")]
    MissingAddress,
    #[error("invalid address: {0}")]
    InvalidAddress(#[source] io::Error),
}

#[derive(Debug)]
enum Bind {
    Address(Vec<SocketAddr>),
    Listener(TcpListener),
}

#[derive(Debug)]
pub struct ServerBuilder<H> {
    bind: Option<io::Result<Bind>>,
    handler: Option<Arc<H>>,
}

impl<H> ServerBuilder<H> {
    fn new() -> Self {
        Self { bind: None, handler: None }
    }

    /// Binds to `address` when the server starts.
    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.bind = Some(address.to_socket_addrs().map(|addrs| Bind::Address(addrs.collect())));
        self
    }

    /// Serves on a listener that is already bound.
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.bind = Some(Ok(Bind::Listener(listener)));
        self
    }

    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Result<Server<H>, ServerBuildError> {
        let handler = self.handler.ok_or(ServerBuildError::MissingHandler)?;
        let bind = self.bind.ok_or(ServerBuildError::MissingAddress)?.map_err(ServerBuildError::InvalidAddress)?;
        Ok(Server { bind, handler })
    }
}

/// Serves a [`Handler`] over TCP.
#[derive(Debug)]
pub struct Server<H> {
    bind: Bind,
    handler: Arc<H>,
}

impl<H> Server<H>
where
    H: Handler + 'static,
    <H::RespBody as Body>::Error: Display + Send,
{
    pub fn builder() -> ServerBuilder<H> {
        ServerBuilder::new()
    }

    /// Accepts connections until `token` is cancelled.
    ///
    /// Connections still open at that point are dropped along with their tasks.
    pub async fn serve(self, token: CancellationToken) -> io::Result<()> {
        let listener = match self.bind {
            Bind::Listener(listener) => listener,
            Bind::Address(addresses) => TcpListener::bind(addresses.as_slice()).await?,
        };
        info!(address = ?listener.local_addr(), "start listening");

        let mut connections = JoinSet::new();
        loop {
            let accepted = tokio::select! {
                biased;
                () = token.cancelled() => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => continue,
                accepted = listener.accept() => accepted,
            };

            let (tcp_stream, remote_addr) = match accepted {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let handler = Arc::clone(&self.handler);
            connections.spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                let connection = ServerConnection::new(reader, writer);
                match connection.process(handler.as_ref()).await {
                    Ok(()) => info!(%remote_addr, "finished process, connection shutdown"),
                    Err(e) => error!(%remote_addr, cause = %e, "service has error, connection shutdown"),
                }
            });
        }

        info!(connections = connections.len(), "stop listening");
        connections.shutdown().await;
        Ok(())
    }
}
