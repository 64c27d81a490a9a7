//! The client side of a call.
//!
//! [`Client::call`] sends one request over a fresh connection, buffers the response
//! body under a byte budget and classifies the outcome:
//!
//! 1. the exchange itself fails: [`ClientError`]
//! 2. the body cannot be read in full: [`TransportError`]
//! 3. the status is not a recognized code: [`InfraError`]
//! 4. the `Content-Type` is not a supported format: [`InfraError`]
//! 5. the status is an error code: the decoded envelope as a [`ServiceError`], or an
//!    [`InfraError`] when the body is not an envelope
//! 6. the status is `200`: the decoded response, or a [`ServiceError`] at
//!    [`Code::CLIENT_CONTENT_ERROR`] when it does not decode
//!
//! Retrying is left to the caller; see [`crate::retry`].

use std::io;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Method, Request, Uri};
use http_body_util::{BodyExt, Full};
use micro_rpc_http::connection::ClientConnection;
use micro_rpc_http::protocol::{HttpError, ReasonPhrase, status_line};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::code::Code;
use crate::codec::{CodecError, Format};
use crate::error::{
    Cancelled, ClientError, DETAIL_CODE_TEXT, DETAIL_HTTP_BODY, DETAIL_HTTP_CODE, DETAIL_HTTP_METHOD,
    DETAIL_HTTP_STATUS, DETAIL_HTTP_URL, Details, Error, InfraError, ServiceError, TransportError,
};
use crate::limit::LimitReader;
use crate::pool::BufferPool;
use crate::reply::Reply;

/// The default cap on a buffered response body.
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 5 * 1024 * 1024;

/// What went wrong while making a call, before classification.
#[derive(Error, Debug)]
pub enum CallError {
    #[error("unsupported scheme '{0}'; only http is supported")]
    UnsupportedScheme(String),

    #[error("request uri '{0}' has no host")]
    MissingHost(Uri),

    #[error("while building request: {0}")]
    Request(#[source] http::Error),

    #[error("while encoding request: {0}")]
    Encode(#[source] CodecError),

    #[error("while connecting to '{address}': {source}")]
    Connect { address: String, source: io::Error },

    #[error("while sending request: {0}")]
    Send(#[source] HttpError),

    #[error("while reading response body: {0}")]
    ReadBody(#[source] io::Error),

    #[error("while parsing response body: {0}")]
    Decode(#[source] CodecError),
}

#[derive(Debug)]
pub struct ClientBuilder {
    max_response_bytes: u64,
    pool: Option<BufferPool>,
}

impl ClientBuilder {
    fn new() -> Self {
        Self { max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES, pool: None }
    }

    /// Caps the response body; larger bodies fail as a [`TransportError`].
    pub fn max_response_bytes(mut self, max_response_bytes: u64) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }

    /// Shares `pool` with other clients or responders.
    pub fn pool(mut self, pool: BufferPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn build(self) -> Client {
        Client { max_response_bytes: self.max_response_bytes, pool: self.pool.unwrap_or_default() }
    }
}

/// Makes calls, one connection per exchange.
#[derive(Debug, Clone)]
pub struct Client {
    max_response_bytes: u64,
    pool: BufferPool,
}

impl Default for Client {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Builds a request carrying `message` encoded in `format`, asking for a reply
    /// in the same format.
    pub fn request<M>(&self, format: Format, method: Method, uri: &str, message: &M) -> Result<Request<Bytes>, Error>
    where
        M: Serialize + ?Sized,
    {
        let details = request_details(uri, &method);
        let body = format.encode(message).map_err(|e| client_error(CallError::Encode(e), &details))?;

        Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, format.header_value())
            .header(ACCEPT, format.header_value())
            .body(Bytes::from(body))
            .map_err(|e| client_error(CallError::Request(e), &details))
    }

    /// Sends `request` and decodes the response into `T`.
    ///
    /// The exchange races `token`; a cancelled call fails with a [`ClientError`]
    /// wrapping [`Cancelled`].
    pub async fn call<T>(&self, token: &CancellationToken, request: Request<Bytes>) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let details = request_details(&request.uri().to_string(), request.method());
        if token.is_cancelled() {
            return Err(client_error(Cancelled, &details));
        }

        tokio::select! {
            biased;
            () = token.cancelled() => Err(client_error(Cancelled, &details)),
            result = self.exchange(request, details.clone()) => result,
        }
    }

    async fn exchange<T>(&self, request: Request<Bytes>, mut details: Details) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let address = socket_address(request.uri()).map_err(|e| client_error(e, &details))?;
        trace!(%address, url = %request.uri(), "sending request");

        let stream = TcpStream::connect(address.as_str())
            .await
            .map_err(|source| client_error(CallError::Connect { address, source }, &details))?;
        let (reader, writer) = stream.into_split();
        let mut connection = ClientConnection::new(reader, writer);

        let response =
            connection.send(request.map(Full::new)).await.map_err(|e| client_error(CallError::Send(e), &details))?;

        let (parts, body) = response.into_parts();
        let code = Code::from(parts.status);
        details.insert(DETAIL_HTTP_STATUS.to_owned(), status_line(parts.status, parts.extensions.get::<ReasonPhrase>()));

        let mut buf = self.pool.acquire();
        let mut reader = LimitReader::new(StreamReader::new(body.into_data_stream()), self.max_response_bytes);
        if let Err(e) = reader.read_to_end(&mut buf).await {
            return Err(TransportError::new(CallError::ReadBody(e)).with_details(details).into());
        }

        if !code.is_recognized() {
            return Err(infra_error(code, &buf, details));
        }
        let Some(format) = Format::from_content_type(&parts.headers) else {
            return Err(infra_error(code, &buf, details));
        };

        if code != Code::OK {
            return Err(match format.decode::<Reply>(&buf) {
                Ok(reply) => reply_error(code, reply, details),
                Err(_) => infra_error(code, &buf, details),
            });
        }

        format.decode(&buf).map_err(|e| {
            ServiceError::with_source(Code::CLIENT_CONTENT_ERROR, CallError::Decode(e)).with_details(details).into()
        })
    }
}

fn request_details(url: &str, method: &Method) -> Details {
    Details::from([
        (DETAIL_HTTP_URL.to_owned(), url.to_owned()),
        (DETAIL_HTTP_METHOD.to_owned(), method.as_str().to_owned()),
    ])
}

fn client_error(source: impl Into<Box<dyn std::error::Error + Send + Sync>>, details: &Details) -> Error {
    ClientError::new(source).with_details(details.clone()).into()
}

fn infra_error(code: Code, body: &[u8], mut details: Details) -> Error {
    let body = String::from_utf8_lossy(body).into_owned();
    details.insert(DETAIL_HTTP_CODE.to_owned(), code.to_string());
    details.insert(DETAIL_HTTP_BODY.to_owned(), body.clone());
    InfraError::new(code, body).with_details(details).into()
}

/// The envelope's details never replace what the transport recorded.
fn reply_error(code: Code, reply: Reply, mut details: Details) -> Error {
    details.insert(DETAIL_HTTP_CODE.to_owned(), code.to_string());
    details.insert(DETAIL_CODE_TEXT.to_owned(), code.text().to_owned());
    for (key, value) in reply.details {
        details.entry(key).or_insert(value);
    }
    ServiceError::new(reply.code, reply.message).with_details(details).into()
}

fn socket_address(uri: &Uri) -> Result<String, CallError> {
    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => return Err(CallError::UnsupportedScheme(other.to_owned())),
        None => return Err(CallError::MissingHost(uri.clone())),
    }
    let host = uri.host().filter(|host| !host.is_empty()).ok_or_else(|| CallError::MissingHost(uri.clone()))?;
    Ok(format!("{host}:{}", uri.port_u16().unwrap_or(80)))
}
