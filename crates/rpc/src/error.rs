//! The error taxonomy of an RPC call.
//!
//! Every failure reachable through [`Client::call`](crate::client::Client::call) or
//! [`Responder::read_request`](crate::server::Responder::read_request) is exactly one of:
//!
//! | variant            | raised when                                                        |
//! |--------------------|--------------------------------------------------------------------|
//! | [`ServiceError`]   | the service rejected the call, or its reply could not be decoded   |
//! | [`ClientError`]    | nothing useful crossed the wire: bad request, refused connection   |
//! | [`TransportError`] | a response arrived but its body could not be read                  |
//! | [`InfraError`]     | something other than the service answered                          |
//!
//! All of them implement [`ClassifiedError`], the capability the server needs to
//! render an error as a [`Reply`] and the retry engine needs to read its code.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::io;

use crate::code::Code;
use crate::limit::LimitExceeded;
use crate::reply::Reply;

/// Free-form key-value context carried alongside an error.
pub type Details = BTreeMap<String, String>;

pub(crate) static NO_DETAILS: Details = BTreeMap::new();

pub const DETAIL_HTTP_URL: &str = "http.url";
pub const DETAIL_HTTP_METHOD: &str = "http.method";
/// The status line as received, e.g. `"200 OK"`.
pub const DETAIL_HTTP_STATUS: &str = "http.status";
/// The numeric status as received.
pub const DETAIL_HTTP_CODE: &str = "http.code";
pub const DETAIL_HTTP_BODY: &str = "http.body";
pub const DETAIL_CODE_TEXT: &str = "rpc.code-text";

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// An error that knows which protocol code describes it.
pub trait ClassifiedError: StdError + Send + Sync + 'static {
    fn code(&self) -> Code;

    fn message(&self) -> String;

    fn details(&self) -> &Details;

    /// Renders the error as the envelope the server sends.
    fn to_reply(&self) -> Reply {
        Reply::new(self.code(), self.message()).with_details(self.details().clone())
    }
}

/// An error raised by service logic, or decoded from a service's reply.
#[derive(Debug)]
pub struct ServiceError {
    code: Code,
    message: String,
    source: Option<BoxError>,
    details: Details,
}

impl ServiceError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), source: None, details: Details::new() }
    }

    /// Wraps `source`, whose rendering becomes the message.
    pub fn with_source(code: Code, source: impl Into<BoxError>) -> Self {
        Self { code, message: String::new(), source: Some(source.into()), details: Details::new() }
    }

    #[must_use]
    pub fn with_details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }

    #[must_use]
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.text(), self.message())
    }
}

impl StdError for ServiceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}

impl ClassifiedError for ServiceError {
    fn code(&self) -> Code {
        self.code
    }

    fn message(&self) -> String {
        match &self.source {
            Some(source) if self.message.is_empty() => source.to_string(),
            Some(source) => format!("{}: {source}", self.message),
            None => self.message.clone(),
        }
    }

    fn details(&self) -> &Details {
        &self.details
    }
}

impl From<Reply> for ServiceError {
    fn from(reply: Reply) -> Self {
        Self { code: reply.code, message: reply.message, source: None, details: reply.details }
    }
}

/// The call failed before the service could answer it.
#[derive(Debug, thiserror::Error)]
#[error("Client Error: {source}")]
pub struct ClientError {
    source: BoxError,
    details: Details,
}

impl ClientError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self { source: source.into(), details: Details::new() }
    }

    #[must_use]
    pub fn with_details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.source.is::<Cancelled>()
    }
}

impl ClassifiedError for ClientError {
    fn code(&self) -> Code {
        Code::CLIENT_ERROR
    }

    fn message(&self) -> String {
        self.source.to_string()
    }

    fn details(&self) -> &Details {
        &self.details
    }
}

/// A response arrived but its body could not be read in full.
#[derive(Debug, thiserror::Error)]
#[error("Transport Error: {source}")]
pub struct TransportError {
    source: BoxError,
    details: Details,
}

impl TransportError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self { source: source.into(), details: Details::new() }
    }

    #[must_use]
    pub fn with_details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }
}

impl ClassifiedError for TransportError {
    fn code(&self) -> Code {
        Code::TRANSPORT_ERROR
    }

    fn message(&self) -> String {
        self.source.to_string()
    }

    fn details(&self) -> &Details {
        &self.details
    }
}

/// The response did not come from the service.
///
/// Either the status was not a recognized protocol code or the body was not an
/// envelope; the raw body is kept as the message.
#[derive(Debug)]
pub struct InfraError {
    code: Code,
    body: String,
    details: Details,
}

impl InfraError {
    pub fn new(code: Code, body: impl Into<String>) -> Self {
        Self { code, body: body.into(), details: Details::new() }
    }

    #[must_use]
    pub fn with_details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = |key| self.details.get(key).map_or("", String::as_str);
        write!(
            f,
            "{} {} returned infrastructure error {} with body: {}",
            detail(DETAIL_HTTP_METHOD),
            detail(DETAIL_HTTP_URL),
            self.code,
            self.body
        )
    }
}

impl StdError for InfraError {}

impl ClassifiedError for InfraError {
    fn code(&self) -> Code {
        self.code
    }

    fn message(&self) -> String {
        self.body.clone()
    }

    fn details(&self) -> &Details {
        &self.details
    }
}

/// The caller's cancellation token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Any classified failure of a call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Client(e) if e.is_cancelled())
    }

    fn classified(&self) -> &dyn ClassifiedError {
        match self {
            Error::Service(e) => e,
            Error::Client(e) => e,
            Error::Transport(e) => e,
            Error::Infra(e) => e,
        }
    }
}

impl ClassifiedError for Error {
    fn code(&self) -> Code {
        self.classified().code()
    }

    fn message(&self) -> String {
        self.classified().message()
    }

    fn details(&self) -> &Details {
        self.classified().details()
    }
}

/// Finds the classified error behind `err`, if there is one.
///
/// The `source()` chain is walked, and so is the payload of any `io::Error` on the
/// way, so a taxonomy error wrapped by a reader or by application code is still found.
pub fn classify<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a dyn ClassifiedError> {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(classified) = as_classified(err) {
            return Some(classified);
        }

        let payload = err
            .downcast_ref::<io::Error>()
            .and_then(io::Error::get_ref)
            .map(|inner| inner as &(dyn StdError + 'static));
        current = payload.or_else(|| err.source());
    }
    None
}

fn as_classified<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a dyn ClassifiedError> {
    if let Some(e) = err.downcast_ref::<Error>() {
        return Some(e);
    }
    if let Some(e) = err.downcast_ref::<ServiceError>() {
        return Some(e);
    }
    if let Some(e) = err.downcast_ref::<ClientError>() {
        return Some(e);
    }
    if let Some(e) = err.downcast_ref::<TransportError>() {
        return Some(e);
    }
    if let Some(e) = err.downcast_ref::<InfraError>() {
        return Some(e);
    }
    err.downcast_ref::<LimitExceeded>().map(|e| e as &dyn ClassifiedError)
}
