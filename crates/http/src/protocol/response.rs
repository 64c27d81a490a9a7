//! Response heads, as encoded by the server and decoded by the client.

use bytes::Bytes;
use http::response::Parts;
use http::{HeaderMap, Response, StatusCode, Version};

/// The head of an HTTP response before a body is attached.
pub type ResponseHead = Response<()>;

/// The reason phrase of a status line.
///
/// Set it as a response extension to override the canonical phrase on the wire;
/// decoded responses carry the phrase the peer actually sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonPhrase(Bytes);

impl ReasonPhrase {
    pub const fn from_static(reason: &'static str) -> Self {
        Self(Bytes::from_static(reason.as_bytes()))
    }

    pub(crate) fn from_wire(reason: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(reason))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// The decoded head of a response on the client side.
#[derive(Debug)]
pub struct ResponseHeader {
    inner: ResponseHead,
}

impl ResponseHeader {
    pub fn into_inner(self) -> ResponseHead {
        self.inner
    }

    pub fn body<T>(self, body: T) -> Response<T> {
        self.inner.map(|()| body)
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn reason(&self) -> Option<&ReasonPhrase> {
        self.inner.extensions().get::<ReasonPhrase>()
    }
}

impl From<ResponseHead> for ResponseHeader {
    #[inline]
    fn from(inner: ResponseHead) -> Self {
        Self { inner }
    }
}

impl From<Parts> for ResponseHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Response::from_parts(parts, ()) }
    }
}

/// Renders `"<code> <reason>"` the way the status line carried it.
pub fn status_line(status: StatusCode, reason: Option<&ReasonPhrase>) -> String {
    let reason = reason
        .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
        .or_else(|| status.canonical_reason().map(str::to_owned));

    match reason {
        Some(reason) if !reason.is_empty() => format!("{} {reason}", status.as_str()),
        _ => status.as_str().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_prefers_wire_reason() {
        let reason = ReasonPhrase::from_static("Retry Request");
        assert_eq!(status_line(StatusCode::from_u16(454).unwrap(), Some(&reason)), "454 Retry Request");
    }

    #[test]
    fn status_line_falls_back_to_canonical() {
        assert_eq!(status_line(StatusCode::OK, None), "200 OK");
        assert_eq!(status_line(StatusCode::from_u16(599).unwrap(), None), "599");
    }
}
