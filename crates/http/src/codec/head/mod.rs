//! Start-line and header-field codecs for both message directions.
//!
//! - [`RequestHeadDecoder`] / [`ResponseHeadEncoder`]: the server side
//! - [`RequestHeadEncoder`] / [`ResponseHeadDecoder`]: the client side
//!
//! Decoders parse with `httparse` and work out the body framing from
//! `Transfer-Encoding` / `Content-Length`; encoders write the start line and
//! rewrite the framing headers to match the [`PayloadSize`] they are handed.
//!
//! # Limits
//!
//! - at most 64 header fields
//! - at most 8KiB for the whole head

mod request_head;
mod response_head;

pub use request_head::{RequestHeadDecoder, RequestHeadEncoder};
pub use response_head::{ResponseHeadDecoder, ResponseHeadEncoder};

use bytes::{BufMut, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, header};

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize};

/// Maximum number of header fields in one head
pub(crate) const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes of one head, start line included
pub(crate) const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Initial buffer reservation for an encoded head
const INIT_HEADER_SIZE: usize = 1024;

const CHUNKED: HeaderValue = HeaderValue::from_static("chunked");

/// Copies parsed header fields into a `HeaderMap`.
pub(crate) fn collect_headers(parsed: &[httparse::Header<'_>], headers: &mut HeaderMap) -> Result<(), ParseError> {
    headers.reserve(parsed.len());
    for field in parsed {
        let name = HeaderName::from_bytes(field.name.as_bytes()).map_err(ParseError::invalid_header)?;
        let value = HeaderValue::from_bytes(field.value).map_err(ParseError::invalid_header)?;
        headers.append(name, value);
    }
    Ok(())
}

/// Returns the framing declared by the headers, `None` when neither framing header is present.
///
/// refer: <https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length>
pub(crate) fn declared_framing(headers: &HeaderMap) -> Result<Option<PayloadSize>, ParseError> {
    let te_header = headers.get(header::TRANSFER_ENCODING);
    let cl_header = headers.get(header::CONTENT_LENGTH);

    match (te_header, cl_header) {
        (None, None) => Ok(None),

        (Some(te_value), None) => {
            ensure!(is_chunked(te_value), ParseError::invalid_header("transfer-encoding without chunked as final coding"));
            Ok(Some(PayloadSize::Chunked))
        }

        (None, Some(cl_value)) => {
            let cl_str = cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value is not visible ascii"))?;
            let length = cl_str
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;
            Ok(Some(if length == 0 { PayloadSize::Empty } else { PayloadSize::Length(length) }))
        }

        (Some(_), Some(_)) => {
            Err(ParseError::invalid_content_length("transfer-encoding and content-length both present in headers"))
        }
    }
}

/// Chunked must be the final coding when present.
fn is_chunked(value: &HeaderValue) -> bool {
    value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

/// Makes the framing headers agree with `payload_size`, then writes every field and the blank line.
pub(crate) fn write_fields(headers: &mut HeaderMap, payload_size: PayloadSize, dst: &mut BytesMut) {
    match payload_size {
        PayloadSize::Length(n) => {
            headers.remove(header::TRANSFER_ENCODING);
            headers.insert(header::CONTENT_LENGTH, n.into());
        }
        PayloadSize::Chunked => {
            headers.remove(header::CONTENT_LENGTH);
            headers.insert(header::TRANSFER_ENCODING, CHUNKED);
        }
        PayloadSize::Empty => {
            headers.remove(header::TRANSFER_ENCODING);
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
        }
        PayloadSize::UntilClose => {
            headers.remove(header::TRANSFER_ENCODING);
            headers.remove(header::CONTENT_LENGTH);
        }
    }

    dst.reserve(INIT_HEADER_SIZE);
    for (name, value) in headers.iter() {
        dst.put_slice(name.as_ref());
        dst.put_slice(b": ");
        dst.put_slice(value.as_ref());
        dst.put_slice(b"\r\n");
    }
    dst.put_slice(b"\r\n");
}

/// `io::Write` over a `BytesMut`, for `write!` into an encode buffer.
pub(crate) struct Writer<'a>(pub(crate) &'a mut BytesMut);

impl std::io::Write for Writer<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
