use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::{Response, StatusCode, Version};
use httparse::Status;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{error, trace};

use super::{MAX_HEADER_BYTES, MAX_HEADER_NUM, Writer, collect_headers, declared_framing, write_fields};
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, ReasonPhrase, ResponseHead, ResponseHeader, SendError};

/// Parses a status line and header fields into a [`ResponseHeader`].
///
/// Responses that cannot carry a body (1xx, 204, 304) are always empty; a response
/// without framing headers is delimited by the connection closing.
#[derive(Debug, Default)]
pub struct ResponseHeadDecoder;

impl Decoder for ResponseHeadDecoder {
    type Item = (ResponseHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut fields = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut resp = httparse::Response::new(&mut fields);

        let status = resp.parse(src).map_err(|e| match e {
            httparse::Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e),
        })?;

        let head_len = match status {
            Status::Complete(head_len) => head_len,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };
        trace!(head_len, "parsed response head");
        ensure!(head_len <= MAX_HEADER_BYTES, ParseError::too_large_header(head_len, MAX_HEADER_BYTES));

        let version = match resp.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            v => return Err(ParseError::InvalidVersion(v)),
        };
        let status = resp
            .code
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or(ParseError::InvalidStatus(resp.code))?;

        let mut response = Response::new(());
        *response.status_mut() = status;
        *response.version_mut() = version;
        collect_headers(resp.headers, response.headers_mut())?;
        if let Some(reason) = resp.reason.filter(|reason| !reason.is_empty()) {
            response.extensions_mut().insert(ReasonPhrase::from_wire(reason.as_bytes()));
        }

        let payload_size = if status.is_informational()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED
        {
            PayloadSize::Empty
        } else {
            declared_framing(response.headers())?.unwrap_or(PayloadSize::UntilClose)
        };
        src.split_to(head_len);

        Ok(Some((ResponseHeader::from(response), payload_size)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        self.decode(src)?.map_or(Err(ParseError::Incomplete), |item| Ok(Some(item)))
    }
}

/// Writes an HTTP/1.1 status line followed by the header fields.
///
/// The reason phrase comes from a [`ReasonPhrase`] extension when present, so
/// status codes the `http` crate has no phrase for still get one.
#[derive(Debug, Default)]
pub struct ResponseHeadEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for ResponseHeadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        if head.version() != Version::HTTP_11 {
            error!(http_version = ?head.version(), "unsupported http version");
            return Err(SendError::invalid_head(format!("unsupported http version {:?}", head.version())));
        }

        write!(Writer(dst), "HTTP/1.1 {} ", head.status().as_str())?;
        match head.extensions().get::<ReasonPhrase>() {
            Some(reason) => dst.put_slice(reason.as_bytes()),
            None => dst.put_slice(head.status().canonical_reason().unwrap_or("Unknown").as_bytes()),
        }
        dst.put_slice(b"\r\n");

        write_fields(head.headers_mut(), payload_size, dst);
        Ok(())
    }
}
