use std::io::Write;

use bytes::BytesMut;
use http::{Request, Version};
use httparse::Status;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use super::{MAX_HEADER_BYTES, MAX_HEADER_NUM, Writer, collect_headers, declared_framing, write_fields};
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader, SendError};

/// Parses a request line and header fields into a [`RequestHeader`].
///
/// A request without framing headers has no body.
#[derive(Debug, Default)]
pub struct RequestHeadDecoder;

impl Decoder for RequestHeadDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut fields = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut fields);

        let status = req.parse(src).map_err(|e| match e {
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
        trace!(head_len, "parsed request head");
        ensure!(head_len <= MAX_HEADER_BYTES, ParseError::too_large_header(head_len, MAX_HEADER_BYTES));

        let version = match req.version {
            Some(0) => Version::HTTP_10,
            Some(1) => Version::HTTP_11,
            v => return Err(ParseError::InvalidVersion(v)),
        };

        let mut builder = Request::builder()
            .method(req.method.ok_or(ParseError::InvalidMethod)?)
            .uri(req.path.ok_or(ParseError::InvalidUri)?)
            .version(version);
        if let Some(headers) = builder.headers_mut() {
            collect_headers(req.headers, headers)?;
        }
        let request = builder.body(()).map_err(ParseError::invalid_header)?;

        let payload_size = declared_framing(request.headers())?.unwrap_or(PayloadSize::Empty);
        src.split_to(head_len);

        Ok(Some((RequestHeader::from(request), payload_size)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        self.decode(src)?.map_or(Err(ParseError::Incomplete), |item| Ok(Some(item)))
    }
}

/// Writes a request line in origin form followed by the header fields.
///
/// A `Host` field is derived from the URI authority when the caller did not set one.
#[derive(Debug, Default)]
pub struct RequestHeadEncoder;

impl Encoder<(RequestHeader, PayloadSize)> for RequestHeadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (RequestHeader, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut header, payload_size) = item;

        ensure!(
            matches!(header.version(), Version::HTTP_11 | Version::HTTP_10),
            SendError::invalid_head(format!("unsupported http version {:?}", header.version()))
        );

        dst.reserve(header.target().len() + 32);
        write!(Writer(dst), "{} {} HTTP/1.1\r\n", header.method(), header.target())?;

        if !header.headers().contains_key(http::header::HOST)
            && let Some(authority) = header.uri().authority()
        {
            let host = http::HeaderValue::from_str(authority.as_str()).map_err(SendError::invalid_head)?;
            header.headers_mut().insert(http::header::HOST, host);
        }

        write_fields(header.headers_mut(), payload_size, dst);
        Ok(())
    }
}
