//! Content negotiation between the two wire formats.
//!
//! Requests declare their body format with `Content-Type` and ask for a response
//! format with `Accept`. Both headers are reduced to a bare media type by
//! [`normalize_media_type`] before they are matched.
//!
//! | format           | media type            | serializer   |
//! |------------------|-----------------------|--------------|
//! | [`Format::Json`]   | `application/json`    | `serde_json` |
//! | [`Format::Binary`] | `application/bincode` | `bincode`    |

use std::fmt;

use http::HeaderMap;
use http::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const JSON_MEDIA_TYPE: &str = "application/json";
pub const BINARY_MEDIA_TYPE: &str = "application/bincode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Binary,
}

impl Format {
    pub const ALL: [Format; 2] = [Format::Json, Format::Binary];

    pub fn media_type(self) -> &'static str {
        match self {
            Format::Json => JSON_MEDIA_TYPE,
            Format::Binary => BINARY_MEDIA_TYPE,
        }
    }

    pub fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.media_type())
    }

    /// Matches a raw header value.
    pub fn from_media_type(value: &str) -> Option<Self> {
        match normalize_media_type(value).as_str() {
            JSON_MEDIA_TYPE => Some(Format::Json),
            BINARY_MEDIA_TYPE => Some(Format::Binary),
            _ => None,
        }
    }

    /// The format a body was written in; missing or unknown types yield `None`.
    pub fn from_content_type(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
        Self::from_media_type(value)
    }

    /// The format a reply should be written in.
    ///
    /// A missing `Accept`, `*/*` and `application/*` all select JSON.
    pub fn from_accept(headers: &HeaderMap) -> Option<Self> {
        let Some(value) = headers.get(ACCEPT) else {
            return Some(Format::Json);
        };
        let value = value.to_str().ok()?;
        match normalize_media_type(value).as_str() {
            "" | "*/*" | "application/*" => Some(Format::Json),
            _ => Self::from_media_type(value),
        }
    }

    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf, value)?;
        Ok(buf)
    }

    /// Appends the encoding of `value` to `buf`.
    pub fn encode_into<T: Serialize + ?Sized>(self, buf: &mut Vec<u8>, value: &T) -> Result<(), CodecError> {
        match self {
            Format::Json => serde_json::to_writer(buf, value)?,
            Format::Binary => bincode::serialize_into(buf, value)?,
        }
        Ok(())
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Format::Json => Ok(serde_json::from_slice(bytes)?),
            Format::Binary => Ok(bincode::deserialize(bytes)?),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

/// Reduces a `Content-Type` or `Accept` value to a bare media type.
///
/// Everything from the first `;` or `,` on is dropped, the rest is trimmed and
/// lowercased: `" Application/JSON; charset=utf-8"` becomes `"application/json"`.
pub fn normalize_media_type(value: &str) -> String {
    let end = value.find([';', ',']).unwrap_or(value.len());
    value[..end].trim().to_ascii_lowercase()
}

/// The supported media types, as listed in negotiation errors.
pub fn supported_media_types() -> String {
    let types: Vec<&str> = Format::ALL.iter().map(|format| format.media_type()).collect();
    format!("[{}]", types.join(","))
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode: {0}")]
    Binary(#[from] bincode::Error),
}
