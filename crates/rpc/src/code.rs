//! Protocol status codes.
//!
//! A [`Code`] travels as the HTTP status of every response. Standard HTTP codes are
//! reused where their meaning fits; 452-455 and 512 are protocol codes with no
//! HTTP equivalent. Only codes in the allow-list are *recognized*: a response
//! carrying any other status is treated as coming from infrastructure in front of
//! the service, never as a protocol envelope.

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// A numeric protocol status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Code(u16);

impl Code {
    pub const OK: Code = Code(200);
    pub const BAD_REQUEST: Code = Code(400);
    pub const UNAUTHORIZED: Code = Code(401);
    pub const FORBIDDEN: Code = Code(403);
    pub const NOT_FOUND: Code = Code(404);
    pub const CONFLICT: Code = Code(409);
    pub const TOO_MANY_REQUESTS: Code = Code(429);
    /// The client failed before the request reached the service.
    pub const CLIENT_ERROR: Code = Code(452);
    /// The service understood the request but could not complete it.
    pub const REQUEST_FAILED: Code = Code(453);
    /// The service asks the caller to try again.
    pub const RETRY_REQUEST: Code = Code(454);
    /// A body or media type could not be decoded or produced.
    pub const CLIENT_CONTENT_ERROR: Code = Code(455);
    pub const INTERNAL_ERROR: Code = Code(500);
    pub const NOT_IMPLEMENTED: Code = Code(501);
    /// A response arrived but its body could not be read.
    pub const TRANSPORT_ERROR: Code = Code(512);

    // Infrastructure codes, never recognized but worth retrying.
    pub const BAD_GATEWAY: Code = Code(502);
    pub const SERVICE_UNAVAILABLE: Code = Code(503);
    pub const GATEWAY_TIMEOUT: Code = Code(504);

    pub const fn from_u16(code: u16) -> Self {
        Code(code)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true when the code is part of the protocol's allow-list.
    pub const fn is_recognized(self) -> bool {
        matches!(self.0, 200 | 400 | 401 | 403 | 404 | 409 | 429 | 452 | 453 | 454 | 455 | 500 | 501 | 512)
    }

    /// The human-readable label of the code, never empty.
    pub fn text(self) -> &'static str {
        match self.0 {
            200 => "OK",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            409 => "Conflict",
            429 => "Too Many Requests",
            452 => "Client Error",
            453 => "Request Failed",
            454 => "Retry Request",
            455 => "Client Content Error",
            500 => "Internal Error",
            501 => "Not Implemented",
            512 => "Transport Error",
            other => StatusCode::from_u16(other).ok().and_then(|status| status.canonical_reason()).unwrap_or("Unknown Code"),
        }
    }

    /// The HTTP status carrying this code, `None` outside `100..=999`.
    pub fn status(self) -> Option<StatusCode> {
        StatusCode::from_u16(self.0).ok()
    }
}

impl From<StatusCode> for Code {
    fn from(status: StatusCode) -> Self {
        Code(status.as_u16())
    }
}

impl From<Code> for i32 {
    fn from(code: Code) -> Self {
        i32::from(code.0)
    }
}

impl TryFrom<i32> for Code {
    type Error = std::num::TryFromIntError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        u16::try_from(code).map(Code)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECOGNIZED: [Code; 14] = [
        Code::OK,
        Code::BAD_REQUEST,
        Code::UNAUTHORIZED,
        Code::FORBIDDEN,
        Code::NOT_FOUND,
        Code::CONFLICT,
        Code::TOO_MANY_REQUESTS,
        Code::CLIENT_ERROR,
        Code::REQUEST_FAILED,
        Code::RETRY_REQUEST,
        Code::CLIENT_CONTENT_ERROR,
        Code::INTERNAL_ERROR,
        Code::NOT_IMPLEMENTED,
        Code::TRANSPORT_ERROR,
    ];

    #[test]
    fn recognized_codes_have_text() {
        for code in RECOGNIZED {
            assert!(code.is_recognized(), "{code} should be recognized");
            assert!(!code.text().is_empty(), "{code} has no text");
        }
    }

    #[test]
    fn recognition_is_membership_not_range() {
        for code in [201, 402, 451, 456, 502, 503, 504, 511, 513] {
            assert!(!Code::from_u16(code).is_recognized(), "{code} should not be recognized");
        }
    }

    #[test]
    fn unrecognized_codes_fall_back_to_reason_phrase() {
        assert_eq!(Code::BAD_GATEWAY.text(), "Bad Gateway");
        assert_eq!(Code::from_u16(418).text(), "I'm a teapot");
        assert_eq!(Code::from_u16(599).text(), "Unknown Code");
        assert_eq!(Code::from_u16(0).text(), "Unknown Code");
        assert_eq!(Code::from_u16(u16::MAX).text(), "Unknown Code");
    }

    #[test]
    fn protocol_codes_have_their_own_labels() {
        assert_eq!(Code::CLIENT_CONTENT_ERROR.text(), "Client Content Error");
        assert_eq!(Code::TRANSPORT_ERROR.text(), "Transport Error");
        assert_eq!(Code::INTERNAL_ERROR.text(), "Internal Error");
    }

    #[test]
    fn conversions() {
        assert_eq!(Code::from(StatusCode::NOT_FOUND), Code::NOT_FOUND);
        assert_eq!(i32::from(Code::RETRY_REQUEST), 454);
        assert_eq!(Code::try_from(455).unwrap(), Code::CLIENT_CONTENT_ERROR);
        assert!(Code::try_from(-1).is_err());
        assert_eq!(Code::from_u16(1000).status(), None);
        assert_eq!(Code::TRANSPORT_ERROR.to_string(), "512");
    }
}
