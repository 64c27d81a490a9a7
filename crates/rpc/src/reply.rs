//! The error envelope sent in place of a response body.

use serde::{Deserialize, Serialize};

use crate::code::Code;
use crate::error::Details;

/// The wire payload of every non-success outcome.
///
/// The same shape is encoded by the server and decoded by the client. `code_text`
/// is informational; readers rely on `code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub code: Code,
    #[serde(default)]
    pub code_text: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Details,
}

impl Reply {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self { code, code_text: code.text().to_owned(), message: message.into(), details: Details::new() }
    }

    #[must_use]
    pub fn with_details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }
}
