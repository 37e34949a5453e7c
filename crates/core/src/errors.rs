use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Wire shape of a server-side error response. The server reports a
/// human-readable `message`, a stable `id` and a `detailed_error`
/// diagnostic; all three are surfaced to the operator as one block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub detailed_error: String,
    #[serde(default)]
    pub status_code: u16,
}

impl ErrorDetail {
    pub fn from_message(message: impl Into<String>, status_code: u16) -> Self {
        Self { message: message.into(), status_code, ..Self::default() }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} (id: {})", self.message, self.id)
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("authentication rejected: {0}")]
    Auth(ErrorDetail),
    #[error("not found: {0}")]
    NotFound(ErrorDetail),
    #[error("malformed or unexpected server response: {0}")]
    Validation(String),
}

impl ClientError {
    /// The structured server-side detail, when the failure carried one.
    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            Self::Auth(detail) | Self::NotFound(detail) => Some(detail),
            Self::Transport(_) | Self::Validation(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
