use reqwest::StatusCode;
use thiserror::Error;

use crate::transport::TransportError;

/// Failure of a call made through the request pipeline.
#[derive(Error, Debug)]
pub enum RequestError {
    /// DNS, connection or timeout failure. Never retried.
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    /// Non-2xx response, message surfaced as the server sent it.
    #[error("HTTP {status}: {message}")]
    Http { status: StatusCode, message: String },

    /// The session could not be renewed, or the renewed call was still rejected.
    /// The credential store is empty once this is returned.
    #[error("session expired")]
    AuthExpired,

    /// A refresh was requested with no stored credential.
    #[error("no stored credential")]
    NoCredential,

    /// A 2xx body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl RequestError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Outcome of a failed refresh episode. `Clone` because every waiter of a
/// shared episode receives its own copy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    NoCredential,

    #[error("refresh rejected with HTTP {status}: {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("refresh failed: {0}")]
    Network(TransportError),

    #[error("malformed refresh response: {0}")]
    Malformed(String),
}

impl From<RefreshError> for RequestError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::NoCredential => RequestError::NoCredential,
            _ => RequestError::AuthExpired,
        }
    }
}
