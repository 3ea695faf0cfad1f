//! Error types for the request builder.
//!
//! # Design
//! Every terminal action returns exactly one of these. Transport failures are
//! passed through untouched inside `Error::Transport`; an HTTP status of 400
//! or above collapses into the single `UnexpectedResponse` variant, and the
//! caller inspects the retained response for anything status-specific.

use std::time::Duration;

use thiserror::Error;

/// Failures reported by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS, connect, TLS or I/O failure while talking to the server.
    #[error("network error: {0}")]
    Network(String),

    /// The transport's own timeout elapsed.
    #[error("transport timed out")]
    TimedOut,

    /// The cancellation token fired before or during the call.
    #[error("request cancelled")]
    Cancelled,
}

/// Errors returned by `RequestBuilder` actions and `decode_json`.
#[derive(Debug, Error)]
pub enum Error {
    /// The builder URL could not be parsed when the request was built.
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The structured query could not be serialized to JSON.
    #[error("failed to serialize query: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request timeout elapsed before the transport returned.
    #[error("request timed out after {after:?}")]
    Timeout { after: Duration },

    /// The server answered with a status of 400 or above. The response is
    /// still available on the builder.
    #[error("unexpected response: status {status}")]
    UnexpectedResponse { status: u16 },

    /// `decode_json` was called before any action produced a response.
    #[error("no response to decode")]
    NoResponse,

    /// The response body is not valid JSON for the requested type.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
}

impl Error {
    /// Status code carried by an `UnexpectedResponse`.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::UnexpectedResponse { status } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Transport(TransportError::TimedOut)
        )
    }
}
