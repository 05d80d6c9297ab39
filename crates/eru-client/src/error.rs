//! Error types for the ERU client

use thiserror::Error;

use crate::models::ScaleOutReport;

/// Errors surfaced by [`EruClient`](crate::EruClient) operations.
///
/// Nothing is retried; every failure propagates to the immediate caller.
/// The scaling variants carry the full per-cohort report so callers can
/// always tell which cohort did what.
#[derive(Debug, Error)]
pub enum EruError {
    /// The server did not answer within the configured timeout.
    #[error("read timeout")]
    Timeout,

    /// No TCP connection could be established.
    #[error("connection refused")]
    ConnectionRefused,

    /// The server answered with a status other than the expected one.
    /// The message is taken from the response body's `error` field when
    /// present.
    #[error("unexpected status {code}: {message}")]
    UnexpectedStatus { code: u16, message: String },

    /// Any other transport-level failure: URL construction, socket
    /// errors, malformed response bodies.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request was rejected client-side before anything was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A scale-out cohort is already at or beyond its ceiling.
    #[error("cohort {version}/{entrypoint}/{env} holds {current} containers, ceiling {ceiling} leaves no room")]
    ScaleLimit {
        version: String,
        entrypoint: String,
        env: String,
        current: usize,
        ceiling: u64,
        report: Vec<ScaleOutReport>,
    },

    /// At least one scale-out cohort failed after every cohort was
    /// attempted once.
    #[error("scale-out failed for {failed} of {total} cohorts")]
    ScaleAggregate {
        failed: usize,
        total: usize,
        report: Vec<ScaleOutReport>,
    },
}

pub type EruResult<T> = Result<T, EruError>;

impl From<reqwest::Error> for EruError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EruError::Timeout
        } else if err.is_connect() {
            EruError::ConnectionRefused
        } else {
            EruError::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for EruError {
    fn from(err: url::ParseError) -> Self {
        EruError::Transport(format!("invalid URL: {}", err))
    }
}

impl From<serde_json::Error> for EruError {
    fn from(err: serde_json::Error) -> Self {
        EruError::Transport(format!("malformed response: {}", err))
    }
}
