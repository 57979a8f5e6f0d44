use std::time::Duration;

use http::StatusCode;

use crate::IssueRef;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Transient network error (HTTP {status})")]
    Network { status: u16 },

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Issue not found {0}")]
    NotFound(IssueRef),

    #[error("Invalid issue reference {0:?}, expected owner/name#number")]
    InvalidIssueRef(String),
}

impl Error {
    /// Classify a failed HTTP response for `issue`
    ///
    /// `retry_after` is only known when the response carried rate-limit metadata.
    pub fn from_status(status: StatusCode, issue: &IssueRef, retry_after: Option<Duration>) -> Error {
        match status {
            StatusCode::NOT_FOUND => Error::NotFound(issue.clone()),
            StatusCode::TOO_MANY_REQUESTS => Error::RateLimited { retry_after },
            StatusCode::FORBIDDEN if retry_after.is_some() => Error::RateLimited { retry_after },
            StatusCode::REQUEST_TIMEOUT
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => Error::Network {
                status: status.as_u16(),
            },
            _ => Error::Unknown(format!("unexpected HTTP status {status} for {issue}")),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network { .. } | Error::RateLimited { .. } => true,
            Error::Unknown(_) | Error::NotFound(_) | Error::InvalidIssueRef(_) => false,
        }
    }

    /// Delay to wait before retrying, if the failure said so
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Error {
        Error::Unknown(format!("{err:#}"))
    }
}
