use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("failed to decode {endpoint} response: {reason}")]
    Decode { endpoint: String, reason: String },
    #[error("listing {endpoint} exceeded {limit} pages")]
    TooManyPages { endpoint: String, limit: usize },
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("session expired; sign in again")]
    SessionExpired,
}

impl ClientError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
