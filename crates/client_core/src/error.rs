use std::time::Duration;

use shared::error::ApiError;
use thiserror::Error;

/// Failure of a single request against the store, classified at the
/// transport boundary. Every variant is recoverable: screens keep their last
/// good data and surface the error as a transient notice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Transport, DNS or TLS failure before a response was read.
    #[error("network failure: {0}")]
    Network(String),
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    /// 2xx response whose body is a WordPress error envelope.
    #[error("api error {}: {}", .0.code, .0.message)]
    Api(ApiError),
    /// 4xx/5xx response.
    #[error("api client error (status {status}){}", describe_envelope(.error))]
    ApiClient {
        status: u16,
        error: Option<ApiError>,
    },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("credentials unavailable: {0}")]
    Credentials(String),
}

fn describe_envelope(error: &Option<ApiError>) -> String {
    match error {
        Some(error) => format!(" {}: {}", error.code, error.message),
        None => String::new(),
    }
}

impl ClientError {
    /// Transport-level failures, as opposed to the server answering with an error.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// Error code reported by the server, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api(error) => Some(error.code.as_str()),
            Self::ApiClient {
                error: Some(error), ..
            } => Some(error.code.as_str()),
            _ => None,
        }
    }

    /// Human readable message from the server, falling back to the error text.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(error)
            | Self::ApiClient {
                error: Some(error), ..
            } if !error.message.is_empty() => error.message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
