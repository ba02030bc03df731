// crates/dealerflow/src/jobs/error_codes.rs
use serde::{Deserialize, Serialize};

/// Failure categories an executor can report. Persisted as their `as_str` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Timeout,
    RateLimit,
    ServerError,
    DependencyDown,
    BadPayload,
    NotFound,
    UnknownJobType,
    Unknown,
}

impl ErrorKind {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "TIMEOUT" => Self::Timeout,
            "RATE_LIMIT" => Self::RateLimit,
            "SERVER_ERROR" => Self::ServerError,
            "DEPENDENCY_DOWN" => Self::DependencyDown,
            "BAD_PAYLOAD" => Self::BadPayload,
            "NOT_FOUND" => Self::NotFound,
            "UNKNOWN_JOB_TYPE" => Self::UnknownJobType,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::RateLimit => "RATE_LIMIT",
            Self::ServerError => "SERVER_ERROR",
            Self::DependencyDown => "DEPENDENCY_DOWN",
            Self::BadPayload => "BAD_PAYLOAD",
            Self::NotFound => "NOT_FOUND",
            Self::UnknownJobType => "UNKNOWN_JOB_TYPE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Maps an upstream HTTP status to a kind. 429 and 5xx are the usual
    /// transient cases for feed endpoints.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            408 | 504 => Self::Timeout,
            429 => Self::RateLimit,
            404 | 410 => Self::NotFound,
            400 | 422 => Self::BadPayload,
            502 | 503 => Self::DependencyDown,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
