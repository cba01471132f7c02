//! Custom error types for the panel.
//!
//! This module defines the primary error type, `PanelError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized way to describe what can go
//! wrong while talking to the imaging server, loading configuration, or driving a run.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically TOML syntax or type mismatches
//!   in the configuration file or environment.
//! - **`Configuration`**: Semantic errors that pass parsing but are logically invalid
//!   (e.g. a receiver count of zero). Raised by `PanelConfig::validate`.
//! - **`Http`** / **`ServerStatus`** / **`Timeout`**: Transport-level failures, non-2xx
//!   replies and requests that exceeded their deadline.
//! - **`MalformedStatus`**: The status endpoint answered but the body was not the
//!   expected `{ "connection", "sample_rate" }` object.
//! - **`RetriesExhausted`**: A main-image request failed on every attempt.
//! - **`AlreadyRunning`** / **`Cancelled`**: Run-control outcomes.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the panel error type.
pub type AppResult<T> = std::result::Result<T, PanelError>;

/// Every failure the panel can report.
#[derive(Error, Debug)]
pub enum PanelError {
    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Configuration parsed but is invalid
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Base URL or endpoint could not be parsed
    #[error("Invalid server URL: {0}")]
    Url(#[from] url::ParseError),

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx reply
    #[error("Server returned status {status} for {path}")]
    ServerStatus {
        /// HTTP status code
        status: u16,
        /// Endpoint that answered
        path: String,
    },

    /// Request exceeded its deadline
    #[error("Request to {path} timed out after {after:?}")]
    Timeout {
        /// Endpoint that did not answer
        path: String,
        /// Deadline that expired
        after: Duration,
    },

    /// Status body was not the expected JSON object
    #[error("Malformed status reply: {0}")]
    MalformedStatus(String),

    /// Every attempt of a main-image request failed
    #[error("Image request failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made, including the first
        attempts: u32,
        /// Error of the final attempt
        last: Box<PanelError>,
    },

    /// Start requested while a run is active
    #[error("An acquisition run is already active")]
    AlreadyRunning,

    /// Run aborted while a request was in flight
    #[error("Request cancelled")]
    Cancelled,

    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for PanelError {
    fn from(err: figment::Error) -> Self {
        PanelError::Config(Box::new(err))
    }
}

impl PanelError {
    /// Whether a fresh attempt at the same request could succeed.
    ///
    /// Run-control errors and configuration errors are permanent; anything that
    /// came back from the wire is worth another try.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PanelError::Http(_)
                | PanelError::ServerStatus { .. }
                | PanelError::Timeout { .. }
                | PanelError::MalformedStatus(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_retryable() {
        let err = PanelError::ServerStatus {
            status: 503,
            path: "/sonar_image_2D.png".into(),
        };
        assert!(err.is_retryable());

        let err = PanelError::Timeout {
            path: "/sonar_image_1D.png".into(),
            after: Duration::from_secs(5),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn run_control_errors_are_permanent() {
        assert!(!PanelError::AlreadyRunning.is_retryable());
        assert!(!PanelError::Cancelled.is_retryable());
        assert!(!PanelError::Configuration("receiver_count".into()).is_retryable());
    }

    #[test]
    fn exhausted_retries_mention_last_failure() {
        let err = PanelError::RetriesExhausted {
            attempts: 3,
            last: Box::new(PanelError::ServerStatus {
                status: 500,
                path: "/sonar_image_2D.png".into(),
            }),
        };
        let text = err.to_string();
        assert!(text.contains("3 attempts"));
        assert!(text.contains("500"));
    }
}
