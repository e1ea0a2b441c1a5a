//! Error types for the Pulseboard core library.
//!
//! Every failure the engine can observe is a [`PulseboardError`]. Poll-cycle
//! failures never propagate past a tick: the poller classifies them with
//! [`PulseboardError::kind`], logs them and reschedules.
//!
//! # Error Codes Reference
//!
//! | Code Range | Category | Description |
//! |------------|----------|-------------|
//! | E1001-E1099 | Transport | Network failure, timeout, non-OK HTTP status |
//! | E2001-E2099 | Payload | Malformed, empty or unexpectedly shaped JSON |
//! | E3001-E3099 | Config | Configuration file, environment and validation errors |
//! | E9001-E9099 | General | Internal, IO and serialization errors |

use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

/// How a failed poll cycle is reported on the diagnostic channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollErrorKind {
    /// Network failure or non-OK HTTP status.
    Transport,
    /// Malformed, empty or unrecognised payload.
    Parse,
    /// Anything that is neither (should not happen inside a tick).
    Other,
}

impl fmt::Display for PollErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollErrorKind::Transport => write!(f, "transport"),
            PollErrorKind::Parse => write!(f, "parse"),
            PollErrorKind::Other => write!(f, "other"),
        }
    }
}

/// The main error type for the Pulseboard core library.
#[derive(Debug, Error)]
pub enum PulseboardError {
    // ========================================================================
    // Transport Errors (E1001-E1099)
    // ========================================================================
    /// The request could not be completed
    #[error("[E1001] Metrics request failed: {0}")]
    RequestFailed(String),

    /// The request did not complete within the configured timeout
    #[error("[E1002] Metrics request timed out: {0}")]
    RequestTimeout(String),

    /// The metrics server could not be reached
    #[error("[E1003] Metrics server unavailable: {0}")]
    ServiceUnavailable(String),

    /// The server answered with a non-success status
    #[error("[E1004] Metrics endpoint '{url}' returned HTTP {status}")]
    HttpStatus { status: u16, url: String },

    // ========================================================================
    // Payload Errors (E2001-E2099)
    // ========================================================================
    /// The body is not valid JSON
    #[error("[E2001] Failed to parse metrics payload: {0}")]
    PayloadParse(String),

    /// The body was empty
    #[error("[E2002] Metrics payload is empty")]
    EmptyPayload,

    /// The JSON is valid but not a sample, a sample list or an envelope
    #[error("[E2003] Unexpected payload shape: {0}")]
    UnexpectedShape(String),

    // ========================================================================
    // Configuration Errors (E3001-E3099)
    // ========================================================================
    /// Invalid configuration value
    #[error("[E3001] Invalid configuration value for '{key}': {message}")]
    InvalidConfigValue { key: String, message: String },

    /// Required configuration is missing
    #[error("[E3002] Missing required configuration: {0}")]
    MissingConfig(String),

    /// Configuration source could not be parsed
    #[error("[E3003] Failed to parse configuration: {0}")]
    ConfigParseError(String),

    // ========================================================================
    // General Errors (E9001-E9099)
    // ========================================================================
    #[error("[E9001] IO error: {0}")]
    IoError(String),

    #[error("[E9002] Serialization error: {0}")]
    SerializationError(String),

    #[error("[E9003] Internal error: {0}")]
    Internal(String),
}

/// Result type alias using PulseboardError.
pub type PulseboardResult<T> = Result<T, PulseboardError>;

impl From<reqwest::Error> for PulseboardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PulseboardError::RequestTimeout(err.to_string())
        } else if err.is_connect() {
            PulseboardError::ServiceUnavailable(err.to_string())
        } else if err.is_status() {
            match err.status() {
                Some(status) => PulseboardError::HttpStatus {
                    status: status.as_u16(),
                    url: err
                        .url()
                        .map(|u| u.to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                },
                None => PulseboardError::RequestFailed(err.to_string()),
            }
        } else if err.is_decode() {
            PulseboardError::PayloadParse(err.to_string())
        } else {
            PulseboardError::RequestFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PulseboardError {
    fn from(err: serde_json::Error) -> Self {
        PulseboardError::PayloadParse(err.to_string())
    }
}

impl From<std::io::Error> for PulseboardError {
    fn from(err: std::io::Error) -> Self {
        PulseboardError::IoError(err.to_string())
    }
}

impl From<config::ConfigError> for PulseboardError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => PulseboardError::InvalidConfigValue {
                key,
                message: "Key not found".to_string(),
            },
            config::ConfigError::FileParse { uri, cause } => PulseboardError::ConfigParseError(
                format!("Failed to parse {}: {}", uri.unwrap_or_default(), cause),
            ),
            config::ConfigError::Type {
                origin,
                unexpected,
                expected,
                key,
            } => PulseboardError::InvalidConfigValue {
                key: key.unwrap_or_else(|| origin.map(|o| o.to_string()).unwrap_or_default()),
                message: format!("Expected {}, got {}", expected, unexpected),
            },
            _ => PulseboardError::ConfigParseError(err.to_string()),
        }
    }
}

impl PulseboardError {
    /// Shorthand for an invalid configuration value.
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        PulseboardError::InvalidConfigValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Wraps a failure to render a value for output (TOML, JSON lines).
    pub fn serialization(err: impl fmt::Display) -> Self {
        PulseboardError::SerializationError(err.to_string())
    }

    /// Returns true if the metrics request itself failed.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            PulseboardError::RequestFailed(_)
                | PulseboardError::RequestTimeout(_)
                | PulseboardError::ServiceUnavailable(_)
                | PulseboardError::HttpStatus { .. }
        )
    }

    /// Returns true if a response arrived but could not be turned into samples.
    pub fn is_payload_error(&self) -> bool {
        matches!(
            self,
            PulseboardError::PayloadParse(_)
                | PulseboardError::EmptyPayload
                | PulseboardError::UnexpectedShape(_)
        )
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PulseboardError::InvalidConfigValue { .. }
                | PulseboardError::MissingConfig(_)
                | PulseboardError::ConfigParseError(_)
        )
    }

    /// Classification used by the poller's diagnostic channel.
    pub fn kind(&self) -> PollErrorKind {
        if self.is_transport_error() {
            PollErrorKind::Transport
        } else if self.is_payload_error() {
            PollErrorKind::Parse
        } else {
            PollErrorKind::Other
        }
    }

    /// Returns true if the next tick has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            PulseboardError::RequestTimeout(_) | PulseboardError::ServiceUnavailable(_) => true,
            PulseboardError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns an error code suitable for logging or external reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            PulseboardError::RequestFailed(_) => "E1001",
            PulseboardError::RequestTimeout(_) => "E1002",
            PulseboardError::ServiceUnavailable(_) => "E1003",
            PulseboardError::HttpStatus { .. } => "E1004",
            PulseboardError::PayloadParse(_) => "E2001",
            PulseboardError::EmptyPayload => "E2002",
            PulseboardError::UnexpectedShape(_) => "E2003",
            PulseboardError::InvalidConfigValue { .. } => "E3001",
            PulseboardError::MissingConfig(_) => "E3002",
            PulseboardError::ConfigParseError(_) => "E3003",
            PulseboardError::IoError(_) => "E9001",
            PulseboardError::SerializationError(_) => "E9002",
            PulseboardError::Internal(_) => "E9003",
        }
    }

    /// Returns a short hint for the person running the dashboard.
    pub fn user_suggestion(&self) -> Option<&'static str> {
        match self {
            PulseboardError::ServiceUnavailable(_) => {
                Some("Check that the metrics server is running and poller.base_url is correct")
            }
            PulseboardError::RequestTimeout(_) => {
                Some("Increase poller.request_timeout_ms or check server load")
            }
            PulseboardError::HttpStatus { status: 404, .. } => {
                Some("Check poller.endpoint and poller.run_id")
            }
            PulseboardError::UnexpectedShape(_) | PulseboardError::PayloadParse(_) => {
                Some("Check that poller.endpoint matches the server's response format")
            }
            PulseboardError::MissingConfig(_) | PulseboardError::InvalidConfigValue { .. } => {
                Some("Check pulseboard.toml or PULSEBOARD_* environment variables")
            }
            _ => None,
        }
    }

    /// Log this error with appropriate severity level.
    pub fn log(&self) {
        let code = self.error_code();
        let suggestion = self.user_suggestion();

        if self.is_transient() || self.is_transport_error() || self.is_payload_error() {
            warn!(
                error_code = %code,
                kind = %self.kind(),
                suggestion = suggestion,
                "Poll cycle failed: {}",
                self
            );
        } else {
            error!(
                error_code = %code,
                suggestion = suggestion,
                "Error occurred: {}",
                self
            );
        }
    }
}

// ============================================================================
// User-friendly error formatting for CLI
// ============================================================================

/// Format an error for CLI display with its suggestion.
pub struct CliErrorDisplay<'a> {
    error: &'a PulseboardError,
    show_suggestion: bool,
}

impl<'a> CliErrorDisplay<'a> {
    pub fn new(error: &'a PulseboardError) -> Self {
        Self {
            error,
            show_suggestion: true,
        }
    }

    pub fn without_suggestion(mut self) -> Self {
        self.show_suggestion = false;
        self
    }
}

impl<'a> fmt::Display for CliErrorDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.error)?;

        if self.show_suggestion {
            if let Some(suggestion) = self.error.user_suggestion() {
                writeln!(f)?;
                writeln!(f, "  Suggestion: {}", suggestion)?;
            }
        }

        Ok(())
    }
}
