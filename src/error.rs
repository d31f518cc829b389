//! Error types for live timing.
//!
//! Every failure in the crate is a [`TimingError`]. Errors carry enough context
//! to be shown to a user as-is, and the connection lifecycle variants can be
//! turned into a [`Notice`](crate::Notice) with [`TimingError::title`] and the
//! `Display` text.
//!
//! ## Error Categories
//!
//! - **Address / policy errors**: the connect request was rejected before any
//!   socket was created (`InvalidAddress`, `MixedContentBlocked`)
//! - **Lifecycle errors**: the transport failed to open, timed out, or dropped
//!   (`ConnectFailed`, `ConnectTimeout`, `ConnectionLost`)
//! - **Frame errors**: a single frame could not be decoded (`Decode`); these are
//!   dropped locally and never surface to the user
//! - **Persistence errors**: some captured laps could not be handed off
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use lapclock::TimingError;
//!
//! let error = TimingError::connect_failed("connection refused");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::connection::Remediation;
use crate::recorder::FlushReport;

/// Result type alias for timing operations.
pub type Result<T, E = TimingError> = std::result::Result<T, E>;

/// Main error type for timing operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TimingError {
    #[error("Invalid bridge address '{input}': no host left after normalization")]
    InvalidAddress { input: String },

    #[error("Cannot open an insecure bridge stream from a secure page")]
    MixedContentBlocked { remediation: Remediation },

    #[error("Bridge did not answer within {duration:?}")]
    ConnectTimeout { duration: Duration },

    #[error("Could not connect to the bridge: {reason}")]
    ConnectFailed {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Lost connection to the bridge: {reason}")]
    ConnectionLost {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Frame decode error in {context}: {details}")]
    Decode { context: String, details: String },

    #[error("{} of {} laps could not be saved", .report.failed.len(), .report.total())]
    Persistence { report: FlushReport },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Timing session is no longer running")]
    SessionClosed,
}

impl TimingError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TimingError::ConnectTimeout { .. } => true,
            TimingError::ConnectFailed { .. } => true,
            TimingError::ConnectionLost { .. } => true,
            TimingError::Persistence { .. } => true,
            TimingError::Io { .. } => true,
            TimingError::InvalidAddress { .. } => false,
            TimingError::MixedContentBlocked { .. } => false,
            TimingError::Decode { .. } => false,
            TimingError::Config { .. } => false,
            TimingError::SessionClosed => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TimingError::InvalidAddress { .. } => vec![
                "Enter the IP address shown by the bridge",
                "Scan the QR code printed by the bridge",
            ],
            TimingError::MixedContentBlocked { .. } => vec![
                "Open the app over http:// instead of https://",
                "Use the switch action offered with this message",
            ],
            TimingError::ConnectTimeout { .. } => vec![
                "Check that the bridge is running",
                "Verify the IP address is correct",
                "Make sure both devices are on the same network",
            ],
            TimingError::ConnectFailed { .. } => vec![
                "Check that the bridge is running",
                "Verify the IP address is correct",
                "Allow the bridge port through the firewall",
            ],
            TimingError::ConnectionLost { .. } => vec![
                "Check that the simulator and bridge are still running",
                "Reconnect to resume live timing",
                "The stopwatch keeps running locally in the meantime",
            ],
            TimingError::Decode { .. } => vec![
                "Update the bridge to a compatible version",
                "Check the bridge output format",
            ],
            TimingError::Persistence { .. } => vec![
                "Check the lap storage is reachable",
                "Save again; unsaved laps were kept",
            ],
            TimingError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Remove the offending key to use its default",
            ],
            TimingError::Io { .. } => vec![
                "Check the file exists and is readable",
                "Check file permissions",
            ],
            TimingError::SessionClosed => vec!["Start a new timing session"],
        }
    }

    /// Short headline for user-facing messages.
    pub fn title(&self) -> &'static str {
        match self {
            TimingError::InvalidAddress { .. } => "Invalid IP",
            TimingError::MixedContentBlocked { .. } => "Security error (mixed content)",
            TimingError::ConnectTimeout { .. } => "Connection timed out",
            TimingError::ConnectFailed { .. } => "Could not connect",
            TimingError::ConnectionLost { .. } => "Disconnected from bridge",
            TimingError::Decode { .. } => "Bad telemetry frame",
            TimingError::Persistence { .. } => "Session partially saved",
            TimingError::Config { .. } => "Configuration error",
            TimingError::Io { .. } => "File error",
            TimingError::SessionClosed => "Session closed",
        }
    }

    /// Action the user can take to fix this error, when one exists.
    pub fn remediation(&self) -> Option<&Remediation> {
        match self {
            TimingError::MixedContentBlocked { remediation } => Some(remediation),
            _ => None,
        }
    }

    /// Helper constructor for invalid address errors.
    pub fn invalid_address(input: impl Into<String>) -> Self {
        TimingError::InvalidAddress { input: input.into() }
    }

    /// Helper constructor for connect failures.
    pub fn connect_failed(reason: impl Into<String>) -> Self {
        TimingError::ConnectFailed { reason: reason.into(), source: None }
    }

    /// Helper constructor for connect failures with source.
    pub fn connect_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TimingError::ConnectFailed { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for a dropped connection.
    pub fn connection_lost(reason: impl Into<String>) -> Self {
        TimingError::ConnectionLost { reason: reason.into(), source: None }
    }

    /// Helper constructor for a dropped connection with source.
    pub fn connection_lost_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TimingError::ConnectionLost { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for frame decode errors.
    pub fn decode(context: impl Into<String>, details: impl Into<String>) -> Self {
        TimingError::Decode { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        TimingError::Config { details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TimingError::Io { path: path.into(), source }
    }
}

impl From<serde_json::Error> for TimingError {
    fn from(err: serde_json::Error) -> Self {
        TimingError::Decode { context: "frame".to_string(), details: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            input in ".*",
            reason in ".*",
            details in ".*",
            timeout_ms in 1u64..60000u64
          ) {
            let address_msg = TimingError::invalid_address(input.clone()).to_string();
            prop_assert!(address_msg.contains(&input));

            let failed_msg = TimingError::connect_failed(reason.clone()).to_string();
            prop_assert!(failed_msg.contains(&reason));

            let lost_msg = TimingError::connection_lost(reason.clone()).to_string();
            prop_assert!(lost_msg.contains(&reason));

            let decode_msg = TimingError::decode("frame", details.clone()).to_string();
            prop_assert!(decode_msg.contains(&details));

            let timeout = TimingError::ConnectTimeout { duration: Duration::from_millis(timeout_ms) };
            prop_assert!(!timeout.to_string().is_empty());
          }

          #[test]
          fn source_chain_is_preserved(base_message in ".*") {
            let io = std::io::Error::other(base_message.clone());
            let error = TimingError::connection_lost_with_source("socket reset", Box::new(io));

            let source = std::error::Error::source(&error).expect("source should be kept");
            prop_assert_eq!(source.to_string(), base_message);
          }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<TimingError>();

        let error = TimingError::connect_failed("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn lifecycle_errors_are_retryable_policy_errors_are_not() {
        assert!(TimingError::ConnectTimeout { duration: Duration::from_secs(5) }.is_retryable());
        assert!(TimingError::connect_failed("refused").is_retryable());
        assert!(TimingError::connection_lost("closed").is_retryable());

        assert!(!TimingError::invalid_address("").is_retryable());
        assert!(!TimingError::decode("frame", "eof").is_retryable());
        assert!(!TimingError::SessionClosed.is_retryable());
    }

    #[test]
    fn recovery_suggestions_are_actionable() {
        let errors = [
            TimingError::invalid_address(""),
            TimingError::ConnectTimeout { duration: Duration::from_secs(5) },
            TimingError::connect_failed("refused"),
            TimingError::connection_lost("closed"),
            TimingError::config("bad port"),
        ];

        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            for suggestion in suggestions {
                assert!(suggestion.len() > 5);
            }
            assert!(!error.title().is_empty());
        }
    }

    #[test]
    fn mixed_content_exposes_remediation() {
        let remediation = Remediation::switch_to_insecure(None);
        let error = TimingError::MixedContentBlocked { remediation };
        assert!(error.remediation().is_some());
        assert!(TimingError::connect_failed("x").remediation().is_none());
    }

    #[test]
    fn json_errors_convert_to_decode() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let converted: TimingError = err.into();
        assert!(matches!(converted, TimingError::Decode { .. }));
    }
}
