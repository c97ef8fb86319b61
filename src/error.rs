//! Error types for telemetry ingestion.
//!
//! Two families of errors live here:
//!
//! - [`TelemetryError`] covers setup-time failures: invalid configuration, a serial
//!   device that cannot be opened, a capture file that cannot be read. These are
//!   returned to the caller of [`Pipeline::start`](crate::Pipeline::start) and friends.
//! - [`FrameError`] describes why a single 18-byte candidate frame was rejected.
//!   The decoder never propagates it; a rejected frame is counted and dropped.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use voltwatch::TelemetryError;
//!
//! let error = TelemetryError::device_failed("/dev/ttyUSB0 busy");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Serial device error: {reason}")]
    Device {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Capture file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration ({field}): {details}")]
    Config { field: String, details: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("{feature} requires the `{cargo_feature}` cargo feature")]
    FeatureDisabled { feature: String, cargo_feature: String },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Device { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::File { .. } => false,
            TelemetryError::Config { .. } => false,
            TelemetryError::Parse { .. } => false,
            TelemetryError::FeatureDisabled { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Device { .. } => vec![
                "Check the serial cable and that the device is powered",
                "Verify the device path and permissions (dialout group on Linux)",
                "Make sure no other program holds the port open",
            ],
            TelemetryError::File { .. } => vec![
                "Check the capture file exists and is readable",
                "Verify the path passed on the command line",
            ],
            TelemetryError::Config { .. } => vec![
                "Keep trigger_level below channel_capacity",
                "Make channel_capacity at least one frame (18 bytes)",
                "Use non-zero intervals, timeouts and budgets",
            ],
            TelemetryError::Parse { .. } => vec![
                "Check the YAML syntax of the configuration file",
                "Compare field names against PipelineConfig",
            ],
            TelemetryError::Timeout { .. } => vec![
                "Increase the timeout",
                "Check the device is actually transmitting",
            ],
            TelemetryError::FeatureDisabled { .. } => {
                vec!["Rebuild with the named cargo feature enabled"]
            }
        }
    }

    /// Helper constructor for device errors.
    pub fn device_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Device { reason: reason.into(), source: None }
    }

    /// Helper constructor for device errors with source.
    pub fn device_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Device { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for capture file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }

    /// Helper constructor for configuration errors.
    pub fn invalid_config(field: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Config { field: field.into(), details: details.into() }
    }

    /// Helper constructor for features compiled out of this build.
    pub fn feature_disabled(feature: impl Into<String>, cargo_feature: impl Into<String>) -> Self {
        TelemetryError::FeatureDisabled {
            feature: feature.into(),
            cargo_feature: cargo_feature.into(),
        }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::Device { reason: err.to_string(), source: Some(Box::new(err)) }
    }
}

/// Reason a candidate frame was discarded by the decoder.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("bad frame header {found:#04x}")]
    BadHeader { found: u8 },

    #[error("unexpected device address {found:#04x}")]
    BadAddress { found: u8 },

    #[error("unexpected payload length {found:#04x}")]
    BadLength { found: u8 },

    #[error("checksum mismatch: frame carries {transmitted:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { transmitted: u8, computed: u8 },
}

impl FrameError {
    /// Structural (header/address/length/size) failures, as opposed to integrity failures.
    pub fn is_framing(&self) -> bool {
        !matches!(self, FrameError::ChecksumMismatch { .. })
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
            fn error_messages_carry_context(
                reason in ".*",
                field in "[a-z_]+",
                details in ".*",
                found in any::<u8>(),
                transmitted in any::<u8>(),
                computed in any::<u8>(),
            ) {
                let device = TelemetryError::device_failed(reason.clone());
                prop_assert!(device.to_string().contains(&reason));

                let config = TelemetryError::invalid_config(field.clone(), details.clone());
                let config_msg = config.to_string();
                prop_assert!(config_msg.contains(&field));
                prop_assert!(config_msg.contains(&details));

                let header = FrameError::BadHeader { found };
                let found_hex = format!("{:#04x}", found);
                prop_assert!(header.to_string().contains(&found_hex));

                let crc = FrameError::ChecksumMismatch { transmitted, computed };
                let crc_msg = crc.to_string();
                let transmitted_hex = format!("{:#04x}", transmitted);
                let computed_hex = format!("{:#04x}", computed);
                prop_assert!(crc_msg.contains(&transmitted_hex));
                prop_assert!(crc_msg.contains(&computed_hex));
                prop_assert!(!crc.is_framing());
                prop_assert!(header.is_framing());
            }

            #[test]
            fn io_errors_keep_their_source(message in ".+") {
                let io_err = std::io::Error::other(message.clone());
                let converted: TelemetryError = io_err.into();
                let source = std::error::Error::source(&converted).map(|s| s.to_string());
                prop_assert_eq!(source, Some(message));
                prop_assert!(converted.is_retryable());
            }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<TelemetryError>();
        assert_send_sync_static::<FrameError>();

        let error = TelemetryError::device_failed("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_methods_work() {
        let device = TelemetryError::device_failed("unplugged");
        let config = TelemetryError::invalid_config("trigger_level", "must be below capacity");
        let disabled = TelemetryError::feature_disabled("Serial monitoring", "serial");

        assert!(device.is_retryable());
        assert!(!config.is_retryable());
        assert!(!disabled.is_retryable());

        for error in [&device, &config, &disabled] {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn frame_error_messages_name_the_byte() {
        let err = FrameError::BadLength { found: 0x0D };
        assert_eq!(err.to_string(), "unexpected payload length 0x0d");
        assert!(err.is_framing());
    }
}
