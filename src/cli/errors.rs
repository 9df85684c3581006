//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero status.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::engine::RetroError;
use crate::fingerprint::FingerprintError;
use crate::world::SnapshotError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdout)
    IoError,
    /// A snapshot file is malformed
    InvalidSnapshot,
    /// The fingerprint library could not be loaded
    FingerprintError,
    /// The request did not finish
    RequestFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "RETRO_CLI_CONFIG_ERROR",
            Self::IoError => "RETRO_CLI_IO_ERROR",
            Self::InvalidSnapshot => "RETRO_CLI_INVALID_SNAPSHOT",
            Self::FingerprintError => "RETRO_CLI_FINGERPRINT_ERROR",
            Self::RequestFailed => "RETRO_CLI_REQUEST_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn invalid_snapshot(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidSnapshot, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<SnapshotError> for CliError {
    fn from(e: SnapshotError) -> Self {
        Self::invalid_snapshot(e.to_string())
    }
}

impl From<FingerprintError> for CliError {
    fn from(e: FingerprintError) -> Self {
        Self::new(CliErrorCode::FingerprintError, e.to_string())
    }
}

impl From<RetroError> for CliError {
    fn from(e: RetroError) -> Self {
        match e {
            RetroError::MalformedSnapshot(e) => e.into(),
            RetroError::Config(e) => e.into(),
            RetroError::Fingerprint(e) => e.into(),
            RetroError::Cancelled(e) => Self::new(CliErrorCode::RequestFailed, e.to_string()),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
