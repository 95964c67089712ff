//! Error types for the modkit build and deploy engine.
//!
//! Only unrecoverable conditions travel through [`ModkitError`]. Per-file
//! validation problems are reported as [`crate::build::BuildIssue`] values and
//! never abort a run.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for modkit.
#[derive(Debug, Error)]
pub enum ModkitError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Fatal build errors.
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Platform API errors.
    #[error("Platform API error: {0}")]
    Platform(#[from] PlatformError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Execution errors.
    #[error("Execution error: {0}")]
    Execute(#[from] ExecuteError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    Validation {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Fatal build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The module root directory does not exist.
    #[error("Module root not found: {path}")]
    ModuleRootNotFound {
        /// Path that was searched.
        path: PathBuf,
    },

    /// A declaration or output file could not be read or written.
    #[error("Failed to access {path}: {message}")]
    FileAccess {
        /// File path.
        path: PathBuf,
        /// Underlying error message.
        message: String,
    },

    /// The build directory is missing or its manifest is unreadable.
    #[error("Invalid build directory {path}: {message}")]
    InvalidBuildDir {
        /// Build directory path.
        path: PathBuf,
        /// What is wrong with it.
        message: String,
    },
}

/// Platform API errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Authentication failed or permission was denied.
    #[error("Platform authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// The API rejected the request.
    #[error("Platform API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limited.
    #[error("Platform API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error communicating with the platform: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from platform API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Remote state for a kind could not be read.
    #[error("Failed to read remote {kind} resources: {message}")]
    RemoteReadFailed {
        /// Resource kind.
        kind: String,
        /// Underlying error.
        message: String,
    },

    /// A remote record could not be interpreted as its kind.
    #[error("Remote {kind} record could not be normalized: {message}")]
    InvalidRemoteRecord {
        /// Resource kind.
        kind: String,
        /// Parse failure.
        message: String,
    },
}

/// Execution errors.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Execution was cancelled between batches.
    #[error("Execution cancelled: {reason}")]
    Cancelled {
        /// Reason for cancellation.
        reason: String,
    },
}

/// Result type alias for modkit operations.
pub type Result<T> = std::result::Result<T, ModkitError>;

impl ModkitError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is transient and the call may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Platform(PlatformError::RateLimited { .. } | PlatformError::NetworkError { .. }) => {
                true
            }
            Self::Platform(PlatformError::ApiRequestFailed { status, .. }) => *status >= 500,
            _ => false,
        }
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Platform(PlatformError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl BuildError {
    /// Creates a file access error.
    #[must_use]
    pub fn file_access(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl PlatformError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}
