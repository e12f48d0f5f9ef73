//! Unified error handling for the roadview library.
//!
//! Ordinary no-match conditions (unmatched path points, empty indexes,
//! malformed filenames) are not errors; they surface as absences or skip
//! tallies. This type covers the collaborator boundary: routing calls,
//! video synthesis, configuration, and filesystem access.

use std::fmt;

/// Unified error type for roadview operations.
#[derive(Debug, Clone)]
pub enum RoadviewError {
    /// Routing service call failed
    Route {
        message: String,
        status_code: Option<u16>,
    },
    /// Video synthesis failed (generation, download, or response shape)
    Synthesis { message: String },
    /// Clip merge failed (probe, trim, or concat step)
    Merge { message: String },
    /// Missing or invalid configuration
    Config { message: String },
    /// Filesystem error outside the degraded-mode index path
    Io { message: String },
    /// Generic internal error
    Internal { message: String },
}

impl fmt::Display for RoadviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoadviewError::Route {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "Routing error ({}): {}", code, message)
                } else {
                    write!(f, "Routing error: {}", message)
                }
            }
            RoadviewError::Synthesis { message } => {
                write!(f, "Synthesis error: {}", message)
            }
            RoadviewError::Merge { message } => {
                write!(f, "Merge error: {}", message)
            }
            RoadviewError::Config { message } => {
                write!(f, "Configuration error: {}", message)
            }
            RoadviewError::Io { message } => {
                write!(f, "IO error: {}", message)
            }
            RoadviewError::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for RoadviewError {}

impl From<std::io::Error> for RoadviewError {
    fn from(err: std::io::Error) -> Self {
        RoadviewError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type alias for roadview operations.
pub type Result<T> = std::result::Result<T, RoadviewError>;
