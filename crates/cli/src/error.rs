//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or failed validation
    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    /// Input file could not be opened or read
    #[error("Failed to read input '{path}': {source}")]
    Input {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Relay component failed to start
    #[error("Failed to start {component}: {message}")]
    Startup { component: String, message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    pub fn input(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Input {
            path: path.into(),
            source,
        }
    }

    pub fn startup(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Startup {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
