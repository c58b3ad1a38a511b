//! Error types for dbtest.
//!
//! Defines the main error enum used throughout the application.

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed source error carried by backend failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Main error type for dbtest operations.
#[derive(Error, Debug)]
pub enum DbTestError {
    /// Invalid or missing command-line input. Fatal before any test runs.
    #[error("Argument error: {0}")]
    Argument(String),

    /// Invalid configuration file contents.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backend failed to open a connection.
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Command creation or execution failed.
    #[error("Command error: {message}")]
    Command {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Row and column counts disagree when building a report.
    #[error("Format error: {0}")]
    Format(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DbTestError {
    /// Creates an argument error with the given message.
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
            source: None,
        }
    }

    /// Creates a connection error wrapping a backend error.
    pub fn connection_with(msg: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Connection {
            message: msg.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a command error with the given message.
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command {
            message: msg.into(),
            source: None,
        }
    }

    /// Creates a command error wrapping a backend error.
    pub fn command_with(msg: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Command {
            message: msg.into(),
            source: Some(source.into()),
        }
    }

    /// Creates a format error with the given message.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Argument(_) => "Argument Error",
            Self::Config(_) => "Configuration Error",
            Self::Connection { .. } => "Connection Error",
            Self::Command { .. } => "Command Error",
            Self::Format(_) => "Format Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns true for errors that abort the process before any test runs.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Argument(_) | Self::Config(_))
    }

    /// Returns the message without its category prefix for fatal errors, or
    /// the full display text otherwise.
    pub fn reason(&self) -> String {
        match self {
            Self::Argument(msg) | Self::Config(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// Returns the display text of every underlying cause, outermost first.
    pub fn trace(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = self.source();
        while let Some(cause) = current {
            lines.push(format!("   caused by: {cause}"));
            current = cause.source();
        }
        lines
    }
}

/// Result type alias using DbTestError.
pub type Result<T> = std::result::Result<T, DbTestError>;
