//! Common error types for vip-manager components.

use std::fmt;

/// A specialized Result type for vip-manager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for vip-manager operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required service annotation is absent or empty. Fatal for the
    /// tick that observed it, retried on the next one.
    #[error("service annotation {0} is not set")]
    MissingAnnotation(String),

    /// The discovery backend could not be reached or answered badly.
    #[error("discovery backend error: {0}")]
    Backend(String),

    #[error("template error: {0}")]
    Template(String),

    /// A host command exited non-zero; carries its combined output.
    #[error("command error: {0}")]
    Command(String),

    /// Daemon process lifecycle violation or signaling failure.
    #[error("process error: {0}")]
    Process(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new missing-annotation error naming the annotation key.
    pub fn missing_annotation(key: impl fmt::Display) -> Self {
        Error::MissingAnnotation(key.to_string())
    }

    /// Create a new discovery backend error.
    pub fn backend(msg: impl fmt::Display) -> Self {
        Error::Backend(msg.to_string())
    }

    /// Create a new template error.
    pub fn template(msg: impl fmt::Display) -> Self {
        Error::Template(msg.to_string())
    }

    /// Create a new command error.
    pub fn command(msg: impl fmt::Display) -> Self {
        Error::Command(msg.to_string())
    }

    /// Create a new process error.
    pub fn process(msg: impl fmt::Display) -> Self {
        Error::Process(msg.to_string())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl fmt::Display) -> Self {
        Error::Config(msg.to_string())
    }

    /// Create a new other error.
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }
}
