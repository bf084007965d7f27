//! Error handling for the data hub
//!
//! This module defines the hub's error taxonomy and a Result alias for use
//! throughout the crate.
//!
//! Value rejection inside the push pipeline (filter rejection, units
//! mismatch, suspended configuration) is never reported through these
//! types: it is a silent drop logged at debug level.

use crate::types::DataType;
use thiserror::Error;

/// Main error type for data hub operations
#[derive(Error, Debug)]
pub enum HubError {
    /// Bad path syntax or JSON extraction spec
    #[error("Malformed: {0}")]
    Malformed(String),

    /// No entry or value at the given path
    #[error("Not found: {0}")]
    NotFound(String),

    /// A proposed route would create a cycle
    #[error("Duplicate route: {0}")]
    Duplicate(String),

    /// Incompatible resource kind, or a different type/units already present
    #[error("Kind conflict: {0}")]
    KindConflict(String),

    /// Resource exists but has no current value yet
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Wrong data type requested for the resource's actual type
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: DataType, actual: DataType },

    /// Result does not fit in the destination
    #[error("Overflow: {0}")]
    Overflow(String),

    /// Backup file failed structural validation
    #[error("Corrupt backup: {0}")]
    Corrupt(String),

    /// Fatal API misuse by the caller that owns the resource.
    ///
    /// The service layer terminates the offending caller's session on this
    /// error; the hub itself keeps running.
    #[error("Client contract violation: {0}")]
    ClientFault(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<HubError>,
    },
}

impl HubError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        HubError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &HubError {
        match self {
            HubError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), HubError::NotFound(_))
    }

    pub fn is_client_fault(&self) -> bool {
        matches!(self.root(), HubError::ClientFault(_))
    }
}

/// Result type alias for data hub operations
pub type Result<T> = std::result::Result<T, HubError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| HubError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| HubError::Io(e).with_context(f()))
    }
}
