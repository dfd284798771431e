//! Error types for nl2sql-core.

use thiserror::Error;

/// Result type alias using nl2sql-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a query workflow.
///
/// Validation failures are deliberately NOT represented here: a rejected
/// SQL candidate is a normal state transition (retry or formatted failure),
/// never a hard fault.
#[derive(Error, Debug)]
pub enum Error {
    /// The query generator collaborator failed
    #[error("SQL generation error: {0}")]
    Generation(String),

    /// The execution agent collaborator failed unrecoverably
    #[error("SQL execution error: {0}")]
    Execution(String),

    /// LLM transport/API error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a generation error.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create an execution error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Create an LLM error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
