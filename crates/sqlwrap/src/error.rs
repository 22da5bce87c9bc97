//! Error types for sqlwrap

use crate::connection::Connection;
use std::fmt;
use thiserror::Error;

/// Result type alias for sqlwrap operations
pub type WrapResult<T> = Result<T, WrapError>;

/// Error types for interception, drivers and decorators
#[derive(Debug, Error)]
pub enum WrapError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error reported by tokio-postgres
    #[cfg(feature = "postgres")]
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Error reported by an underlying driver that is not tokio-postgres
    #[error("Database error: {0}")]
    Database(String),

    /// No registered driver claims the URL
    #[error("No suitable driver found for {0}")]
    NoDriver(String),

    /// Operation attempted on a closed connection
    #[error("Connection is closed")]
    Closed,

    /// Invalid transaction demarcation (commit in auto-commit mode, nested begin, ...)
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// The connection does not implement the requested operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A prepared statement handle that this connection did not hand out
    #[error("Unknown prepared statement #{0}")]
    UnknownStatement(u64),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A decorator or listener factory failed
    #[error("Failed to instantiate '{type_name}': {message}")]
    Instantiation { type_name: String, message: String },

    /// The wrapping driver is already installed process-wide
    #[error("Driver is already installed")]
    AlreadyInstalled,

    /// The wrapping driver is not installed process-wide
    #[error("Driver is not installed")]
    NotInstalled,

    /// Unknown driver registration id
    #[error("Driver #{0} is not registered")]
    UnknownDriver(u64),

    /// I/O error while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl WrapError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an instantiation error for a named decorator or listener type
    pub fn instantiation(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Instantiation {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Create a driver-reported database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create an unsupported-operation error
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported(operation.into())
    }

    /// Check if no driver claimed the URL
    pub fn is_no_driver(&self) -> bool {
        matches!(self, Self::NoDriver(_))
    }

    /// Check if the connection was already closed
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Failure of a decorator factory.
///
/// The factory consumed the delegate connection, so it hands it back alongside
/// the cause. Callers fall back to the undecorated connection.
pub struct DecoratorError {
    /// The delegate connection the factory was given.
    pub connection: Box<dyn Connection>,
    /// Why construction failed.
    pub error: WrapError,
}

impl DecoratorError {
    pub fn new(connection: Box<dyn Connection>, error: WrapError) -> Self {
        Self { connection, error }
    }

    /// Split into the returned connection and the cause.
    pub fn into_parts(self) -> (Box<dyn Connection>, WrapError) {
        (self.connection, self.error)
    }
}

impl fmt::Debug for DecoratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for DecoratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decorator construction failed: {}", self.error)
    }
}

impl std::error::Error for DecoratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
