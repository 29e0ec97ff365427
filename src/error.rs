//! Error types for the attendance store and its operations.

use thiserror::Error;

/// Result type for attendance operations.
pub type Result<T> = std::result::Result<T, AttendanceError>;

/// Faults raised by the attendance store.
///
/// Expected outcomes such as a duplicate student or an empty roster are not errors; they are
/// reported through the return values of the operations.
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// A query or write failed. The enclosing transaction has been rolled back.
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// The store could not be opened.
    #[error("Could not open attendance store: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Roster file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Class {0} does not exist")]
    ClassNotFound(i32),

    #[error("No class named '{0}'")]
    UnknownClassName(String),

    #[error("Student name must not be empty")]
    EmptyName,

    /// The absent rate must be a fraction in `[0, 1]`.
    #[error("Absent rate must be between 0 and 1, got {0}")]
    InvalidRate(f64),

    #[error("Unrecognized attendance status '{0}'")]
    UnknownStatus(String),
}
