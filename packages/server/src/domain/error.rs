//! Domain layer error definitions.

use thiserror::Error;

/// Errors related to Value Objects validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    /// ProjectId must be a positive integer
    #[error("projectId must be a positive integer (got {0})")]
    ProjectIdNotPositive(i64),

    /// UserId validation error
    #[error("userId cannot be empty")]
    UserIdEmpty,

    /// UserId too long error
    #[error("userId cannot exceed {max} characters (got {actual})")]
    UserIdTooLong { max: usize, actual: usize },

    /// ProjectStatus validation error
    #[error("status cannot be empty")]
    ProjectStatusEmpty,

    /// FileName validation error
    #[error("fileName cannot be empty")]
    FileNameEmpty,
}

/// Errors reported by the project store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Project not found: {0}")]
    ProjectNotFound(i64),

    #[error("Project store unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by the upload file storage
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The resolved path is not contained in the upload root
    #[error("Path '{0}' is outside the upload root")]
    OutsideRoot(String),

    #[error("File not found: {0}")]
    NotFound(String),

    /// A file with the generated name already exists
    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("I/O error on '{path}': {message}")]
    Io { path: String, message: String },
}

/// Errors related to pushing messages to connected clients
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessagePushError {
    #[error("Failed to push message: {0}")]
    PushFailed(String),
}
