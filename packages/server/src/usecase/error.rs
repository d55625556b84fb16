//! UseCase layer error definitions.
//!
//! Every variant becomes an `error` response on the offending connection.

use kadai_shared::policy::PolicyViolation;
use thiserror::Error;

use crate::domain::{RepositoryError, StorageError, ValueObjectError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UseCaseError {
    /// Missing, empty or out-of-range request field
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(i64),

    #[error("No file has been uploaded for project {0}")]
    NoFileUploaded(i64),

    /// Malformed base64 payload
    #[error("Invalid file data: {0}")]
    Decode(String),

    #[error("File I/O error: {0}")]
    Io(String),

    /// The project store rejected an update
    #[error("Database error: {0}")]
    Store(String),
}

impl From<ValueObjectError> for UseCaseError {
    fn from(err: ValueObjectError) -> Self {
        UseCaseError::Validation(err.to_string())
    }
}

impl From<PolicyViolation> for UseCaseError {
    fn from(err: PolicyViolation) -> Self {
        UseCaseError::Validation(err.to_string())
    }
}

impl From<RepositoryError> for UseCaseError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::ProjectNotFound(id) => UseCaseError::ProjectNotFound(id),
            RepositoryError::Unavailable(_) => UseCaseError::Store(err.to_string()),
        }
    }
}

impl From<StorageError> for UseCaseError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::OutsideRoot(_) => UseCaseError::Validation(err.to_string()),
            StorageError::NotFound(_)
            | StorageError::AlreadyExists(_)
            | StorageError::Io { .. } => UseCaseError::Io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_errors_map_to_not_found_or_store() {
        // テスト項目: Repository のエラーが NotFound と Store に振り分けられる
        // given (前提条件):
        let missing = RepositoryError::ProjectNotFound(9999);
        let down = RepositoryError::Unavailable("connection refused".to_string());

        // when (操作):
        let missing: UseCaseError = missing.into();
        let down: UseCaseError = down.into();

        // then (期待する結果):
        assert_eq!(missing, UseCaseError::ProjectNotFound(9999));
        assert_eq!(missing.to_string(), "Project not found: 9999");
        assert!(matches!(down, UseCaseError::Store(_)));
    }

    #[test]
    fn test_storage_outside_root_is_a_validation_error() {
        // テスト項目: ルート外パスのエラーは検証エラーとして扱われる
        // given (前提条件):
        let err = StorageError::OutsideRoot("../x".to_string());

        // when (操作):
        let mapped: UseCaseError = err.into();

        // then (期待する結果):
        assert!(matches!(mapped, UseCaseError::Validation(_)));
    }
}
