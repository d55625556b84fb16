//! Repository trait 定義
//!
//! プロジェクト情報は外部のデータストアが所有しています。ドメイン層は
//! 必要な操作だけをこの trait として定義し、具体的な実装は
//! Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;

use super::{Project, ProjectId, RepositoryError};

/// Project Repository trait
///
/// The operations the transfer service consumes from the external store:
/// find, append a file reference (and withdraw it again when the rest of an
/// upload fails), and update the project record.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Find a project by id. `Ok(None)` when it does not exist.
    async fn find_project(&self, id: ProjectId) -> Result<Option<Project>, RepositoryError>;

    /// Append a file path to the project's ordered file list.
    async fn append_file(&self, id: ProjectId, file_path: String) -> Result<(), RepositoryError>;

    /// Remove the most recent occurrence of `file_path` from the project's
    /// file list. Removing a path that is not listed is a no-op.
    async fn remove_file(&self, id: ProjectId, file_path: &str) -> Result<(), RepositoryError>;

    /// Overwrite the project record (title, description, dates, status,
    /// submission date, assignee).
    async fn update_project(&self, project: Project) -> Result<(), RepositoryError>;
}
