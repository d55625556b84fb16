//! UseCase: プロジェクト状態の取得

use std::sync::Arc;

use kadai_shared::time::millis_to_rfc3339;

use crate::domain::{ProjectId, ProjectRepository};

use super::error::UseCaseError;

/// Read-only view returned by `get_project_status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStatusView {
    pub project_id: i64,
    pub title: String,
    pub status: String,
    /// RFC 3339, `None` until the first submission
    pub submission_date: Option<String>,
}

/// プロジェクト状態取得のユースケース（副作用なし）
pub struct GetProjectStatusUseCase {
    repository: Arc<dyn ProjectRepository>,
}

impl GetProjectStatusUseCase {
    pub fn new(repository: Arc<dyn ProjectRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self, project_id: i64) -> Result<ProjectStatusView, UseCaseError> {
        let project_id = ProjectId::new(project_id)?;
        let project = self
            .repository
            .find_project(project_id)
            .await?
            .ok_or(UseCaseError::ProjectNotFound(project_id.value()))?;

        Ok(ProjectStatusView {
            project_id: project.id.value(),
            title: project.title,
            status: project.status.as_str().to_string(),
            submission_date: project
                .submission_date
                .map(|at| millis_to_rfc3339(at.value())),
        })
    }
}
