//! InMemory Project Repository 実装
//!
//! ドメイン層が定義する ProjectRepository trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。
//!
//! 本来のプロジェクト情報は外部のリレーショナル DB が所有しています。
//! この実装はサーバー単体での起動とテストのための代替であり、
//! JSON のシードファイルから初期データを読み込めます。

use std::{collections::HashMap, path::Path, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    domain::{Project, ProjectId, ProjectRepository, RepositoryError},
    infrastructure::dto::{ConversionError, ProjectRecord},
};

/// Errors raised while loading a seed file
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ConversionError),
}

/// インメモリ Project Repository 実装
pub struct InMemoryProjectRepository {
    /// Project ドメインモデル（key: project id）
    projects: Arc<Mutex<HashMap<ProjectId, Project>>>,
}

impl InMemoryProjectRepository {
    /// 新しい InMemoryProjectRepository を作成
    pub fn new(projects: Vec<Project>) -> Self {
        let projects = projects.into_iter().map(|p| (p.id, p)).collect();
        Self {
            projects: Arc::new(Mutex::new(projects)),
        }
    }

    /// Load projects from a JSON array of [`ProjectRecord`]s.
    pub fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        let records: Vec<ProjectRecord> = serde_json::from_str(&raw)?;
        let projects = records
            .into_iter()
            .map(Project::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(projects))
    }

    /// Insert or replace a project.
    pub async fn insert(&self, project: Project) {
        let mut projects = self.projects.lock().await;
        projects.insert(project.id, project);
    }

    pub async fn count_projects(&self) -> usize {
        let projects = self.projects.lock().await;
        projects.len()
    }
}

impl Default for InMemoryProjectRepository {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn find_project(&self, id: ProjectId) -> Result<Option<Project>, RepositoryError> {
        let projects = self.projects.lock().await;
        Ok(projects.get(&id).cloned())
    }

    async fn append_file(&self, id: ProjectId, file_path: String) -> Result<(), RepositoryError> {
        let mut projects = self.projects.lock().await;
        let project = projects
            .get_mut(&id)
            .ok_or(RepositoryError::ProjectNotFound(id.value()))?;
        project.file_paths.push(file_path);
        Ok(())
    }

    async fn remove_file(&self, id: ProjectId, file_path: &str) -> Result<(), RepositoryError> {
        let mut projects = self.projects.lock().await;
        let project = projects
            .get_mut(&id)
            .ok_or(RepositoryError::ProjectNotFound(id.value()))?;
        if let Some(index) = project.file_paths.iter().rposition(|path| path == file_path) {
            project.file_paths.remove(index);
        }
        Ok(())
    }

    async fn update_project(&self, project: Project) -> Result<(), RepositoryError> {
        let mut projects = self.projects.lock().await;
        match projects.get_mut(&project.id) {
            Some(existing) => {
                *existing = project;
                Ok(())
            }
            None => Err(RepositoryError::ProjectNotFound(project.id.value())),
        }
    }
}
