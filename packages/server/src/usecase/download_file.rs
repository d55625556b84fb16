//! UseCase: ファイルダウンロード処理
//!
//! プロジェクトに最後に追加されたファイルを読み出し、base64 で返します。

use std::{path::Path, sync::Arc};

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::domain::{FileStorage, ProjectId, ProjectRepository};

use super::error::UseCaseError;

/// Latest file of a project, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub file_name: String,
    /// Base64-encoded content
    pub file_data: String,
    pub file_size: u64,
}

/// ファイルダウンロードのユースケース
pub struct DownloadFileUseCase {
    repository: Arc<dyn ProjectRepository>,
    storage: Arc<dyn FileStorage>,
}

impl DownloadFileUseCase {
    pub fn new(repository: Arc<dyn ProjectRepository>, storage: Arc<dyn FileStorage>) -> Self {
        Self {
            repository,
            storage,
        }
    }

    /// ダウンロードを実行
    ///
    /// # Returns
    ///
    /// * `Ok(DownloadedFile)` - 最新ファイルの内容
    /// * `Err(UseCaseError)` - プロジェクトが無い、ファイルが無い、読み出し失敗
    pub async fn execute(&self, project_id: i64) -> Result<DownloadedFile, UseCaseError> {
        let project_id = ProjectId::new(project_id)?;

        let project = self
            .repository
            .find_project(project_id)
            .await?
            .ok_or(UseCaseError::ProjectNotFound(project_id.value()))?;

        let path = project
            .latest_file()
            .ok_or(UseCaseError::NoFileUploaded(project_id.value()))?;

        // ルート外のパスは storage が拒否する
        let bytes = self.storage.load(path).await?;

        let file_name = Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());

        tracing::debug!(
            "Read '{}' ({} bytes) for project {}",
            path,
            bytes.len(),
            project_id
        );
        Ok(DownloadedFile {
            file_name,
            file_size: bytes.len() as u64,
            file_data: STANDARD.encode(&bytes),
        })
    }
}
