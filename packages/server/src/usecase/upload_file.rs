//! UseCase: ファイルアップロード処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - UploadFileUseCase::execute() メソッド
//! - 入力検証 → プロジェクト確認 → base64 復号 → 保存 → ストア更新 の順序
//!
//! ### なぜこのテストが必要か
//! - ファイル書き込みとストア更新の間にトランザクションはない
//! - ストア更新に失敗した場合、書き込んだファイルを削除しなければならない
//! - 失敗時に副作用（ファイル・ストア更新）が残らないことを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：既存プロジェクトへのアップロード
//! - 異常系：存在しないプロジェクト、不正な base64、空のフィールド
//! - 異常系：ストア更新の失敗（ロールバック）

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use kadai_shared::{
    policy::UploadPolicy,
    protocol::{Message, NotificationKind},
    time::Clock,
};

use crate::domain::{
    FileName, FileStorage, MessagePusher, ProjectId, ProjectRepository, StorageError, StoredFile,
    Timestamp,
};

use super::{error::UseCaseError, project_lock::ProjectLocks};

/// How many consecutive millisecond suffixes are tried when a generated
/// name already exists.
const MAX_NAME_ATTEMPTS: i64 = 16;

/// Fields of an `upload_file` request
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    /// Base64-encoded file content
    pub file_data: String,
    pub project_id: i64,
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub project_id: ProjectId,
    pub project_title: String,
    pub file: StoredFile,
}

/// Server-generated name: `project_<id>_<epoch-millis><ext>`.
pub fn stored_file_name(project_id: ProjectId, millis: i64, extension: Option<&str>) -> String {
    format!(
        "project_{}_{}{}",
        project_id.value(),
        millis,
        extension.unwrap_or_default()
    )
}

/// ファイルアップロードのユースケース
pub struct UploadFileUseCase {
    /// Repository（プロジェクトストアの抽象化）
    repository: Arc<dyn ProjectRepository>,
    /// FileStorage（アップロード先の抽象化）
    storage: Arc<dyn FileStorage>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    locks: Arc<ProjectLocks>,
    clock: Arc<dyn Clock>,
    /// Server-side policy, unrestricted unless configured
    policy: UploadPolicy,
}

impl UploadFileUseCase {
    /// 新しい UploadFileUseCase を作成
    pub fn new(
        repository: Arc<dyn ProjectRepository>,
        storage: Arc<dyn FileStorage>,
        message_pusher: Arc<dyn MessagePusher>,
        locks: Arc<ProjectLocks>,
        clock: Arc<dyn Clock>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            repository,
            storage,
            message_pusher,
            locks,
            clock,
            policy,
        }
    }

    /// アップロードを実行
    ///
    /// # Returns
    ///
    /// * `Ok(UploadOutcome)` - 保存とストア更新が両方成功
    /// * `Err(UseCaseError)` - 失敗（ファイルは残らない）
    pub async fn execute(&self, request: UploadRequest) -> Result<UploadOutcome, UseCaseError> {
        // 1. 入力検証
        let file_name = FileName::new(request.file_name)?;
        if request.file_data.is_empty() {
            return Err(UseCaseError::Validation(
                "fileData cannot be empty".to_string(),
            ));
        }
        let project_id = ProjectId::new(request.project_id)?;

        // 2. プロジェクトの存在確認
        let project = self
            .repository
            .find_project(project_id)
            .await?
            .ok_or(UseCaseError::ProjectNotFound(project_id.value()))?;

        // 3. base64 復号
        let bytes = STANDARD
            .decode(request.file_data.as_bytes())
            .map_err(|e| UseCaseError::Decode(e.to_string()))?;

        // 4. サーバー側ポリシー
        self.policy.check(file_name.as_str(), bytes.len() as u64)?;

        // 5-7. 一意なファイル名で保存（ルート外のパスは storage が拒否する）
        let file = self
            .store_unique(project_id, file_name.extension(), &bytes)
            .await?;

        // 8-9. ストア更新、失敗したらファイルを削除
        if let Err(e) = self.record_submission(project_id, &file).await {
            tracing::warn!(
                "Store update failed for project {}, rolling back '{}': {}",
                project_id,
                file.path,
                e
            );
            self.rollback(&file).await;
            return Err(e);
        }

        tracing::info!(
            "Stored '{}' ({} bytes) for project {}",
            file.path,
            file.size,
            project_id
        );
        Ok(UploadOutcome {
            project_id,
            project_title: project.title,
            file,
        })
    }

    /// 新しい提出を全クライアントにブロードキャスト
    ///
    /// Called by the connection handler after the upload response has been
    /// queued, so the uploader sees its response first.
    pub async fn broadcast_submitted(&self, outcome: &UploadOutcome) -> usize {
        let message = Message::notification(
            NotificationKind::ProjectSubmitted,
            format!(
                "Project '{}' received a new submission: {}",
                outcome.project_title, outcome.file.file_name
            ),
            Some(outcome.project_id.value()),
        );
        self.message_pusher.broadcast(message).await
    }

    async fn store_unique(
        &self,
        project_id: ProjectId,
        extension: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredFile, UseCaseError> {
        let base = self.clock.now_millis();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = stored_file_name(project_id, base + attempt, extension);
            match self.storage.store(&name, bytes).await {
                Ok(file) => return Ok(file),
                Err(StorageError::AlreadyExists(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(UseCaseError::Io(format!(
            "Could not allocate a unique file name for project {}",
            project_id
        )))
    }

    /// Append the file reference and stamp the submission date.
    ///
    /// If stamping fails after the append went through, the reference is
    /// withdrawn so the project's latest file stays the previous one.
    async fn record_submission(
        &self,
        project_id: ProjectId,
        file: &StoredFile,
    ) -> Result<(), UseCaseError> {
        let _guard = self.locks.lock(project_id).await;

        self.repository
            .append_file(project_id, file.path.clone())
            .await?;
        if let Err(e) = self.stamp_submission(project_id).await {
            if let Err(undo) = self.repository.remove_file(project_id, &file.path).await {
                tracing::error!(
                    "Could not withdraw '{}' from project {}: {}",
                    file.path,
                    project_id,
                    undo
                );
            }
            return Err(e);
        }
        Ok(())
    }

    async fn stamp_submission(&self, project_id: ProjectId) -> Result<(), UseCaseError> {
        let mut project = self
            .repository
            .find_project(project_id)
            .await?
            .ok_or(UseCaseError::ProjectNotFound(project_id.value()))?;
        project.record_submission(Timestamp::new(self.clock.now_millis()));
        self.repository.update_project(project).await?;
        Ok(())
    }

    async fn rollback(&self, file: &StoredFile) {
        if let Err(e) = self.storage.remove(&file.path).await {
            // クラッシュ時と同様に孤立ファイルが残る
            tracing::error!("Rollback failed, orphaned file '{}': {}", file.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            Project, ProjectStatus, RepositoryError, repository::MockProjectRepository,
            storage::MockFileStorage,
        },
        infrastructure::{
            message_pusher::ConnectionRegistry, repository::InMemoryProjectRepository,
            storage::LocalFileStorage,
        },
    };
    use crate::usecase::DownloadFileUseCase;
    use futures_util::future::join_all;
    use kadai_shared::time::{FixedClock, SystemClock};
    use std::{
        path::Path,
        sync::atomic::{AtomicBool, Ordering},
    };

    const NOW: i64 = 1_700_000_000_000;

    fn project(id: i64) -> Project {
        Project::new(
            ProjectId::new(id).unwrap(),
            "Autonomous Robot",
            ProjectStatus::new("in_progress".to_string()).unwrap(),
        )
    }

    fn request(project_id: i64, data: &[u8]) -> UploadRequest {
        UploadRequest {
            file_name: "report.pdf".to_string(),
            file_data: STANDARD.encode(data),
            project_id,
        }
    }

    fn usecase(
        repository: Arc<dyn ProjectRepository>,
        storage: Arc<dyn FileStorage>,
    ) -> UploadFileUseCase {
        UploadFileUseCase::new(
            repository,
            storage,
            Arc::new(ConnectionRegistry::new()),
            Arc::new(ProjectLocks::new()),
            Arc::new(FixedClock::new(NOW)),
            UploadPolicy::unrestricted(),
        )
    }

    async fn local_storage() -> (tempfile::TempDir, Arc<LocalFileStorage>) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::open(dir.path().join("uploads/projects"))
            .await
            .unwrap();
        (dir, Arc::new(storage))
    }

    fn files_in(root: &Path) -> usize {
        std::fs::read_dir(root).unwrap().count()
    }

    #[test]
    fn test_stored_file_name_format() {
        // テスト項目: 保存ファイル名は project_<id>_<millis><ext> の形式になる
        // given (前提条件):
        let id = ProjectId::new(3).unwrap();

        // when (操作):
        let with_ext = stored_file_name(id, 1234, Some(".pdf"));
        let without_ext = stored_file_name(id, 1234, None);

        // then (期待する結果):
        assert_eq!(with_ext, "project_3_1234.pdf");
        assert_eq!(without_ext, "project_3_1234");
    }

    #[tokio::test]
    async fn test_upload_success_updates_store() {
        // テスト項目: 既存プロジェクトへのアップロードが保存とストア更新を行う
        // given (前提条件):
        let (_dir, storage) = local_storage().await;
        let repository = Arc::new(InMemoryProjectRepository::new(vec![project(3)]));
        let usecase = usecase(repository.clone(), storage.clone());

        // when (操作):
        let outcome = usecase.execute(request(3, b"0123456789")).await.unwrap();

        // then (期待する結果):
        assert_eq!(outcome.file.file_name, format!("project_3_{}.pdf", NOW));
        assert_eq!(outcome.file.size, 10);
        assert_eq!(outcome.project_title, "Autonomous Robot");
        assert!(Path::new(&outcome.file.path).starts_with(storage.root()));

        let stored = repository
            .find_project(ProjectId::new(3).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.latest_file(), Some(outcome.file.path.as_str()));
        assert_eq!(stored.submission_date, Some(Timestamp::new(NOW)));
    }

    #[tokio::test]
    async fn test_upload_same_millisecond_gets_distinct_names() {
        // テスト項目: 同じミリ秒のアップロードでも別のファイル名が割り当てられる
        // given (前提条件):
        let (_dir, storage) = local_storage().await;
        let repository = Arc::new(InMemoryProjectRepository::new(vec![project(3)]));
        let usecase = usecase(repository.clone(), storage.clone());

        // when (操作):
        let first = usecase.execute(request(3, b"first")).await.unwrap();
        let second = usecase.execute(request(3, b"second")).await.unwrap();

        // then (期待する結果):
        assert_ne!(first.file.path, second.file.path);
        assert_eq!(second.file.file_name, format!("project_3_{}.pdf", NOW + 1));
        let stored = repository
            .find_project(ProjectId::new(3).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.file_paths, vec![first.file.path, second.file.path]);
    }

    #[tokio::test]
    async fn test_upload_missing_project_leaves_root_unchanged() {
        // テスト項目: 存在しないプロジェクトへのアップロードはエラーでファイルも残らない
        // given (前提条件):
        let (_dir, storage) = local_storage().await;
        let repository = Arc::new(InMemoryProjectRepository::new(vec![project(3)]));
        let usecase = usecase(repository, storage.clone());

        // when (操作):
        let result = usecase.execute(request(9999, b"0123456789")).await;

        // then (期待する結果):
        assert_eq!(result, Err(UseCaseError::ProjectNotFound(9999)));
        assert_eq!(files_in(storage.root()), 0);
    }

    #[tokio::test]
    async fn test_upload_invalid_base64_has_no_side_effects() {
        // テスト項目: 不正な base64 はエラーになりファイルもストア更新も発生しない
        // given (前提条件):
        let mut repository = MockProjectRepository::new();
        repository
            .expect_find_project()
            .returning(|_| Ok(Some(project(3))));
        repository.expect_append_file().never();
        repository.expect_update_project().never();
        let mut storage = MockFileStorage::new();
        storage.expect_store().never();
        let usecase = usecase(Arc::new(repository), Arc::new(storage));

        // when (操作):
        let result = usecase
            .execute(UploadRequest {
                file_name: "report.pdf".to_string(),
                file_data: "not base64!!".to_string(),
                project_id: 3,
            })
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(UseCaseError::Decode(_))));
    }

    #[tokio::test]
    async fn test_upload_validation_errors() {
        // テスト項目: 空のフィールドや 0 以下の projectId は検証エラーになる
        // given (前提条件):
        let mut repository = MockProjectRepository::new();
        repository.expect_find_project().never();
        let usecase = usecase(Arc::new(repository), Arc::new(MockFileStorage::new()));
        let requests = [
            UploadRequest {
                file_name: String::new(),
                file_data: "AAAA".to_string(),
                project_id: 3,
            },
            UploadRequest {
                file_name: "a.pdf".to_string(),
                file_data: String::new(),
                project_id: 3,
            },
            UploadRequest {
                file_name: "a.pdf".to_string(),
                file_data: "AAAA".to_string(),
                project_id: 0,
            },
        ];

        // when (操作):
        let mut results = Vec::new();
        for request in requests {
            results.push(usecase.execute(request).await);
        }

        // then (期待する結果):
        for result in results {
            assert!(matches!(result, Err(UseCaseError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_store_failure_removes_written_file() {
        // テスト項目: ストア更新に失敗した場合、書き込んだファイルが削除される
        // given (前提条件):
        let (_dir, storage) = local_storage().await;
        let mut repository = MockProjectRepository::new();
        repository
            .expect_find_project()
            .returning(|_| Ok(Some(project(3))));
        repository.expect_append_file().returning(|_, _| Ok(()));
        repository
            .expect_update_project()
            .returning(|_| Err(RepositoryError::Unavailable("disk full".to_string())));
        repository
            .expect_remove_file()
            .times(1)
            .returning(|_, _| Ok(()));
        let usecase = usecase(Arc::new(repository), storage.clone());

        // when (操作):
        let result = usecase.execute(request(3, b"0123456789")).await;

        // then (期待する結果):
        assert!(matches!(result, Err(UseCaseError::Store(_))));
        let written = storage.root().join(format!("project_3_{}.pdf", NOW));
        assert!(!written.exists());
        assert_eq!(files_in(storage.root()), 0);
    }

    #[tokio::test]
    async fn test_append_failure_triggers_rollback() {
        // テスト項目: ファイル参照の追加に失敗した場合も remove が呼ばれる
        // given (前提条件):
        let mut repository = MockProjectRepository::new();
        repository
            .expect_find_project()
            .returning(|_| Ok(Some(project(3))));
        repository
            .expect_append_file()
            .returning(|_, _| Err(RepositoryError::Unavailable("timeout".to_string())));
        repository.expect_update_project().never();
        repository.expect_remove_file().never();
        let mut storage = MockFileStorage::new();
        storage.expect_store().returning(|name, data| {
            Ok(StoredFile {
                path: format!("uploads/projects/{}", name),
                file_name: name.to_string(),
                size: data.len() as u64,
            })
        });
        let expected = format!("uploads/projects/project_3_{}.pdf", NOW);
        storage
            .expect_remove()
            .withf(move |path| *path == expected)
            .times(1)
            .returning(|_| Ok(()));
        let usecase = usecase(Arc::new(repository), Arc::new(storage));

        // when (操作):
        let result = usecase.execute(request(3, b"abc")).await;

        // then (期待する結果):
        assert!(matches!(result, Err(UseCaseError::Store(_))));
    }

    /// In-memory store whose `update_project` can be switched to fail.
    struct FlakyRepository {
        inner: InMemoryProjectRepository,
        fail_updates: AtomicBool,
    }

    #[async_trait::async_trait]
    impl ProjectRepository for FlakyRepository {
        async fn find_project(&self, id: ProjectId) -> Result<Option<Project>, RepositoryError> {
            self.inner.find_project(id).await
        }

        async fn append_file(
            &self,
            id: ProjectId,
            file_path: String,
        ) -> Result<(), RepositoryError> {
            self.inner.append_file(id, file_path).await
        }

        async fn remove_file(&self, id: ProjectId, file_path: &str) -> Result<(), RepositoryError> {
            self.inner.remove_file(id, file_path).await
        }

        async fn update_project(&self, project: Project) -> Result<(), RepositoryError> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(RepositoryError::Unavailable("down".to_string()));
            }
            self.inner.update_project(project).await
        }
    }

    #[tokio::test]
    async fn test_failed_update_keeps_previous_latest_file() {
        // テスト項目: ストア更新に失敗しても最新ファイルは直前の成功分のまま残る
        // given (前提条件):
        let (_dir, storage) = local_storage().await;
        let repository = Arc::new(FlakyRepository {
            inner: InMemoryProjectRepository::new(vec![project(3)]),
            fail_updates: AtomicBool::new(false),
        });
        let upload = usecase(repository.clone(), storage.clone());
        let download = DownloadFileUseCase::new(repository.clone(), storage.clone());
        let first = upload.execute(request(3, b"first")).await.unwrap();
        repository.fail_updates.store(true, Ordering::SeqCst);

        // when (操作):
        let result = upload.execute(request(3, b"second")).await;

        // then (期待する結果):
        assert!(matches!(result, Err(UseCaseError::Store(_))));
        let stored = repository
            .find_project(ProjectId::new(3).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.file_paths, vec![first.file.path.clone()]);
        assert_eq!(files_in(storage.root()), 1);

        let downloaded = download.execute(3).await.unwrap();
        assert_eq!(downloaded.file_name, first.file.file_name);
        assert_eq!(STANDARD.decode(downloaded.file_data).unwrap(), b"first");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_uploads_to_one_project_are_all_recorded() {
        // テスト項目: 同じプロジェクトへの同時アップロードがすべて一度ずつ記録される
        // given (前提条件):
        const UPLOADS: usize = 12;
        let (_dir, storage) = local_storage().await;
        let repository = Arc::new(InMemoryProjectRepository::new(vec![project(3)]));
        let usecase = Arc::new(UploadFileUseCase::new(
            repository.clone(),
            storage.clone(),
            Arc::new(ConnectionRegistry::new()),
            Arc::new(ProjectLocks::new()),
            Arc::new(SystemClock),
            UploadPolicy::unrestricted(),
        ));

        // when (操作):
        let tasks = (0..UPLOADS).map(|n| {
            let usecase = usecase.clone();
            tokio::spawn(async move {
                usecase
                    .execute(request(3, format!("upload {}", n).as_bytes()))
                    .await
            })
        });
        let outcomes: Vec<UploadOutcome> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        // then (期待する結果):
        let stored = repository
            .find_project(ProjectId::new(3).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.file_paths.len(), UPLOADS);
        for outcome in &outcomes {
            let occurrences = stored
                .file_paths
                .iter()
                .filter(|path| **path == outcome.file.path)
                .count();
            assert_eq!(occurrences, 1);
        }
        assert_eq!(files_in(storage.root()), UPLOADS);
    }

    #[tokio::test]
    async fn test_server_policy_is_applied_when_configured() {
        // テスト項目: サーバー側ポリシーを設定すると拡張子が制限される
        // given (前提条件):
        let (_dir, storage) = local_storage().await;
        let repository = Arc::new(InMemoryProjectRepository::new(vec![project(3)]));
        let usecase = UploadFileUseCase::new(
            repository,
            storage.clone(),
            Arc::new(ConnectionRegistry::new()),
            Arc::new(ProjectLocks::new()),
            Arc::new(FixedClock::new(NOW)),
            UploadPolicy::desktop_default(),
        );

        // when (操作):
        let result = usecase
            .execute(UploadRequest {
                file_name: "notes.docx".to_string(),
                file_data: STANDARD.encode(b"docx"),
                project_id: 3,
            })
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(UseCaseError::Validation(_))));
        assert_eq!(files_in(storage.root()), 0);
    }

    #[tokio::test]
    async fn test_broadcast_submitted_reaches_registered_clients() {
        // テスト項目: 提出通知が登録済みのクライアントに配送される
        // given (前提条件):
        use crate::domain::{ClientHandle, ConnectionId, UserId};
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        registry
            .register_client(
                UserId::new("7".to_string()).unwrap(),
                ClientHandle::new(ConnectionId::new(1), tx),
            )
            .await;
        let usecase = UploadFileUseCase::new(
            Arc::new(InMemoryProjectRepository::default()),
            Arc::new(MockFileStorage::new()),
            registry,
            Arc::new(ProjectLocks::new()),
            Arc::new(FixedClock::new(NOW)),
            UploadPolicy::unrestricted(),
        );
        let outcome = UploadOutcome {
            project_id: ProjectId::new(3).unwrap(),
            project_title: "Autonomous Robot".to_string(),
            file: StoredFile {
                path: "uploads/projects/project_3_1.pdf".to_string(),
                file_name: "project_3_1.pdf".to_string(),
                size: 1,
            },
        };

        // when (操作):
        let delivered = usecase.broadcast_submitted(&outcome).await;

        // then (期待する結果):
        assert_eq!(delivered, 1);
        match rx.recv().await {
            Some(Message::Notification {
                kind,
                message,
                project_id,
                ..
            }) => {
                assert_eq!(kind, NotificationKind::ProjectSubmitted);
                assert!(message.contains("Autonomous Robot"));
                assert_eq!(project_id, Some(3));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
