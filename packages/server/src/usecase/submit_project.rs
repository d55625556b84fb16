//! UseCase: プロジェクト提出（ステータス更新）処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SubmitProjectUseCase::execute() メソッド
//! - ステータスの更新と、`submitted` の場合の提出日時の記録
//!
//! ### どのような状況を想定しているか
//! - 正常系：`submitted`（大文字小文字を区別しない）への更新
//! - 正常系：それ以外のステータスへの更新（提出日時は変わらない）
//! - 異常系：存在しないプロジェクト、空のステータス、ストア更新失敗

use std::sync::Arc;

use kadai_shared::{
    protocol::{Message, NotificationKind},
    time::Clock,
};

use crate::domain::{MessagePusher, ProjectId, ProjectRepository, ProjectStatus, Timestamp};

use super::{error::UseCaseError, project_lock::ProjectLocks};

/// Result of a status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub project_id: ProjectId,
    pub title: String,
    pub status: ProjectStatus,
}

/// プロジェクト提出のユースケース
pub struct SubmitProjectUseCase {
    repository: Arc<dyn ProjectRepository>,
    message_pusher: Arc<dyn MessagePusher>,
    locks: Arc<ProjectLocks>,
    clock: Arc<dyn Clock>,
}

impl SubmitProjectUseCase {
    pub fn new(
        repository: Arc<dyn ProjectRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        locks: Arc<ProjectLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
            locks,
            clock,
        }
    }

    /// ステータス更新を実行
    pub async fn execute(
        &self,
        project_id: i64,
        status: String,
    ) -> Result<SubmitOutcome, UseCaseError> {
        let project_id = ProjectId::new(project_id)?;
        let status = ProjectStatus::new(status)?;

        // 存在しない id ではロックを作らない
        if self.repository.find_project(project_id).await?.is_none() {
            return Err(UseCaseError::ProjectNotFound(project_id.value()));
        }

        let _guard = self.locks.lock(project_id).await;

        let mut project = self
            .repository
            .find_project(project_id)
            .await?
            .ok_or(UseCaseError::ProjectNotFound(project_id.value()))?;

        let now = Timestamp::new(self.clock.now_millis());
        let stamped = project.change_status(status.clone(), now);
        let title = project.title.clone();
        self.repository.update_project(project).await?;

        tracing::info!(
            "Project {} status -> '{}'{}",
            project_id,
            status,
            if stamped { " (submission date set)" } else { "" }
        );
        Ok(SubmitOutcome {
            project_id,
            title,
            status,
        })
    }

    /// ステータス更新を全クライアントにブロードキャスト
    pub async fn broadcast_status_updated(&self, outcome: &SubmitOutcome) -> usize {
        let message = Message::notification(
            NotificationKind::ProjectStatusUpdated,
            format!(
                "Project '{}' status changed to {}",
                outcome.title, outcome.status
            ),
            Some(outcome.project_id.value()),
        );
        self.message_pusher.broadcast(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            ClientHandle, ConnectionId, Project, RepositoryError, UserId,
            repository::MockProjectRepository,
        },
        infrastructure::{
            message_pusher::ConnectionRegistry, repository::InMemoryProjectRepository,
        },
    };
    use kadai_shared::time::FixedClock;

    const NOW: i64 = 1_700_000_000_000;

    fn project(id: i64) -> Project {
        Project::new(
            ProjectId::new(id).unwrap(),
            "Campus Navigation App",
            ProjectStatus::new("in_progress".to_string()).unwrap(),
        )
    }

    fn usecase(repository: Arc<dyn ProjectRepository>) -> SubmitProjectUseCase {
        SubmitProjectUseCase::new(
            repository,
            Arc::new(ConnectionRegistry::new()),
            Arc::new(ProjectLocks::new()),
            Arc::new(FixedClock::new(NOW)),
        )
    }

    #[tokio::test]
    async fn test_submit_sets_status_and_submission_date() {
        // テスト項目: submitted への更新で提出日時が記録される
        // given (前提条件):
        let repository = Arc::new(InMemoryProjectRepository::new(vec![project(4)]));
        let usecase = usecase(repository.clone());

        // when (操作):
        let outcome = usecase.execute(4, "Submitted".to_string()).await.unwrap();

        // then (期待する結果):
        assert_eq!(outcome.status.as_str(), "Submitted");
        assert_eq!(outcome.title, "Campus Navigation App");
        let stored = repository
            .find_project(ProjectId::new(4).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status.as_str(), "Submitted");
        assert_eq!(stored.submission_date, Some(Timestamp::new(NOW)));
    }

    #[tokio::test]
    async fn test_other_status_keeps_submission_date() {
        // テスト項目: submitted 以外への更新では提出日時は変わらない
        // given (前提条件):
        let repository = Arc::new(InMemoryProjectRepository::new(vec![project(4)]));
        let usecase = usecase(repository.clone());

        // when (操作):
        usecase.execute(4, "under_review".to_string()).await.unwrap();

        // then (期待する結果):
        let stored = repository
            .find_project(ProjectId::new(4).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status.as_str(), "under_review");
        assert_eq!(stored.submission_date, None);
    }

    #[tokio::test]
    async fn test_submit_validation_and_not_found() {
        // テスト項目: 空のステータスと存在しないプロジェクトはエラーになる
        // given (前提条件):
        let repository = Arc::new(InMemoryProjectRepository::new(vec![project(4)]));
        let usecase = usecase(repository);

        // when (操作):
        let empty = usecase.execute(4, "  ".to_string()).await;
        let missing = usecase.execute(9999, "submitted".to_string()).await;

        // then (期待する結果):
        assert!(matches!(empty, Err(UseCaseError::Validation(_))));
        assert_eq!(missing, Err(UseCaseError::ProjectNotFound(9999)));
    }

    #[tokio::test]
    async fn test_submit_to_missing_projects_leaves_no_locks() {
        // テスト項目: 存在しないプロジェクトへの更新ではロックが残らない
        // given (前提条件):
        let repository = Arc::new(InMemoryProjectRepository::new(vec![project(4)]));
        let locks = Arc::new(ProjectLocks::new());
        let usecase = SubmitProjectUseCase::new(
            repository,
            Arc::new(ConnectionRegistry::new()),
            locks.clone(),
            Arc::new(FixedClock::new(NOW)),
        );

        // when (操作):
        for id in 1..=1000 {
            let _ = usecase.execute(id, "submitted".to_string()).await;
        }

        // then (期待する結果):
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_submit_store_failure_is_reported() {
        // テスト項目: ストア更新の失敗が Store エラーとして返される
        // given (前提条件):
        let mut repository = MockProjectRepository::new();
        repository
            .expect_find_project()
            .returning(|id| Ok(Some(project(id.value()))));
        repository
            .expect_update_project()
            .times(1)
            .returning(|_| Err(RepositoryError::Unavailable("read-only".to_string())));
        let usecase = usecase(Arc::new(repository));

        // when (操作):
        let result = usecase.execute(4, "submitted".to_string()).await;

        // then (期待する結果):
        assert!(matches!(result, Err(UseCaseError::Store(_))));
    }

    #[tokio::test]
    async fn test_broadcast_status_updated() {
        // テスト項目: ステータス更新通知が全クライアントに配送される
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let mut receivers = Vec::new();
        for (n, user) in ["7", "8"].into_iter().enumerate() {
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            registry
                .register_client(
                    UserId::new(user.to_string()).unwrap(),
                    ClientHandle::new(ConnectionId::new(n as u64 + 1), tx),
                )
                .await;
            receivers.push(rx);
        }
        let usecase = SubmitProjectUseCase::new(
            Arc::new(InMemoryProjectRepository::default()),
            registry,
            Arc::new(ProjectLocks::new()),
            Arc::new(FixedClock::new(NOW)),
        );
        let outcome = SubmitOutcome {
            project_id: ProjectId::new(4).unwrap(),
            title: "Campus Navigation App".to_string(),
            status: ProjectStatus::new("submitted".to_string()).unwrap(),
        };

        // when (操作):
        let delivered = usecase.broadcast_status_updated(&outcome).await;

        // then (期待する結果):
        assert_eq!(delivered, 2);
        for rx in receivers.iter_mut() {
            assert!(matches!(
                rx.recv().await,
                Some(Message::Notification {
                    kind: NotificationKind::ProjectStatusUpdated,
                    project_id: Some(4),
                    ..
                })
            ));
        }
    }
}
