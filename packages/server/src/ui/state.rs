//! Server state shared by every connection.

use std::sync::Arc;

use kadai_shared::{policy::UploadPolicy, time::Clock};

use crate::{
    config::ConnectionSettings,
    domain::{ConnectionIdFactory, FileStorage, MessagePusher, ProjectRepository},
    usecase::{
        ConnectUserUseCase, DisconnectUserUseCase, DownloadFileUseCase, GetProjectStatusUseCase,
        ProjectLocks, SubmitProjectUseCase, UploadFileUseCase,
    },
};

/// Shared application state
pub struct AppState {
    /// ConnectUserUseCase（ユーザー接続のユースケース）
    pub connect_user_usecase: Arc<ConnectUserUseCase>,
    /// DisconnectUserUseCase（ユーザー切断のユースケース）
    pub disconnect_user_usecase: Arc<DisconnectUserUseCase>,
    /// UploadFileUseCase（ファイルアップロードのユースケース）
    pub upload_file_usecase: Arc<UploadFileUseCase>,
    /// DownloadFileUseCase（ファイルダウンロードのユースケース）
    pub download_file_usecase: Arc<DownloadFileUseCase>,
    /// SubmitProjectUseCase（ステータス更新のユースケース）
    pub submit_project_usecase: Arc<SubmitProjectUseCase>,
    /// GetProjectStatusUseCase（状態取得のユースケース）
    pub get_project_status_usecase: Arc<GetProjectStatusUseCase>,
    /// Source of per-connection ids
    pub connection_ids: ConnectionIdFactory,
    pub settings: ConnectionSettings,
}

impl AppState {
    /// Wire every use case on top of the given infrastructure.
    ///
    /// The upload and submit flows share one set of per-project locks.
    pub fn new(
        repository: Arc<dyn ProjectRepository>,
        storage: Arc<dyn FileStorage>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        upload_policy: UploadPolicy,
        settings: ConnectionSettings,
    ) -> Self {
        let locks = Arc::new(ProjectLocks::new());

        Self {
            connect_user_usecase: Arc::new(ConnectUserUseCase::new(message_pusher.clone())),
            disconnect_user_usecase: Arc::new(DisconnectUserUseCase::new(message_pusher.clone())),
            upload_file_usecase: Arc::new(UploadFileUseCase::new(
                repository.clone(),
                storage.clone(),
                message_pusher.clone(),
                locks.clone(),
                clock.clone(),
                upload_policy,
            )),
            download_file_usecase: Arc::new(DownloadFileUseCase::new(
                repository.clone(),
                storage,
            )),
            submit_project_usecase: Arc::new(SubmitProjectUseCase::new(
                repository.clone(),
                message_pusher,
                locks,
                clock,
            )),
            get_project_status_usecase: Arc::new(GetProjectStatusUseCase::new(repository)),
            connection_ids: ConnectionIdFactory::new(),
            settings,
        }
    }
}
