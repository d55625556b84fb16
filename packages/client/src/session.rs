//! Socket client session management.
//!
//! A [`SocketClient`] owns one TCP connection. A background listener task
//! decodes inbound lines: responses complete the pending request with the
//! matching `requestId`, while notifications and unsolicited errors are
//! forwarded as [`ClientEvent`]s.

use std::{
    collections::VecDeque,
    path::Path,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use futures_util::{sink::SinkExt, stream::StreamExt};
use kadai_shared::{
    policy::UploadPolicy,
    protocol::{Action, DEFAULT_HOST, DEFAULT_PORT, Message, MessageCodec, NotificationKind},
};
use tokio::{
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::codec::{FramedRead, FramedWrite};
use uuid::Uuid;

use crate::{
    error::ClientError,
    progress::{ProgressCallback, ProgressTicker},
};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings of a [`SocketClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Checked before any upload is sent
    pub upload_policy: UploadPolicy,
    pub connect_timeout: Duration,
    /// How long a request waits for its response
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            upload_policy: UploadPolicy::desktop_default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Something that happened on the connection outside of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected {
        user_id: String,
    },
    Notification {
        kind: NotificationKind,
        message: String,
        timestamp: String,
        project_id: Option<i64>,
    },
    /// `error` message that did not answer any pending request
    ServerError {
        message: String,
    },
    /// The connection was closed by the server or lost
    Disconnected,
}

/// Successful upload as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub message: String,
    /// Where the server stored the file
    pub file_path: String,
    /// Server-generated file name
    pub file_name: String,
    pub file_size: u64,
}

/// Latest file of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStatusInfo {
    pub project_id: i64,
    pub title: String,
    pub status: String,
    /// RFC 3339, `None` if never submitted
    pub submission_date: Option<String>,
}

/// Requests waiting for their response, oldest first.
#[derive(Default)]
struct PendingRequests {
    entries: Mutex<VecDeque<(String, oneshot::Sender<Message>)>>,
    closed: AtomicBool,
}

impl PendingRequests {
    fn entries(&self) -> MutexGuard<'_, VecDeque<(String, oneshot::Sender<Message>)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a request. The entry is removed when the guard drops.
    ///
    /// Returns `None` once the connection has been closed.
    fn insert(
        self: &Arc<Self>,
        request_id: String,
    ) -> Option<(PendingGuard, oneshot::Receiver<Message>)> {
        let (tx, rx) = oneshot::channel();
        {
            let mut entries = self.entries();
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            entries.push_back((request_id.clone(), tx));
        }
        let guard = PendingGuard {
            pending: self.clone(),
            request_id,
        };
        Some((guard, rx))
    }

    /// Hand a response to the request it answers.
    ///
    /// A response carrying a `requestId` goes to that request; one without
    /// goes to the oldest pending request. Returns the message back if no
    /// request matches.
    fn resolve(&self, message: Message) -> Result<(), Message> {
        let sender = {
            let mut entries = self.entries();
            let index = match message.request_id() {
                Some(id) => entries.iter().position(|(pending, _)| pending == id),
                None if entries.is_empty() => None,
                None => Some(0),
            };
            match index.and_then(|index| entries.remove(index)) {
                Some((_, sender)) => sender,
                None => return Err(message),
            }
        };
        // 受信側が既に待機をやめていれば破棄される
        let _ = sender.send(message);
        Ok(())
    }

    fn remove(&self, request_id: &str) {
        self.entries().retain(|(pending, _)| pending != request_id);
    }

    /// Drop every waiter; their futures fail with a connection error.
    fn fail_all(&self) {
        let mut entries = self.entries();
        self.closed.store(true, Ordering::Release);
        entries.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries().len()
    }
}

struct PendingGuard {
    pending: Arc<PendingRequests>,
    request_id: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.remove(&self.request_id);
    }
}

struct Connection {
    user_id: String,
    writer: tokio::sync::Mutex<FramedWrite<OwnedWriteHalf, MessageCodec>>,
    pending: Arc<PendingRequests>,
    listener: JoinHandle<()>,
}

/// Client for the Kadai server.
///
/// Request methods take `&self`, so several requests can be in flight on one
/// connection at once; responses are matched by `requestId`.
pub struct SocketClient {
    config: ClientConfig,
    events: mpsc::UnboundedSender<ClientEvent>,
    connection: Option<Connection>,
}

impl SocketClient {
    /// Create a disconnected client and the receiver for its events.
    pub fn new(config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let client = Self {
            config,
            events,
            connection: None,
        };
        (client, rx)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether the connection is open and its listener still running.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| !connection.listener.is_finished())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.connection
            .as_ref()
            .map(|connection| connection.user_id.as_str())
    }

    /// Open the socket and bind it to `user_id`.
    ///
    /// Resolves once the server has answered with `connect_response`. An
    /// existing connection is closed first.
    pub async fn connect(&mut self, user_id: &str) -> Result<(), ClientError> {
        if self.connection.is_some() {
            self.disconnect().await;
        }

        let addr = self.config.addr();
        let stream = timeout(self.config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ClientError::Connection(format!("Timed out connecting to {}", addr)))?
            .map_err(|e| ClientError::Connection(format!("{}: {}", addr, e)))?;
        tracing::debug!("Connected to {}", addr);

        let (read_half, write_half) = stream.into_split();
        let pending = Arc::new(PendingRequests::default());
        let listener = tokio::spawn(listen(
            FramedRead::new(read_half, MessageCodec::new()),
            pending.clone(),
            self.events.clone(),
        ));
        self.connection = Some(Connection {
            user_id: user_id.to_string(),
            writer: tokio::sync::Mutex::new(FramedWrite::new(write_half, MessageCodec::new())),
            pending,
            listener,
        });

        let result = self
            .request(|request_id| Message::Connect {
                user_id: user_id.to_string(),
                request_id: Some(request_id),
            })
            .await;
        match result {
            Ok(Message::ConnectResponse { message, .. }) => {
                tracing::info!("{}", message);
                let _ = self.events.send(ClientEvent::Connected {
                    user_id: user_id.to_string(),
                });
                Ok(())
            }
            other => {
                self.disconnect().await;
                match other {
                    Ok(message) => Err(unexpected(Action::ConnectResponse, &message)),
                    Err(ClientError::Server(reason)) => Err(ClientError::Rejected(reason)),
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Stop the listener and close the socket.
    ///
    /// Requests still waiting fail with a connection error.
    pub async fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.listener.abort();
            connection.pending.fail_all();
            let mut writer = connection.writer.into_inner();
            if let Err(e) = writer.close().await {
                tracing::debug!("Error while closing the connection: {}", e);
            }
            tracing::info!("Disconnected");
        }
    }

    /// Read `path` and upload it to `project_id`.
    pub async fn upload_file(
        &self,
        project_id: i64,
        path: impl AsRef<Path>,
        progress: Option<ProgressCallback>,
    ) -> Result<UploadReceipt, ClientError> {
        let path = path.as_ref();
        let file_error = |message: String| ClientError::File {
            path: path.display().to_string(),
            message,
        };

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| file_error("not a file".to_string()))?;
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| file_error(e.to_string()))?;
        // 読み込む前にサイズと拡張子を確認する
        self.config.upload_policy.check(&file_name, metadata.len())?;

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| file_error(e.to_string()))?;
        self.upload_bytes(project_id, &file_name, &data, progress)
            .await
    }

    /// Upload in-memory content as `file_name`.
    pub async fn upload_bytes(
        &self,
        project_id: i64,
        file_name: &str,
        data: &[u8],
        progress: Option<ProgressCallback>,
    ) -> Result<UploadReceipt, ClientError> {
        self.config
            .upload_policy
            .check(file_name, data.len() as u64)?;
        let user_id = self.connection()?.user_id.clone();

        let ticker = ProgressTicker::start(progress);
        let result = self
            .request(|request_id| Message::UploadFile {
                file_name: file_name.to_string(),
                file_data: STANDARD.encode(data),
                project_id,
                user_id,
                request_id: Some(request_id),
            })
            .await
            .and_then(|response| match response {
                Message::UploadResponse {
                    message,
                    file_path,
                    file_name,
                    file_size,
                    ..
                } => Ok(UploadReceipt {
                    message,
                    file_path,
                    file_name,
                    file_size,
                }),
                other => Err(unexpected(Action::UploadResponse, &other)),
            });
        ticker.finish(result.is_ok());
        result
    }

    /// Fetch the latest file of `project_id`.
    pub async fn download_file(
        &self,
        project_id: i64,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadedFile, ClientError> {
        let user_id = self.connection()?.user_id.clone();

        let ticker = ProgressTicker::start(progress);
        let result = self
            .request(|request_id| Message::DownloadFile {
                project_id,
                user_id,
                request_id: Some(request_id),
            })
            .await
            .and_then(|response| match response {
                Message::DownloadResponse {
                    file_name,
                    file_data,
                    ..
                } => STANDARD
                    .decode(file_data.as_bytes())
                    .map(|data| DownloadedFile { file_name, data })
                    .map_err(|e| ClientError::Decode(e.to_string())),
                other => Err(unexpected(Action::DownloadResponse, &other)),
            });
        ticker.finish(result.is_ok());
        result
    }

    /// Set the status of `project_id`. Returns the server's message.
    pub async fn submit_project(
        &self,
        project_id: i64,
        status: &str,
    ) -> Result<String, ClientError> {
        let user_id = self.connection()?.user_id.clone();
        let response = self
            .request(|request_id| Message::SubmitProject {
                project_id,
                status: status.to_string(),
                user_id,
                request_id: Some(request_id),
            })
            .await?;
        match response {
            Message::SubmitResponse { message, .. } => Ok(message),
            other => Err(unexpected(Action::SubmitResponse, &other)),
        }
    }

    pub async fn project_status(&self, project_id: i64) -> Result<ProjectStatusInfo, ClientError> {
        let user_id = self.connection()?.user_id.clone();
        let response = self
            .request(|request_id| Message::GetProjectStatus {
                project_id,
                user_id,
                request_id: Some(request_id),
            })
            .await?;
        match response {
            Message::ProjectStatusResponse {
                project_id,
                project_status,
                title,
                submission_date,
                ..
            } => Ok(ProjectStatusInfo {
                project_id,
                title,
                status: project_status,
                submission_date,
            }),
            other => Err(unexpected(Action::ProjectStatusResponse, &other)),
        }
    }

    fn connection(&self) -> Result<&Connection, ClientError> {
        self.connection.as_ref().ok_or(ClientError::NotConnected)
    }

    /// Send one request and wait for its response.
    ///
    /// `error` responses become [`ClientError::Server`]. Dropping the returned
    /// future only stops waiting; the server still processes the request.
    async fn request(&self, build: impl FnOnce(String) -> Message) -> Result<Message, ClientError> {
        let connection = self.connection()?;
        let request_id = Uuid::new_v4().to_string();
        let (_guard, rx) = connection
            .pending
            .insert(request_id.clone())
            .ok_or_else(|| ClientError::Connection("Connection closed by the server".to_string()))?;

        let message = build(request_id);
        let action = message.action();
        connection.writer.lock().await.send(message).await?;
        tracing::debug!("-> {}", action);

        let response = match timeout(self.config.request_timeout, rx).await {
            Err(_) => return Err(ClientError::Timeout(self.config.request_timeout)),
            Ok(Err(_)) => {
                return Err(ClientError::Connection(
                    "Connection closed before the response arrived".to_string(),
                ));
            }
            Ok(Ok(response)) => response,
        };

        match response {
            Message::Error { message, .. } => Err(ClientError::Server(message)),
            other => Ok(other),
        }
    }
}

fn unexpected(expected: Action, actual: &Message) -> ClientError {
    ClientError::UnexpectedResponse {
        expected,
        actual: actual.action(),
    }
}

/// Background task reading everything the server sends.
async fn listen(
    mut reader: FramedRead<OwnedReadHalf, MessageCodec>,
    pending: Arc<PendingRequests>,
    events: mpsc::UnboundedSender<ClientEvent>,
) {
    while let Some(frame) = reader.next().await {
        match frame {
            Ok(Ok(message)) => dispatch(message, &pending, &events),
            Ok(Err(e)) => tracing::warn!("Ignoring undecodable message: {}", e),
            Err(e) => {
                tracing::warn!("Connection read error: {}", e);
                break;
            }
        }
    }

    tracing::info!("Server closed the connection");
    pending.fail_all();
    let _ = events.send(ClientEvent::Disconnected);
}

fn dispatch(
    message: Message,
    pending: &PendingRequests,
    events: &mpsc::UnboundedSender<ClientEvent>,
) {
    tracing::debug!("<- {}", message.action());
    match message {
        Message::Notification {
            kind,
            message,
            timestamp,
            project_id,
        } => {
            let _ = events.send(ClientEvent::Notification {
                kind,
                message,
                timestamp,
                project_id,
            });
        }
        message if message.is_response() => match pending.resolve(message) {
            Ok(()) => {}
            Err(Message::Error { message, .. }) => {
                let _ = events.send(ClientEvent::ServerError { message });
            }
            Err(unmatched) => {
                tracing::debug!("Dropping unmatched {}", unmatched.action());
            }
        },
        other => tracing::debug!("Ignoring {} sent by the server", other.action()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kadai_shared::protocol::ResponseStatus;

    fn submit_response(request_id: Option<&str>) -> Message {
        Message::SubmitResponse {
            status: ResponseStatus::Success,
            message: "ok".to_string(),
            request_id: request_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_resolve_matches_request_id_out_of_order() {
        // テスト項目: requestId が一致するリクエストに順不同でレスポンスが渡される
        // given (前提条件):
        let pending = Arc::new(PendingRequests::default());
        let (_guard_a, rx_a) = pending.insert("a".to_string()).unwrap();
        let (_guard_b, rx_b) = pending.insert("b".to_string()).unwrap();

        // when (操作):
        pending.resolve(submit_response(Some("b"))).unwrap();
        pending.resolve(submit_response(Some("a"))).unwrap();

        // then (期待する結果):
        assert_eq!(rx_a.await.unwrap().request_id(), Some("a"));
        assert_eq!(rx_b.await.unwrap().request_id(), Some("b"));
    }

    #[tokio::test]
    async fn test_resolve_without_request_id_takes_oldest() {
        // テスト項目: requestId の無いレスポンスは最も古いリクエストに渡される
        // given (前提条件):
        let pending = Arc::new(PendingRequests::default());
        let (_guard_a, mut rx_a) = pending.insert("a".to_string()).unwrap();
        let (_guard_b, mut rx_b) = pending.insert("b".to_string()).unwrap();

        // when (操作):
        pending.resolve(submit_response(None)).unwrap();

        // then (期待する結果):
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_unmatched_response_is_returned() {
        // テスト項目: 該当するリクエストが無いレスポンスは呼び出し元に返される
        // given (前提条件):
        let pending = Arc::new(PendingRequests::default());

        // when (操作):
        let by_id = pending.resolve(submit_response(Some("zzz")));
        let without_id = pending.resolve(submit_response(None));

        // then (期待する結果):
        assert!(by_id.is_err());
        assert!(without_id.is_err());
    }

    #[test]
    fn test_guard_drop_removes_entry() {
        // テスト項目: 待機をやめたリクエストは一覧から削除される
        // given (前提条件):
        let pending = Arc::new(PendingRequests::default());
        let (guard, _rx) = pending.insert("a".to_string()).unwrap();

        // when (操作):
        drop(guard);

        // then (期待する結果):
        assert_eq!(pending.len(), 0);
    }

    #[tokio::test]
    async fn test_fail_all_closes_waiters() {
        // テスト項目: 接続が切れると待機中のリクエストは全て失敗する
        // given (前提条件):
        let pending = Arc::new(PendingRequests::default());
        let (_guard, rx) = pending.insert("a".to_string()).unwrap();

        // when (操作):
        pending.fail_all();

        // then (期待する結果):
        assert!(rx.await.is_err());
        assert!(pending.insert("b".to_string()).is_none());
    }

    #[test]
    fn test_dispatch_routes_notifications_and_stray_errors() {
        // テスト項目: 通知と対応の無いエラーがイベントとして配送される
        // given (前提条件):
        let pending = PendingRequests::default();
        let (events, mut rx) = mpsc::unbounded_channel();

        // when (操作):
        dispatch(
            Message::notification(NotificationKind::ProjectSubmitted, "new file", Some(3)),
            &pending,
            &events,
        );
        dispatch(Message::error("boom", None), &pending, &events);

        // then (期待する結果):
        assert!(matches!(
            rx.try_recv(),
            Ok(ClientEvent::Notification {
                kind: NotificationKind::ProjectSubmitted,
                project_id: Some(3),
                ..
            })
        ));
        assert_eq!(
            rx.try_recv(),
            Ok(ClientEvent::ServerError {
                message: "boom".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_requests_fail_when_not_connected() {
        // テスト項目: 未接続の状態でのリクエストは NotConnected になる
        // given (前提条件):
        let (client, _events) = SocketClient::new(ClientConfig::default());

        // when (操作):
        let result = client.project_status(3).await;

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::NotConnected)));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_policy_is_checked_before_sending() {
        // テスト項目: クライアント側ポリシー違反は送信前にエラーになる
        // given (前提条件):
        let (client, _events) = SocketClient::new(ClientConfig::default());

        // when (操作):
        let result = client.upload_bytes(3, "notes.docx", b"docx", None).await;

        // then (期待する結果): 未接続エラーより先にポリシーで拒否される
        assert!(matches!(result, Err(ClientError::Policy(_))));
    }
}
