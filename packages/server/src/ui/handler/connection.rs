//! TCP connection handler.
//!
//! One task per accepted socket reads frames sequentially and answers each
//! request; a second task (`pusher_loop`) owns the write half and drains the
//! connection's outbound queue. Responses and broadcast notifications both go
//! through that queue, so a response queued before a broadcast is written
//! before it.

use std::{fmt, net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{sink::SinkExt, stream::StreamExt};
use kadai_shared::protocol::{Message, MessageCodec, ResponseStatus};
use tokio::{
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
    time::timeout,
};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::{
    domain::{ClientHandle, ConnectionId, PusherChannel},
    ui::state::AppState,
    usecase::UploadRequest,
};

use super::session::SessionState;

/// Serve one accepted connection until it closes.
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: Arc<AppState>) {
    let connection_id = state.connection_ids.generate();
    tracing::info!("Connection {} accepted from {}", connection_id, peer);

    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(
        read_half,
        MessageCodec::with_limit(state.settings.max_line_bytes),
    );
    let writer = FramedWrite::new(write_half, MessageCodec::new());

    let (tx, rx) = mpsc::unbounded_channel();
    let send_task = pusher_loop(rx, writer, state.settings.write_timeout, connection_id);

    let mut connection = Connection {
        id: connection_id,
        state,
        outbound: tx,
        session: SessionState::default(),
    };
    connection.read_loop(&mut reader).await;
    connection.close().await;

    // 登録解除と送信チャンネルの破棄で、キューを書き切った後に終了する
    if let Err(e) = send_task.await {
        tracing::error!("Writer task of {} panicked: {}", connection_id, e);
    }
    tracing::info!("Connection {} from {} closed", connection_id, peer);
}

/// Spawns a task that receives messages from the rx channel and writes them to the socket.
///
/// The task ends when every sender is dropped, or on the first write error or
/// write timeout. Ending drops `rx`, which the read loop observes.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<Message>,
    mut writer: FramedWrite<OwnedWriteHalf, MessageCodec>,
    write_timeout: Duration,
    connection_id: ConnectionId,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let action = message.action();
            match timeout(write_timeout, writer.send(message)).await {
                Ok(Ok(())) => tracing::debug!("{} -> {}", connection_id, action),
                Ok(Err(e)) => {
                    tracing::warn!("Failed to write {} to {}: {}", action, connection_id, e);
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        "Writing {} to {} timed out after {:?}",
                        action,
                        connection_id,
                        write_timeout
                    );
                    break;
                }
            }
        }
    })
}

struct Connection {
    id: ConnectionId,
    state: Arc<AppState>,
    /// Sender half of this connection's outbound queue
    outbound: PusherChannel,
    session: SessionState,
}

impl Connection {
    /// Read and handle frames one at a time until the connection ends.
    async fn read_loop(&mut self, reader: &mut FramedRead<OwnedReadHalf, MessageCodec>) {
        let read_timeout = self.state.settings.read_timeout;

        loop {
            let next = tokio::select! {
                _ = self.outbound.closed() => {
                    tracing::debug!("Writer of {} stopped", self.id);
                    break;
                }
                next = timeout(read_timeout, reader.next()) => next,
            };

            let frame = match next {
                Err(_) => {
                    tracing::info!("{} idle for {:?}, closing", self.id, read_timeout);
                    break;
                }
                Ok(None) => {
                    tracing::debug!("{} closed by peer", self.id);
                    break;
                }
                Ok(Some(Err(e))) => {
                    // 行長超過や I/O エラーでは接続を閉じる
                    tracing::warn!("Read error on {}: {}", self.id, e);
                    break;
                }
                Ok(Some(Ok(frame))) => frame,
            };

            match frame {
                Ok(message) => self.handle(message).await,
                Err(e) => {
                    tracing::warn!("Rejected frame on {}: {}", self.id, e);
                    self.reply(Message::error(e.to_string(), e.request_id));
                }
            }
        }
    }

    /// Route one decoded message to its use case.
    async fn handle(&mut self, message: Message) {
        let action = message.action();
        let request_id = message.request_id().map(str::to_string);
        tracing::debug!("{} <- {}", self.id, action);

        if let Err(reason) = self.session.admit(action) {
            tracing::warn!("Rejected {} on {}: {}", action, self.id, reason);
            self.reply(Message::error(reason, request_id));
            return;
        }

        match message {
            Message::Connect {
                user_id,
                request_id,
            } => self.connect(user_id, request_id).await,
            Message::UploadFile {
                file_name,
                file_data,
                project_id,
                request_id,
                ..
            } => {
                let request = UploadRequest {
                    file_name,
                    file_data,
                    project_id,
                };
                self.upload(request, request_id).await
            }
            Message::DownloadFile {
                project_id,
                request_id,
                ..
            } => self.download(project_id, request_id).await,
            Message::SubmitProject {
                project_id,
                status,
                request_id,
                ..
            } => self.submit(project_id, status, request_id).await,
            Message::GetProjectStatus {
                project_id,
                request_id,
                ..
            } => self.project_status(project_id, request_id).await,
            _ => self.reply(Message::error(
                format!("Unsupported action from client: {}", action),
                request_id,
            )),
        }
    }

    async fn connect(&mut self, user_id: String, request_id: Option<String>) {
        let handle = ClientHandle::new(self.id, self.outbound.clone());
        match self.state.connect_user_usecase.execute(user_id, handle).await {
            Ok(user_id) => {
                if let Some(previous) = self.session.bind(user_id.clone())
                    && previous != user_id
                {
                    self.state
                        .disconnect_user_usecase
                        .execute(&previous, self.id)
                        .await;
                }
                tracing::info!("{} bound to user '{}'", self.id, user_id);
                self.reply(Message::ConnectResponse {
                    status: ResponseStatus::Success,
                    message: format!("Connected as user {}", user_id),
                    request_id,
                });
            }
            Err(e) => self.reply_error("connect", e, request_id),
        }
    }

    async fn upload(&self, request: UploadRequest, request_id: Option<String>) {
        let usecase = &self.state.upload_file_usecase;
        match usecase.execute(request).await {
            Ok(outcome) => {
                self.reply(Message::UploadResponse {
                    status: ResponseStatus::Success,
                    message: "File uploaded successfully".to_string(),
                    file_path: outcome.file.path.clone(),
                    file_name: outcome.file.file_name.clone(),
                    file_size: outcome.file.size,
                    request_id,
                });
                let delivered = usecase.broadcast_submitted(&outcome).await;
                tracing::debug!("project_submitted delivered to {} clients", delivered);
            }
            Err(e) => self.reply_error("upload_file", e, request_id),
        }
    }

    async fn download(&self, project_id: i64, request_id: Option<String>) {
        match self.state.download_file_usecase.execute(project_id).await {
            Ok(file) => self.reply(Message::DownloadResponse {
                status: ResponseStatus::Success,
                file_name: file.file_name,
                file_data: file.file_data,
                file_size: file.file_size,
                request_id,
            }),
            Err(e) => self.reply_error("download_file", e, request_id),
        }
    }

    async fn submit(&self, project_id: i64, status: String, request_id: Option<String>) {
        let usecase = &self.state.submit_project_usecase;
        match usecase.execute(project_id, status).await {
            Ok(outcome) => {
                self.reply(Message::SubmitResponse {
                    status: ResponseStatus::Success,
                    message: format!(
                        "Project {} status updated to {}",
                        outcome.project_id, outcome.status
                    ),
                    request_id,
                });
                let delivered = usecase.broadcast_status_updated(&outcome).await;
                tracing::debug!("project_status_updated delivered to {} clients", delivered);
            }
            Err(e) => self.reply_error("submit_project", e, request_id),
        }
    }

    async fn project_status(&self, project_id: i64, request_id: Option<String>) {
        match self.state.get_project_status_usecase.execute(project_id).await {
            Ok(view) => self.reply(Message::ProjectStatusResponse {
                status: ResponseStatus::Success,
                project_id: view.project_id,
                project_status: view.status,
                title: view.title,
                submission_date: view.submission_date,
                request_id,
            }),
            Err(e) => self.reply_error("get_project_status", e, request_id),
        }
    }

    fn reply(&self, message: Message) {
        if self.outbound.send(message).is_err() {
            tracing::debug!("Dropped reply for {}: writer already stopped", self.id);
        }
    }

    fn reply_error(&self, action: &str, error: impl fmt::Display, request_id: Option<String>) {
        tracing::warn!("{} failed on {}: {}", action, self.id, error);
        self.reply(Message::error(error.to_string(), request_id));
    }

    /// Release the registry binding and drop the outbound sender.
    async fn close(mut self) {
        if let Some(user_id) = self.session.close() {
            self.state
                .disconnect_user_usecase
                .execute(&user_id, self.id)
                .await;
        }
    }
}
