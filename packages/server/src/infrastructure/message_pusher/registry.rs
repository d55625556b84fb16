//! 接続レジストリを使った MessagePusher 実装
//!
//! ## 責務
//!
//! - user id と接続ハンドル（送信キュー + 接続 ID）の対応を管理
//! - クライアントへのメッセージ送信（push_to, broadcast）
//!
//! ## 設計ノート
//!
//! 接続の受付と送信キューの生成は UI 層（`ui::handler::connection`）で行われます。
//! レジストリは生成された sender を保持するだけで、ソケットは所有しません。
//! 各接続の writer タスクがキューを読み出してソケットに書き込みます。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use kadai_shared::protocol::Message;
use tokio::sync::Mutex;

use crate::domain::{ClientHandle, ConnectionId, MessagePushError, MessagePusher, UserId};

/// Connection registry owned by one server instance.
///
/// ## 使用例
///
/// ```ignore
/// let registry = ConnectionRegistry::new();
/// registry.register_client(user_id, ClientHandle::new(connection_id, tx)).await;
/// registry.broadcast(Message::notification(kind, "Project updated", None)).await;
/// ```
#[derive(Default)]
pub struct ConnectionRegistry {
    /// 接続中のクライアントのハンドル
    ///
    /// Key: user id
    /// Value: ClientHandle
    clients: Arc<Mutex<HashMap<UserId, ClientHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessagePusher for ConnectionRegistry {
    async fn register_client(
        &self,
        user_id: UserId,
        handle: ClientHandle,
    ) -> Option<ConnectionId> {
        let mut clients = self.clients.lock().await;
        let connection_id = handle.connection_id;
        let replaced = clients
            .insert(user_id.clone(), handle)
            .map(|previous| previous.connection_id);
        match replaced {
            Some(previous) => tracing::info!(
                "User '{}' re-registered: connection {} replaces {}",
                user_id,
                connection_id,
                previous
            ),
            None => tracing::debug!(
                "User '{}' registered with connection {}",
                user_id,
                connection_id
            ),
        }
        replaced
    }

    async fn unregister_client(&self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        let mut clients = self.clients.lock().await;
        match clients.get(user_id) {
            Some(current) if current.connection_id == connection_id => {
                clients.remove(user_id);
                tracing::debug!(
                    "User '{}' unregistered (connection {})",
                    user_id,
                    connection_id
                );
                true
            }
            Some(current) => {
                // 既に別の接続で置き換えられている
                tracing::debug!(
                    "Skip unregistering '{}': connection {} was replaced by {}",
                    user_id,
                    connection_id,
                    current.connection_id
                );
                false
            }
            None => false,
        }
    }

    async fn push_to(
        &self,
        user_id: &UserId,
        message: Message,
    ) -> Result<bool, MessagePushError> {
        let clients = self.clients.lock().await;

        let Some(handle) = clients.get(user_id) else {
            tracing::debug!("User '{}' is not connected, message dropped", user_id);
            return Ok(false);
        };
        handle
            .sender
            .send(message)
            .map_err(|e| MessagePushError::PushFailed(e.to_string()))?;
        tracing::debug!("Pushed message to user '{}'", user_id);
        Ok(true)
    }

    async fn broadcast(&self, message: Message) -> usize {
        let mut clients = self.clients.lock().await;
        let registered = clients.len();

        let mut delivered = 0;
        // ブロードキャストでは一部の送信失敗を許容し、閉じた接続は登録から外す
        clients.retain(|user_id, handle| match handle.sender.send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to push message to user '{}', dropping connection {}: {}",
                    user_id,
                    handle.connection_id,
                    e
                );
                false
            }
        });
        tracing::debug!(
            "Broadcasted {} to {}/{} connections",
            message.action(),
            delivered,
            registered
        );
        delivered
    }

    async fn connected_users(&self) -> Vec<UserId> {
        let clients = self.clients.lock().await;
        clients.keys().cloned().collect()
    }
}
