//! MessagePusher trait 定義
//!
//! 接続中のクライアントへのメッセージ送信（通知）の抽象化です。
//! 具体的な実装は Infrastructure 層（`infrastructure::message_pusher`）が提供します。

use async_trait::async_trait;
use kadai_shared::protocol::Message;
use tokio::sync::mpsc;

use super::{ConnectionId, MessagePushError, UserId};

/// Outbound queue of one connection, drained by its writer task.
pub type PusherChannel = mpsc::UnboundedSender<Message>;

/// Registry handle of a live connection.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub connection_id: ConnectionId,
    pub sender: PusherChannel,
}

impl ClientHandle {
    pub fn new(connection_id: ConnectionId, sender: PusherChannel) -> Self {
        Self {
            connection_id,
            sender,
        }
    }
}

/// Routes messages to connected clients by user id.
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// Register a connection under `user_id`, replacing any previous entry.
    ///
    /// Returns the id of the replaced connection. The replaced connection is
    /// not closed; it simply stops receiving routed messages.
    async fn register_client(&self, user_id: UserId, handle: ClientHandle)
    -> Option<ConnectionId>;

    /// Remove the entry for `user_id` only if it still belongs to
    /// `connection_id`. Returns whether an entry was removed.
    async fn unregister_client(&self, user_id: &UserId, connection_id: ConnectionId) -> bool;

    /// Send to a single user. `Ok(false)` if the user is not registered.
    async fn push_to(&self, user_id: &UserId, message: Message)
    -> Result<bool, MessagePushError>;

    /// Best-effort send to every registered connection.
    ///
    /// Failures are logged and the failed connection is unregistered.
    /// Returns the number of connections the message was handed to.
    async fn broadcast(&self, message: Message) -> usize;

    /// Snapshot of the registered user ids.
    async fn connected_users(&self) -> Vec<UserId>;
}
