//! UseCase: ユーザー切断処理

use std::sync::Arc;

use crate::domain::{ConnectionId, MessagePusher, UserId};

/// ユーザー切断のユースケース
pub struct DisconnectUserUseCase {
    message_pusher: Arc<dyn MessagePusher>,
}

impl DisconnectUserUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>) -> Self {
        Self { message_pusher }
    }

    /// 接続の登録を解除
    ///
    /// 登録が既に別の接続に置き換わっている場合は何もしない。
    ///
    /// # Returns
    ///
    /// 登録を削除した場合は `true`
    pub async fn execute(&self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        let removed = self
            .message_pusher
            .unregister_client(user_id, connection_id)
            .await;
        if removed {
            tracing::info!("User '{}' disconnected ({})", user_id, connection_id);
        } else {
            tracing::debug!(
                "User '{}' already rebound, keeping the newer connection ({} closed)",
                user_id,
                connection_id
            );
        }
        removed
    }
}
