//! UseCase: ユーザー接続処理
//!
//! `connect` メッセージで接続に userId を紐付け、通知の宛先として登録します。
//! 同じ userId で再接続した場合は後から来た接続で上書きされます。

use std::sync::Arc;

use crate::domain::{ClientHandle, MessagePusher, UserId};

use super::error::UseCaseError;

/// ユーザー接続のユースケース
pub struct ConnectUserUseCase {
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
}

impl ConnectUserUseCase {
    pub fn new(message_pusher: Arc<dyn MessagePusher>) -> Self {
        Self { message_pusher }
    }

    /// 接続を登録
    ///
    /// # Arguments
    ///
    /// * `user_id` - `connect` メッセージの userId（未検証）
    /// * `handle` - 接続の送信チャンネルと接続 ID
    ///
    /// # Returns
    ///
    /// * `Ok(UserId)` - 登録された userId
    /// * `Err(UseCaseError::Validation)` - userId が空または長すぎる
    pub async fn execute(
        &self,
        user_id: String,
        handle: ClientHandle,
    ) -> Result<UserId, UseCaseError> {
        let user_id = UserId::new(user_id)?;
        let connection_id = handle.connection_id;

        if let Some(replaced) = self
            .message_pusher
            .register_client(user_id.clone(), handle)
            .await
            && replaced != connection_id
        {
            tracing::info!(
                "User '{}' moved from connection {} to {}",
                user_id,
                replaced,
                connection_id
            );
        }

        Ok(user_id)
    }
}
