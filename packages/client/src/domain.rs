//! Domain logic for client-side operations.
//!
//! This module contains pure functions that implement business logic
//! without side effects, making them easy to test.

use std::path::{Path, PathBuf};

use crate::error::ClientError;

/// Check if the client should exit immediately based on the error type.
///
/// # Returns
///
/// `true` if the server rejected the connect itself (retrying with the same
/// userId cannot succeed), `false` otherwise
pub fn should_exit_immediately(error: &ClientError) -> bool {
    matches!(error, ClientError::Rejected(_))
}

/// Check if the client should attempt to reconnect.
///
/// # Arguments
///
/// * `error` - The client error that occurred
/// * `current_attempt` - The current reconnection attempt count (0-indexed)
/// * `max_attempts` - The maximum number of reconnection attempts allowed
///
/// # Returns
///
/// `true` if reconnection should be attempted, `false` otherwise
pub fn should_attempt_reconnect(
    error: &ClientError,
    current_attempt: u32,
    max_attempts: u32,
) -> bool {
    // Don't reconnect if the error requires immediate exit
    if should_exit_immediately(error) {
        return false;
    }

    // Don't reconnect if we've exhausted all attempts
    current_attempt < max_attempts
}

/// Where a downloaded file is written.
///
/// An explicit `output` is used as given. Otherwise only the final component
/// of the server-supplied `file_name` is kept, so the file always lands in
/// the current directory.
///
/// # Returns
///
/// `None` if `file_name` has no usable final component (e.g. `..` or empty)
pub fn download_target(output: Option<&Path>, file_name: &str) -> Option<PathBuf> {
    match output {
        Some(output) => Some(output.to_path_buf()),
        None => Path::new(file_name).file_name().map(PathBuf::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_target_strips_directories_from_server_name() {
        // テスト項目: サーバーから届いたファイル名のディレクトリ部分は取り除かれる
        // given (前提条件):
        let names = ["../../.bashrc", "/etc/passwd", "project_3_1.pdf"];

        // when (操作):
        let targets: Vec<_> = names
            .iter()
            .map(|name| download_target(None, name))
            .collect();

        // then (期待する結果):
        assert_eq!(
            targets,
            vec![
                Some(PathBuf::from(".bashrc")),
                Some(PathBuf::from("passwd")),
                Some(PathBuf::from("project_3_1.pdf")),
            ]
        );
    }

    #[test]
    fn test_download_target_rejects_unusable_names() {
        // テスト項目: 最終要素の無いファイル名は保存先にならない
        // given (前提条件):
        let names = ["..", ""];

        // when (操作):
        let targets: Vec<_> = names
            .iter()
            .map(|name| download_target(None, name))
            .collect();

        // then (期待する結果):
        assert_eq!(targets, vec![None, None]);
    }

    #[test]
    fn test_download_target_prefers_explicit_output() {
        // テスト項目: 保存先が指定されていればそのパスを使う
        // given (前提条件):
        let output = Path::new("out/report.pdf");

        // when (操作):
        let target = download_target(Some(output), "../../.bashrc");

        // then (期待する結果):
        assert_eq!(target, Some(PathBuf::from("out/report.pdf")));
    }

    #[test]
    fn test_should_exit_immediately_when_rejected() {
        // テスト項目: connect が拒否された場合、即座に終了すべきと判定される
        // given (前提条件):
        let error = ClientError::Rejected("Validation error: userId cannot be empty".to_string());

        // when (操作):
        let result = should_exit_immediately(&error);

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_should_exit_immediately_with_connection_error() {
        // テスト項目: Connection エラーの場合、即座に終了すべきではないと判定される
        // given (前提条件):
        let error = ClientError::Connection("connection refused".to_string());

        // when (操作):
        let result = should_exit_immediately(&error);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_should_attempt_reconnect_when_rejected() {
        // テスト項目: connect が拒否された場合、再接続すべきではないと判定される
        // given (前提条件):
        let error = ClientError::Rejected("bad userId".to_string());

        // when (操作):
        let result = should_attempt_reconnect(&error, 0, 5);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_should_attempt_reconnect_within_limit() {
        // テスト項目: 再接続回数が上限未満の場合、再接続すべきと判定される
        // given (前提条件):
        let error = ClientError::Connection("network error".to_string());

        // when (操作):
        let result = should_attempt_reconnect(&error, 3, 5);

        // then (期待する結果):
        assert!(result);
    }

    #[test]
    fn test_should_attempt_reconnect_at_limit() {
        // テスト項目: 再接続回数が上限に達した場合、再接続すべきではないと判定される
        // given (前提条件):
        let error = ClientError::Connection("network error".to_string());

        // when (操作):
        let result = should_attempt_reconnect(&error, 5, 5);

        // then (期待する結果):
        assert!(!result);
    }

    #[test]
    fn test_should_attempt_reconnect_after_timeout() {
        // テスト項目: タイムアウトは一時的なエラーとして再接続の対象になる
        // given (前提条件):
        let error = ClientError::Timeout(std::time::Duration::from_secs(5));

        // when (操作):
        let result = should_attempt_reconnect(&error, 0, 5);

        // then (期待する結果):
        assert!(result);
    }
}
