//! Coarse progress reporting for uploads and downloads.
//!
//! The reported values are illustrative only: a timer steps from 0 to 90 in
//! increments of 10 every 100 ms and holds at 90 until the request finishes.
//! 100 is reported only when the request succeeds. No byte counts are
//! involved.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;

/// Receives progress in percent (0..=100).
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);
pub const PROGRESS_STEP: u8 = 10;
/// Highest value reported while the request is still in flight.
pub const PROGRESS_CEILING: u8 = 90;
pub const PROGRESS_DONE: u8 = 100;

/// Time-based progress ticker for one request.
pub struct ProgressTicker {
    callback: Option<ProgressCallback>,
    task: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    /// Start ticking. Without a callback this does nothing.
    pub fn start(callback: Option<ProgressCallback>) -> Self {
        let task = callback.clone().map(|callback| {
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
                let mut percent = 0;
                loop {
                    interval.tick().await;
                    callback(percent);
                    if percent >= PROGRESS_CEILING {
                        break;
                    }
                    percent += PROGRESS_STEP;
                }
            })
        });
        Self { callback, task }
    }

    /// Stop ticking, reporting 100 if the request succeeded.
    pub fn finish(mut self, success: bool) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if success && let Some(callback) = &self.callback {
            callback(PROGRESS_DONE);
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |percent| {
            sink.lock().unwrap().push(percent);
        });
        (callback, seen)
    }

    #[tokio::test]
    async fn test_progress_ends_at_100_on_success() {
        // テスト項目: 成功時は 10 刻みで増加し、最後に 100 が通知される
        // given (前提条件):
        let (callback, seen) = recorder();
        let ticker = ProgressTicker::start(Some(callback));

        // when (操作):
        tokio::time::sleep(Duration::from_millis(350)).await;
        ticker.finish(true);

        // then (期待する結果):
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&PROGRESS_DONE));
        let in_flight = &seen[..seen.len() - 1];
        assert!(in_flight.windows(2).all(|w| w[1] == w[0] + PROGRESS_STEP));
        assert!(in_flight.iter().all(|p| *p <= PROGRESS_CEILING));
    }

    #[tokio::test]
    async fn test_progress_holds_at_ceiling() {
        // テスト項目: 処理が長引いても 90 で止まり、失敗時は 100 にならない
        // given (前提条件):
        let (callback, seen) = recorder();
        let ticker = ProgressTicker::start(Some(callback));

        // when (操作):
        tokio::time::sleep(Duration::from_millis(1_300)).await;
        ticker.finish(false);

        // then (期待する結果):
        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
    }

    #[tokio::test]
    async fn test_without_callback_is_noop() {
        // テスト項目: コールバックが無い場合は何もしない
        // given (前提条件):
        let ticker = ProgressTicker::start(None);

        // when (操作):
        ticker.finish(true);

        // then (期待する結果): パニックしない
    }
}
