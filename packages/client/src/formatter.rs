//! Message formatting utilities for client display.

use chrono::{DateTime, Local};
use kadai_shared::protocol::NotificationKind;

use crate::session::{DownloadedFile, ProjectStatusInfo, UploadReceipt};

const RULE: &str = "============================================================";

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Render an RFC 3339 timestamp in local time, or as-is if it does not parse.
    pub fn format_timestamp(rfc3339: &str) -> String {
        DateTime::parse_from_rfc3339(rfc3339)
            .map(|at| {
                at.with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|_| rfc3339.to_string())
    }

    /// Format a server notification
    ///
    /// # Arguments
    ///
    /// * `kind` - `project_submitted` or `project_status_updated`
    /// * `message` - Human readable text sent by the server
    /// * `timestamp` - RFC 3339 time the server sent it
    /// * `project_id` - Project the notification is about, if known
    pub fn format_notification(
        kind: NotificationKind,
        message: &str,
        timestamp: &str,
        project_id: Option<i64>,
    ) -> String {
        let project = project_id
            .map(|id| format!(" (project {})", id))
            .unwrap_or_default();
        format!(
            "\n\n------------------------------------------------------------\n\
             [{}]{} {}\n\
             at {}\n\
             ------------------------------------------------------------\n",
            kind,
            project,
            message,
            Self::format_timestamp(timestamp)
        )
    }

    pub fn format_server_error(message: &str) -> String {
        format!("\n! Server error: {}\n", message)
    }

    pub fn format_upload(receipt: &UploadReceipt) -> String {
        format!(
            "{}\nStored as {} ({} bytes)\nPath: {}\n",
            receipt.message, receipt.file_name, receipt.file_size, receipt.file_path
        )
    }

    pub fn format_download(file: &DownloadedFile, saved_to: &str) -> String {
        format!(
            "Downloaded {} ({} bytes) to {}\n",
            file.file_name,
            file.data.len(),
            saved_to
        )
    }

    /// Format a project status as a small table
    pub fn format_status(status: &ProjectStatusInfo) -> String {
        let submitted = status
            .submission_date
            .as_deref()
            .map(Self::format_timestamp)
            .unwrap_or_else(|| "not submitted".to_string());
        format!(
            "{RULE}\nProject {}: {}\nStatus:    {}\nSubmitted: {}\n{RULE}\n",
            status.project_id, status.title, status.status, submitted
        )
    }

    /// Format a progress bar, e.g. `upload [#####-----]  50%`
    pub fn format_progress(label: &str, percent: u8) -> String {
        let filled = usize::from(percent.min(100) / 10);
        format!(
            "{} [{}{}] {:>3}%",
            label,
            "#".repeat(filled),
            "-".repeat(10 - filled),
            percent
        )
    }
}
