//! Message model for the wire protocol.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::now_rfc3339;

/// Discriminator carried in the `action` field of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Connect,
    ConnectResponse,
    UploadFile,
    UploadResponse,
    DownloadFile,
    DownloadResponse,
    SubmitProject,
    SubmitResponse,
    GetProjectStatus,
    ProjectStatusResponse,
    Notification,
    Error,
}

impl Action {
    pub const ALL: [Action; 12] = [
        Action::Connect,
        Action::ConnectResponse,
        Action::UploadFile,
        Action::UploadResponse,
        Action::DownloadFile,
        Action::DownloadResponse,
        Action::SubmitProject,
        Action::SubmitResponse,
        Action::GetProjectStatus,
        Action::ProjectStatusResponse,
        Action::Notification,
        Action::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Connect => "connect",
            Action::ConnectResponse => "connect_response",
            Action::UploadFile => "upload_file",
            Action::UploadResponse => "upload_response",
            Action::DownloadFile => "download_file",
            Action::DownloadResponse => "download_response",
            Action::SubmitProject => "submit_project",
            Action::SubmitResponse => "submit_response",
            Action::GetProjectStatus => "get_project_status",
            Action::ProjectStatusResponse => "project_status_response",
            Action::Notification => "notification",
            Action::Error => "error",
        }
    }

    pub fn from_name(name: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|action| action.as_str() == name)
    }

    /// Whether the action is sent by clients (as opposed to the server).
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Action::Connect
                | Action::UploadFile
                | Action::DownloadFile
                | Action::SubmitProject
                | Action::GetProjectStatus
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `status` field of server responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// `type` field of notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ProjectSubmitted,
    ProjectStatusUpdated,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::ProjectSubmitted => f.write_str("project_submitted"),
            NotificationKind::ProjectStatusUpdated => f.write_str("project_status_updated"),
        }
    }
}

/// A single protocol message.
///
/// Request fields default to empty values when absent so that a missing
/// field is reported as a validation error instead of a malformed frame.
/// `requestId` is optional everywhere; the server echoes it on responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "action",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum Message {
    Connect {
        #[serde(default)]
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    ConnectResponse {
        status: ResponseStatus,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    UploadFile {
        #[serde(default)]
        file_name: String,
        #[serde(default)]
        file_data: String,
        #[serde(default)]
        project_id: i64,
        #[serde(default)]
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    UploadResponse {
        status: ResponseStatus,
        message: String,
        file_path: String,
        file_name: String,
        file_size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    DownloadFile {
        #[serde(default)]
        project_id: i64,
        #[serde(default)]
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    DownloadResponse {
        status: ResponseStatus,
        file_name: String,
        file_data: String,
        file_size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    SubmitProject {
        #[serde(default)]
        project_id: i64,
        #[serde(default)]
        status: String,
        #[serde(default)]
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    SubmitResponse {
        status: ResponseStatus,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    GetProjectStatus {
        #[serde(default)]
        project_id: i64,
        #[serde(default)]
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    ProjectStatusResponse {
        status: ResponseStatus,
        project_id: i64,
        project_status: String,
        title: String,
        submission_date: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
    Notification {
        #[serde(rename = "type")]
        kind: NotificationKind,
        message: String,
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_id: Option<i64>,
    },
    Error {
        status: ResponseStatus,
        message: String,
        timestamp: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl Message {
    /// Build an `error` message stamped with the current time.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        Message::Error {
            status: ResponseStatus::Error,
            message: message.into(),
            timestamp: now_rfc3339(),
            request_id,
        }
    }

    /// Build a `notification` message stamped with the current time.
    pub fn notification(
        kind: NotificationKind,
        message: impl Into<String>,
        project_id: Option<i64>,
    ) -> Self {
        Message::Notification {
            kind,
            message: message.into(),
            timestamp: now_rfc3339(),
            project_id,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Message::Connect { .. } => Action::Connect,
            Message::ConnectResponse { .. } => Action::ConnectResponse,
            Message::UploadFile { .. } => Action::UploadFile,
            Message::UploadResponse { .. } => Action::UploadResponse,
            Message::DownloadFile { .. } => Action::DownloadFile,
            Message::DownloadResponse { .. } => Action::DownloadResponse,
            Message::SubmitProject { .. } => Action::SubmitProject,
            Message::SubmitResponse { .. } => Action::SubmitResponse,
            Message::GetProjectStatus { .. } => Action::GetProjectStatus,
            Message::ProjectStatusResponse { .. } => Action::ProjectStatusResponse,
            Message::Notification { .. } => Action::Notification,
            Message::Error { .. } => Action::Error,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            Message::Connect { request_id, .. }
            | Message::ConnectResponse { request_id, .. }
            | Message::UploadFile { request_id, .. }
            | Message::UploadResponse { request_id, .. }
            | Message::DownloadFile { request_id, .. }
            | Message::DownloadResponse { request_id, .. }
            | Message::SubmitProject { request_id, .. }
            | Message::SubmitResponse { request_id, .. }
            | Message::GetProjectStatus { request_id, .. }
            | Message::ProjectStatusResponse { request_id, .. }
            | Message::Error { request_id, .. } => request_id.as_deref(),
            Message::Notification { .. } => None,
        }
    }

    /// Responses answer exactly one request; notifications are unsolicited.
    pub fn is_response(&self) -> bool {
        !self.action().is_request() && !matches!(self, Message::Notification { .. })
    }
}

/// Why an inbound line could not be turned into a [`Message`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    #[error("Invalid message format: {0}")]
    Malformed(String),

    #[error("Message has no action")]
    MissingAction,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid fields for {action}: {reason}")]
    InvalidFields { action: Action, reason: String },
}

/// Decode failure, with the `requestId` of the offending line when one could
/// be recovered so the error response can still be correlated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub request_id: Option<String>,
}

/// Decode one line (without its terminator) into a [`Message`].
pub fn decode_line(line: &str) -> Result<Message, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|e| DecodeError {
        kind: DecodeErrorKind::Malformed(e.to_string()),
        request_id: None,
    })?;

    let request_id = value
        .get("requestId")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);
    let fail = |kind| DecodeError {
        kind,
        request_id: request_id.clone(),
    };

    if !value.is_object() {
        return Err(fail(DecodeErrorKind::Malformed(
            "expected a JSON object".to_string(),
        )));
    }
    let name = value
        .get("action")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| fail(DecodeErrorKind::MissingAction))?;
    let action = Action::from_name(name)
        .ok_or_else(|| fail(DecodeErrorKind::UnknownAction(name.to_string())))?;

    serde_json::from_value(value).map_err(|e| {
        fail(DecodeErrorKind::InvalidFields {
            action,
            reason: e.to_string(),
        })
    })
}

/// Encode a [`Message`] as a single JSON line (without the terminator).
pub fn encode_line(message: &Message) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}
