//! Project record DTO.

use serde::{Deserialize, Serialize};

fn default_status() -> String {
    "in_progress".to_string()
}

/// Serialized project as stored in a seed file.
///
/// Dates are RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub submission_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
}
