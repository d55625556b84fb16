//! Conversion logic between DTOs and domain entities.

use chrono::DateTime;
use kadai_shared::time::millis_to_rfc3339;
use thiserror::Error;

use crate::domain::{Project, ProjectId, ProjectStatus, Timestamp, ValueObjectError};

use super::project::ProjectRecord;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Invalid project record: {0}")]
    InvalidField(#[from] ValueObjectError),

    #[error("Invalid date '{0}': expected RFC 3339")]
    InvalidDate(String),
}

fn parse_date(value: Option<String>) -> Result<Option<Timestamp>, ConversionError> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| Timestamp::new(dt.timestamp_millis()))
                .map_err(|_| ConversionError::InvalidDate(raw))
        })
        .transpose()
}

// ========================================
// DTO → Domain Entity
// ========================================

impl TryFrom<ProjectRecord> for Project {
    type Error = ConversionError;

    fn try_from(record: ProjectRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProjectId::new(record.id)?,
            title: record.title,
            description: record.description,
            status: ProjectStatus::new(record.status)?,
            file_paths: record.file_paths,
            submission_date: parse_date(record.submission_date)?,
            due_date: parse_date(record.due_date)?,
            assignee: record.assignee,
        })
    }
}

// ========================================
// Domain Entity → DTO
// ========================================

impl From<Project> for ProjectRecord {
    fn from(model: Project) -> Self {
        Self {
            id: model.id.value(),
            title: model.title,
            description: model.description,
            status: model.status.as_str().to_string(),
            file_paths: model.file_paths,
            submission_date: model.submission_date.map(|t| millis_to_rfc3339(t.value())),
            due_date: model.due_date.map(|t| millis_to_rfc3339(t.value())),
            assignee: model.assignee,
        }
    }
}
