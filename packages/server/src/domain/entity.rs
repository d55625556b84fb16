//! Entities for the domain model.

use super::value_object::{ProjectId, ProjectStatus, Timestamp};

/// Capstone project as seen by the transfer service.
///
/// The schema belongs to the external store; this is the subset the service
/// reads and updates. `file_paths` is append-only and ordered, so the last
/// element is the latest submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub description: String,
    pub status: ProjectStatus,
    pub file_paths: Vec<String>,
    pub submission_date: Option<Timestamp>,
    pub due_date: Option<Timestamp>,
    pub assignee: Option<String>,
}

impl Project {
    /// Create a project without files or dates.
    pub fn new(id: ProjectId, title: impl Into<String>, status: ProjectStatus) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            status,
            file_paths: Vec::new(),
            submission_date: None,
            due_date: None,
            assignee: None,
        }
    }

    /// Most recently appended file path.
    pub fn latest_file(&self) -> Option<&str> {
        self.file_paths.last().map(String::as_str)
    }

    /// Append a submitted file and stamp the submission date.
    pub fn attach_file(&mut self, file_path: impl Into<String>, at: Timestamp) {
        self.file_paths.push(file_path.into());
        self.record_submission(at);
    }

    pub fn record_submission(&mut self, at: Timestamp) {
        self.submission_date = Some(at);
    }

    /// Change the status. Moving to the submitted state also stamps the
    /// submission date.
    ///
    /// # Returns
    ///
    /// `true` if the submission date was updated
    pub fn change_status(&mut self, status: ProjectStatus, at: Timestamp) -> bool {
        let submitted = status.is_submitted();
        self.status = status;
        if submitted {
            self.record_submission(at);
        }
        submitted
    }
}
