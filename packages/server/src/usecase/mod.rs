//! UseCase layer: one use case per protocol action.
//!
//! Use cases depend only on the domain traits (`ProjectRepository`,
//! `FileStorage`, `MessagePusher`) and return domain outcomes; the UI layer
//! turns them into wire messages.

pub mod connect_user;
pub mod disconnect_user;
pub mod download_file;
pub mod error;
pub mod get_project_status;
pub mod project_lock;
pub mod submit_project;
pub mod upload_file;

pub use connect_user::ConnectUserUseCase;
pub use disconnect_user::DisconnectUserUseCase;
pub use download_file::{DownloadFileUseCase, DownloadedFile};
pub use error::UseCaseError;
pub use get_project_status::{GetProjectStatusUseCase, ProjectStatusView};
pub use project_lock::ProjectLocks;
pub use submit_project::{SubmitOutcome, SubmitProjectUseCase};
pub use upload_file::{UploadFileUseCase, UploadOutcome, UploadRequest};
