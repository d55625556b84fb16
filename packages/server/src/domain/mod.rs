//! Domain layer for the file transfer service.
//!
//! This module contains business rules that are independent of the wire
//! protocol DTOs and of infrastructure concerns (TCP, filesystem, store).

pub mod entity;
pub mod error;
pub mod message_pusher;
pub mod repository;
pub mod storage;
pub mod value_object;

pub use entity::Project;
pub use error::{MessagePushError, RepositoryError, StorageError, ValueObjectError};
pub use message_pusher::{ClientHandle, MessagePusher, PusherChannel};
pub use repository::ProjectRepository;
pub use storage::{FileStorage, StoredFile};
pub use value_object::{
    ConnectionId, ConnectionIdFactory, FileName, ProjectId, ProjectStatus, Timestamp, UserId,
};
