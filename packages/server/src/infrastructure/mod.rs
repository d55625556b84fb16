//! Infrastructure layer: concrete implementations of the domain traits.
//!
//! - `repository`: project store implementations
//! - `message_pusher`: connection registry and broadcaster
//! - `storage`: upload root on the local filesystem
//! - `dto`: serialized forms of domain entities

pub mod dto;
pub mod message_pusher;
pub mod repository;
pub mod storage;
