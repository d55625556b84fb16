//! Shared building blocks for the Kadai file transfer service.
//!
//! Both the server and the client depend on this crate for the line-based
//! JSON wire protocol, the upload policy and the common utilities.

pub mod logger;
pub mod policy;
pub mod protocol;
pub mod time;
