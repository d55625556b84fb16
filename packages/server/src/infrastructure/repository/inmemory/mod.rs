//! In-memory repositories.

pub mod project;

pub use project::{InMemoryProjectRepository, SeedError};
