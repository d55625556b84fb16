//! Upload storage implementations.

pub mod local;

pub use local::LocalFileStorage;
