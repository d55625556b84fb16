//! Kadai server library.
//!
//! TCP server that receives capstone project files over newline-delimited
//! JSON, stores them under an upload root, and notifies every connected
//! client when a project is submitted or its status changes.

pub mod config;

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
