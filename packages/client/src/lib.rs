//! Kadai client library.
//!
//! [`session::SocketClient`] keeps one connection to the server and exposes
//! every protocol operation as a future; notifications arrive on a separate
//! event channel. The `kadai-client` binary builds its one-shot commands,
//! `watch` and `shell` on top of it.

pub mod error;
pub mod progress;
pub mod runner;
pub mod session;

mod domain;
mod formatter;
mod shell;
mod ui;

pub use error::ClientError;
pub use runner::{Command, run_command, run_shell, run_watch};
pub use session::{ClientConfig, ClientEvent, SocketClient};
