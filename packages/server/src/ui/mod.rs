//! TCP transfer server implementation.

mod handler;
mod pool;
mod server;
mod signal;
pub mod state; // bin とテストから組み立てるため public

pub use pool::ConnectionPool;
pub use server::Server;
pub use signal::shutdown_signal;
