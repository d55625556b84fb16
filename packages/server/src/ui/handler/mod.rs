//! Connection handlers.

mod connection;
mod session;

pub use connection::handle_connection;
