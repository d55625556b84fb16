//! Server configuration.

use std::{path::PathBuf, time::Duration};

use kadai_shared::{policy::UploadPolicy, protocol::DEFAULT_PORT};

use crate::infrastructure::storage::local::DEFAULT_UPLOAD_ROOT;

pub const DEFAULT_BIND_HOST: &str = "127.0.0.1";
pub const DEFAULT_MAX_CONNECTIONS: usize = 50;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-connection limits applied by the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Idle time after which a silent connection is closed
    pub read_timeout: Duration,
    /// Upper bound for writing one message to the socket
    pub write_timeout: Duration,
    /// Maximum inbound line length in bytes, unlimited if `None`
    pub max_line_bytes: Option<usize>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_line_bytes: None,
        }
    }
}

/// Everything the server binary needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_root: PathBuf,
    /// Size of the connection worker pool
    pub max_connections: usize,
    pub connection: ConnectionSettings,
    pub upload_policy: UploadPolicy,
    /// JSON list of projects loaded into the in-memory store
    pub seed_file: Option<PathBuf>,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            upload_root: PathBuf::from(DEFAULT_UPLOAD_ROOT),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connection: ConnectionSettings::default(),
            upload_policy: UploadPolicy::unrestricted(),
            seed_file: None,
        }
    }
}
