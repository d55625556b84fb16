//! Kadai file transfer and notification server.
//!
//! Accepts newline-delimited JSON over TCP, stores uploaded project files under
//! the upload root and broadcasts submissions to every connected client.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kadai-server
//! cargo run --bin kadai-server -- --port 9000 --seed-file packages/server/seed/projects.json
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use kadai_server::{
    config::{ConnectionSettings, ServerConfig},
    infrastructure::{
        message_pusher::ConnectionRegistry, repository::InMemoryProjectRepository,
        storage::LocalFileStorage,
    },
    ui::{Server, state::AppState},
};
use kadai_shared::{logger::setup_logger, policy::UploadPolicy, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "kadai-server")]
#[command(about = "Capstone project file transfer and notification server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8888")]
    port: u16,

    /// Directory uploaded files are written to
    #[arg(long, default_value = "uploads/projects")]
    upload_root: PathBuf,

    /// Maximum number of connections served concurrently
    #[arg(long, default_value = "50")]
    max_connections: usize,

    /// Close a connection after this many seconds without input
    #[arg(long, default_value = "300")]
    read_timeout_secs: u64,

    /// Close a connection when writing one message takes longer than this
    #[arg(long, default_value = "30")]
    write_timeout_secs: u64,

    /// Maximum length of an inbound line in bytes (unlimited if omitted)
    #[arg(long)]
    max_line_bytes: Option<usize>,

    /// Reject uploads larger than this many bytes (unlimited if omitted)
    #[arg(long)]
    max_file_bytes: Option<u64>,

    /// Accepted file extension without the dot; repeat for several (any if omitted)
    #[arg(long = "allowed-extension")]
    allowed_extensions: Vec<String>,

    /// JSON file with the projects to load into the in-memory store
    #[arg(long)]
    seed_file: Option<PathBuf>,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            upload_root: args.upload_root,
            max_connections: args.max_connections,
            connection: ConnectionSettings {
                read_timeout: Duration::from_secs(args.read_timeout_secs),
                write_timeout: Duration::from_secs(args.write_timeout_secs),
                max_line_bytes: args.max_line_bytes,
            },
            upload_policy: UploadPolicy::new(args.max_file_bytes, args.allowed_extensions),
            seed_file: args.seed_file,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(
        env!("CARGO_BIN_NAME"),
        "debug",
        &["kadai_server", "kadai_shared"],
    );

    let config = ServerConfig::from(Args::parse());

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize dependencies in order:
    // 1. Repository
    // 2. FileStorage
    // 3. MessagePusher
    // 4. UseCases (AppState)
    // 5. Server

    // 1. Create Repository (in-memory project store)
    let repository = match &config.seed_file {
        Some(path) => InMemoryProjectRepository::from_seed_file(path)?,
        None => {
            tracing::warn!("No --seed-file given, starting with an empty project store");
            InMemoryProjectRepository::default()
        }
    };
    tracing::info!("{} projects loaded", repository.count_projects().await);

    // 2. Open the upload root
    let storage = LocalFileStorage::open(&config.upload_root).await?;

    // 3. Create MessagePusher (connection registry)
    let message_pusher = Arc::new(ConnectionRegistry::new());

    if config.upload_policy.is_unrestricted() {
        tracing::info!("Server upload policy: unrestricted");
    } else {
        tracing::info!("Server upload policy: {:?}", config.upload_policy);
    }

    // 4. Create UseCases
    let state = AppState::new(
        Arc::new(repository),
        Arc::new(storage),
        message_pusher,
        Arc::new(SystemClock),
        config.upload_policy.clone(),
        config.connection.clone(),
    );

    // 5. Create and run the server
    let server = Server::new(state, config.max_connections);
    server.run(&config.host, config.port).await
}
