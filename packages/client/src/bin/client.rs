//! Kadai command line client.
//!
//! Uploads and downloads project files, queries and changes project status,
//! and prints server notifications. `watch` reconnects automatically on
//! disconnection (max 5 attempts with 5 second interval); a connect rejected
//! by the server exits immediately.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kadai-client -- --user-id 7 upload 3 ./report.pdf
//! cargo run --bin kadai-client -- -u 7 status 3
//! cargo run --bin kadai-client -- -u 7 watch
//! cargo run --bin kadai-client -- -u 7 shell
//! ```

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use kadai_client::{ClientConfig, Command, run_command, run_shell, run_watch};
use kadai_shared::{
    logger::setup_logger,
    policy::{DESKTOP_MAX_FILE_BYTES, UploadPolicy},
    protocol::{DEFAULT_HOST, DEFAULT_PORT},
};

#[derive(Parser, Debug)]
#[command(name = "kadai-client")]
#[command(about = "Capstone project file transfer client", long_about = None)]
struct Args {
    /// User id sent with `connect`
    #[arg(short = 'u', long)]
    user_id: String,

    /// Server host
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Refuse to upload files larger than this many bytes
    #[arg(long, default_value_t = DESKTOP_MAX_FILE_BYTES)]
    max_file_bytes: u64,

    /// Accepted file extension without the dot; repeat for several
    #[arg(long = "allowed-extension", default_value = "pdf")]
    allowed_extensions: Vec<String>,

    /// Give up waiting for a response after this many seconds
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload a file to a project
    Upload { project_id: i64, path: PathBuf },
    /// Download the latest file of a project
    Download {
        project_id: i64,
        /// Output path (defaults to the stored file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the status of a project
    Status { project_id: i64 },
    /// Change the status of a project
    Submit { project_id: i64, status: String },
    /// Print notifications until Ctrl+C
    Watch,
    /// Interactive shell
    Shell,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info", &["kadai_client"]);

    let args = Args::parse();

    let config = ClientConfig {
        host: args.host,
        port: args.port,
        upload_policy: UploadPolicy::new(Some(args.max_file_bytes), args.allowed_extensions),
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        ..ClientConfig::default()
    };

    let result = match args.command {
        Commands::Upload { project_id, path } => {
            run_command(config, args.user_id, Command::Upload { project_id, path }).await
        }
        Commands::Download { project_id, output } => {
            run_command(
                config,
                args.user_id,
                Command::Download { project_id, output },
            )
            .await
        }
        Commands::Status { project_id } => {
            run_command(config, args.user_id, Command::Status { project_id }).await
        }
        Commands::Submit { project_id, status } => {
            run_command(
                config,
                args.user_id,
                Command::Submit { project_id, status },
            )
            .await
        }
        Commands::Watch => run_watch(config, args.user_id).await,
        Commands::Shell => run_shell(config, args.user_id).await,
    };

    // Run the client
    if let Err(e) = result {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
