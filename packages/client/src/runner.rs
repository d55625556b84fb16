//! Client execution logic: one-shot commands and `watch` with reconnection support.

use std::{path::PathBuf, sync::Arc, time::Duration};

use tokio::sync::mpsc;

use crate::{
    domain::{download_target, should_attempt_reconnect, should_exit_immediately},
    error::ClientError,
    formatter::MessageFormatter,
    progress::ProgressCallback,
    session::{ClientConfig, ClientEvent, SocketClient},
    shell::run_shell_session,
    ui::print_progress,
};

const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_INTERVAL_SECS: u64 = 5;

/// A single request issued from the command line or the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Upload {
        project_id: i64,
        path: PathBuf,
    },
    Download {
        project_id: i64,
        /// Where to save the file; defaults to its server-side name in the
        /// current directory
        output: Option<PathBuf>,
    },
    Status {
        project_id: i64,
    },
    Submit {
        project_id: i64,
        status: String,
    },
}

/// Connect, run one command, print its result and disconnect.
pub async fn run_command(
    config: ClientConfig,
    user_id: String,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut client, _events) = SocketClient::new(config);
    client.connect(&user_id).await?;

    let result = execute(&client, &command, true).await;
    client.disconnect().await;

    print!("{}", result?);
    Ok(())
}

/// Run one command on an open connection and return the text to show.
pub(crate) async fn execute(
    client: &SocketClient,
    command: &Command,
    show_progress: bool,
) -> Result<String, ClientError> {
    let progress = |label: &'static str| -> Option<ProgressCallback> {
        if !show_progress {
            return None;
        }
        let callback: ProgressCallback =
            Arc::new(move |percent: u8| print_progress(label, percent));
        Some(callback)
    };

    match command {
        Command::Upload { project_id, path } => {
            let receipt = client
                .upload_file(*project_id, path, progress("upload"))
                .await?;
            Ok(MessageFormatter::format_upload(&receipt))
        }
        Command::Download { project_id, output } => {
            let file = client
                .download_file(*project_id, progress("download"))
                .await?;
            let target = download_target(output.as_deref(), &file.file_name).ok_or_else(|| {
                ClientError::File {
                    path: file.file_name.clone(),
                    message: "server sent an unusable file name".to_string(),
                }
            })?;
            tokio::fs::write(&target, &file.data)
                .await
                .map_err(|e| ClientError::File {
                    path: target.display().to_string(),
                    message: e.to_string(),
                })?;
            Ok(MessageFormatter::format_download(
                &file,
                &target.display().to_string(),
            ))
        }
        Command::Status { project_id } => {
            let status = client.project_status(*project_id).await?;
            Ok(MessageFormatter::format_status(&status))
        }
        Command::Submit { project_id, status } => {
            let message = client.submit_project(*project_id, status).await?;
            Ok(format!("{}\n", message))
        }
    }
}

/// Print notifications until Ctrl+C, reconnecting when the connection is lost.
pub async fn run_watch(
    config: ClientConfig,
    user_id: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.addr();
    let (mut client, mut events) = SocketClient::new(config);
    let mut reconnect_count = 0;

    loop {
        tracing::info!(
            "Attempting to connect to {} as '{}' (attempt {}/{})",
            addr,
            user_id,
            reconnect_count + 1,
            MAX_RECONNECT_ATTEMPTS
        );

        match watch_session(&mut client, &user_id, &mut events, &mut reconnect_count).await {
            Ok(()) => {
                tracing::info!("Watch ended");
                break;
            }
            Err(e) => {
                if should_exit_immediately(&e) {
                    tracing::error!(
                        "Cannot connect as '{}': the server rejected the user id. Exiting.",
                        user_id
                    );
                    return Err(Box::new(e));
                }

                tracing::warn!("Connection lost: {}", e);
                reconnect_count += 1;

                if !should_attempt_reconnect(&e, reconnect_count, MAX_RECONNECT_ATTEMPTS) {
                    tracing::error!(
                        "Failed to reconnect after {} attempts. Exiting.",
                        MAX_RECONNECT_ATTEMPTS
                    );
                    return Err(Box::new(e));
                }

                tracing::info!(
                    "Reconnecting in {} seconds... (attempt {}/{})",
                    RECONNECT_INTERVAL_SECS,
                    reconnect_count + 1,
                    MAX_RECONNECT_ATTEMPTS
                );

                tokio::time::sleep(Duration::from_secs(RECONNECT_INTERVAL_SECS)).await;
            }
        }
    }

    Ok(())
}

/// One connection's worth of `watch`. `Ok` means the user stopped watching.
async fn watch_session(
    client: &mut SocketClient,
    user_id: &str,
    events: &mut mpsc::UnboundedReceiver<ClientEvent>,
    reconnect_count: &mut u32,
) -> Result<(), ClientError> {
    // 前の接続のイベントを捨てる
    while events.try_recv().is_ok() {}

    client.connect(user_id).await?;
    *reconnect_count = 0;
    println!(
        "\nWatching notifications as '{}'. Press Ctrl+C to exit.\n",
        user_id
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                client.disconnect().await;
                return Ok(());
            }
            event = events.recv() => match event {
                Some(ClientEvent::Notification { kind, message, timestamp, project_id }) => {
                    let formatted =
                        MessageFormatter::format_notification(kind, &message, &timestamp, project_id);
                    print!("{}", formatted);
                }
                Some(ClientEvent::ServerError { message }) => {
                    print!("{}", MessageFormatter::format_server_error(&message));
                }
                Some(ClientEvent::Connected { .. }) => {}
                Some(ClientEvent::Disconnected) | None => {
                    client.disconnect().await;
                    return Err(ClientError::Connection("Connection lost".to_string()));
                }
            },
        }
    }
}

/// Connect and run the interactive shell until the user quits.
pub async fn run_shell(
    config: ClientConfig,
    user_id: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut client, mut events) = SocketClient::new(config);
    client.connect(&user_id).await?;

    let result = run_shell_session(&client, &user_id, &mut events).await;
    client.disconnect().await;

    result?;
    Ok(())
}
