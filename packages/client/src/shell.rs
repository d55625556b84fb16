//! Interactive shell.
//!
//! Reads commands with rustyline on a blocking thread and prints
//! notifications as they arrive, redrawing the prompt afterwards.

use std::path::PathBuf;

use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use crate::{
    error::ClientError,
    formatter::MessageFormatter,
    runner::{Command, execute},
    session::{ClientEvent, SocketClient},
    ui::redisplay_prompt,
};

pub const HELP: &str = "\
Commands:
  upload <projectId> <path>        upload a file to a project
  download <projectId> [output]    download the latest file of a project
  status <projectId>               show the status of a project
  submit <projectId> <status>      change the status of a project
  help                             show this help
  quit                             leave the shell
";

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellInput {
    Run(Command),
    Help,
    Quit,
}

fn parse_project_id(arg: Option<&str>) -> Result<i64, String> {
    let arg = arg.ok_or("missing <projectId>")?;
    arg.parse::<i64>()
        .map_err(|_| format!("invalid projectId '{}'", arg))
}

/// Parse one shell line.
pub fn parse_line(line: &str) -> Result<ShellInput, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Err("empty command".to_string());
    };

    let input = match command {
        "upload" => {
            let project_id = parse_project_id(words.next())?;
            let path = words.next().ok_or("missing <path>")?;
            ShellInput::Run(Command::Upload {
                project_id,
                path: PathBuf::from(path),
            })
        }
        "download" => ShellInput::Run(Command::Download {
            project_id: parse_project_id(words.next())?,
            output: words.next().map(PathBuf::from),
        }),
        "status" => ShellInput::Run(Command::Status {
            project_id: parse_project_id(words.next())?,
        }),
        "submit" => {
            let project_id = parse_project_id(words.next())?;
            let status = words.collect::<Vec<_>>().join(" ");
            if status.is_empty() {
                return Err("missing <status>".to_string());
            }
            ShellInput::Run(Command::Submit { project_id, status })
        }
        "help" | "?" => ShellInput::Help,
        "quit" | "exit" => ShellInput::Quit,
        other => return Err(format!("unknown command '{}', type 'help'", other)),
    };
    Ok(input)
}

/// Run the shell on an already connected client.
///
/// Returns `Ok` when the user quits and an error when the connection is lost.
pub async fn run_shell_session(
    client: &SocketClient,
    user_id: &str,
    events: &mut mpsc::UnboundedReceiver<ClientEvent>,
) -> Result<(), ClientError> {
    println!(
        "\nYou are '{}'. Type 'help' for commands. Press Ctrl+C to exit.\n",
        user_id
    );

    // Create channel for rustyline input
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // Spawn a blocking thread for rustyline (synchronous readline)
    let prompt = format!("{}> ", user_id);
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            // Channel closed, exit thread
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            line = input_rx.recv() => {
                let Some(line) = line else {
                    return Ok(());
                };
                match parse_line(&line) {
                    Ok(ShellInput::Quit) => return Ok(()),
                    Ok(ShellInput::Help) => print!("{}", HELP),
                    Ok(ShellInput::Run(command)) => match execute(client, &command, true).await {
                        Ok(output) => print!("{}", output),
                        Err(e) => println!("Error: {}", e),
                    },
                    Err(reason) => println!("{}", reason),
                }
            }
            event = events.recv() => {
                match event {
                    Some(ClientEvent::Notification { kind, message, timestamp, project_id }) => {
                        let formatted = MessageFormatter::format_notification(
                            kind, &message, &timestamp, project_id,
                        );
                        print!("{}", formatted);
                    }
                    Some(ClientEvent::ServerError { message }) => {
                        print!("{}", MessageFormatter::format_server_error(&message));
                    }
                    Some(ClientEvent::Connected { .. }) => continue,
                    Some(ClientEvent::Disconnected) | None => {
                        println!("\nConnection to the server was lost.");
                        return Err(ClientError::Connection("Connection lost".to_string()));
                    }
                }
                redisplay_prompt(user_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload() {
        // テスト項目: upload コマンドがプロジェクト ID とパスに分解される
        // given (前提条件):
        let line = "upload 3 ./report.pdf";

        // when (操作):
        let result = parse_line(line);

        // then (期待する結果):
        assert_eq!(
            result,
            Ok(ShellInput::Run(Command::Upload {
                project_id: 3,
                path: PathBuf::from("./report.pdf"),
            }))
        );
    }

    #[test]
    fn test_parse_download_with_optional_output() {
        // テスト項目: download の出力先は省略できる
        // given (前提条件):
        let without = "download 3";
        let with = "download 3 out.pdf";

        // when (操作):
        let without = parse_line(without);
        let with = parse_line(with);

        // then (期待する結果):
        assert_eq!(
            without,
            Ok(ShellInput::Run(Command::Download {
                project_id: 3,
                output: None
            }))
        );
        assert_eq!(
            with,
            Ok(ShellInput::Run(Command::Download {
                project_id: 3,
                output: Some(PathBuf::from("out.pdf"))
            }))
        );
    }

    #[test]
    fn test_parse_submit_joins_status_words() {
        // テスト項目: submit のステータスは空白を含んでもよい
        // given (前提条件):
        let line = "submit 4 under review";

        // when (操作):
        let result = parse_line(line);

        // then (期待する結果):
        assert_eq!(
            result,
            Ok(ShellInput::Run(Command::Submit {
                project_id: 4,
                status: "under review".to_string(),
            }))
        );
    }

    #[test]
    fn test_parse_errors() {
        // テスト項目: 不正な入力は説明付きのエラーになる
        // given (前提条件):
        let inputs = ["status abc", "upload 3", "submit 4", "delete 3", "   "];

        // when (操作):
        let results: Vec<_> = inputs.iter().map(|line| parse_line(line)).collect();

        // then (期待する結果):
        assert!(results[0].as_ref().unwrap_err().contains("invalid projectId"));
        assert!(results[1].as_ref().unwrap_err().contains("<path>"));
        assert!(results[2].as_ref().unwrap_err().contains("<status>"));
        assert!(results[3].as_ref().unwrap_err().contains("unknown command"));
        assert!(results[4].is_err());
    }

    #[test]
    fn test_parse_help_and_quit() {
        // テスト項目: help と quit が認識される
        // given (前提条件):
        let help = "help";
        let quit = "exit";

        // when (操作):
        let help = parse_line(help);
        let quit = parse_line(quit);

        // then (期待する結果):
        assert_eq!(help, Ok(ShellInput::Help));
        assert_eq!(quit, Ok(ShellInput::Quit));
    }
}
