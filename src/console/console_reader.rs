use super::console_command::{ConsoleCommand, ConsoleParseError};
use crate::{event, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Parses operator commands from `reader` line by line and forwards them.
///
/// Stops after `quit`, at end of input or when the receiving side is gone. Lines that
/// do not parse are logged and skipped.
///
/// # Returns
/// The number of commands forwarded.
pub async fn read_commands<R>(reader: R, commands: mpsc::Sender<ConsoleCommand>) -> usize
where R: AsyncBufRead + Unpin {
    let mut lines = reader.lines();
    let mut forwarded = 0;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Console input failed: {e}");
                break;
            }
        };
        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(ConsoleParseError::Empty) => continue,
            Err(e) => {
                warn!("Ignoring console line {line:?}: {e}");
                continue;
            }
        };
        event!("Console command {command:?}");
        let quit = command == ConsoleCommand::Quit;
        if commands.send(command).await.is_err() {
            break;
        }
        forwarded += 1;
        if quit {
            break;
        }
    }
    forwarded
}

/// Spawns the stdin reader.
pub fn spawn_stdin_reader(buffer: usize) -> mpsc::Receiver<ConsoleCommand> {
    let (tx, rx) = mpsc::channel(buffer);
    tokio::spawn(async move {
        read_commands(BufReader::new(tokio::io::stdin()), tx).await;
    });
    rx
}
