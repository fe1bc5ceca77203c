//! Line-oriented operator console of the headless viewer.

mod console_command;
mod console_reader;

pub use console_command::{ConsoleCommand, ConsoleParseError};
pub use console_reader::{read_commands, spawn_stdin_reader};
