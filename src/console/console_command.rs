use crate::presentation::PointerPos;
use std::str::FromStr;
use strum_macros::Display;

/// One line of operator input.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Move(PointerPos),
    Click(PointerPos),
    Faster,
    Slower,
    /// Back to real time at the current wall clock.
    RealTime,
    Show(String),
    Hide(String),
    /// Shows or hides every orbit track.
    Tracks(bool),
    Stats,
    Quit,
}

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ConsoleParseError {
    Empty,
    UnknownCommand(String),
    MissingArgument(&'static str),
    InvalidArgument(String),
}

impl std::error::Error for ConsoleParseError {}

fn coordinate<'a>(args: &mut impl Iterator<Item = &'a str>, name: &'static str) -> Result<f32, ConsoleParseError> {
    let raw = args.next().ok_or(ConsoleParseError::MissingArgument(name))?;
    raw.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConsoleParseError::InvalidArgument(raw.to_string()))
}

fn pointer<'a>(mut args: impl Iterator<Item = &'a str>) -> Result<PointerPos, ConsoleParseError> {
    let x = coordinate(&mut args, "x")?;
    let y = coordinate(&mut args, "y")?;
    Ok(PointerPos::new(x, y))
}

impl FromStr for ConsoleCommand {
    type Err = ConsoleParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let group_name = || {
            if rest.is_empty() { Err(ConsoleParseError::MissingArgument("group")) } else { Ok(rest.to_string()) }
        };
        match word.to_ascii_lowercase().as_str() {
            "" => Err(ConsoleParseError::Empty),
            "move" | "m" => pointer(rest.split_whitespace()).map(ConsoleCommand::Move),
            "click" | "c" => pointer(rest.split_whitespace()).map(ConsoleCommand::Click),
            "faster" | "+" => Ok(ConsoleCommand::Faster),
            "slower" | "-" => Ok(ConsoleCommand::Slower),
            "realtime" | "rt" => Ok(ConsoleCommand::RealTime),
            "show" => group_name().map(ConsoleCommand::Show),
            "hide" => group_name().map(ConsoleCommand::Hide),
            "tracks" => match rest {
                "on" => Ok(ConsoleCommand::Tracks(true)),
                "off" => Ok(ConsoleCommand::Tracks(false)),
                "" => Err(ConsoleParseError::MissingArgument("on|off")),
                other => Err(ConsoleParseError::InvalidArgument(other.to_string())),
            },
            "stats" => Ok(ConsoleCommand::Stats),
            "quit" | "exit" | "q" => Ok(ConsoleCommand::Quit),
            other => Err(ConsoleParseError::UnknownCommand(other.to_string())),
        }
    }
}
