//! Console commands typed at a workstation terminal.

use shared::{DialKind, WorkstationId};
use std::io::stdin;
use std::thread;
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver};

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCmd {
    Scan,
    Eject,
    Insert,
    /// Pushes the launch slider to the given position (0..=1).
    Slide(f32),
    Thruster { index: usize, on: bool },
    Thrusters(bool),
    Location(i32),
    Dial { kind: DialKind, angle: i32 },
    Lock(bool),
    Power { station: WorkstationId, on: bool },
    Enter(WorkstationId),
    Leave(WorkstationId),
    Play,
    VideoFinished(String),
    TranslationError(String),
    Reset,
    Code(String),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("command not recognized: {0}")]
    Unknown(String),
    #[error("missing argument for {0}")]
    MissingArgument(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub const HELP: &str = "\
scan | finish <url> | error <event> | play
eject | insert | jump [value]
thruster <i> on|off | thrusters on|off
location <i> | dial <launch|correction|cube> <angle> | lock | unlock
power <station> on|off | enter <station> | leave <station>
reset | code <code> | status | help | quit";

impl ConsoleCmd {
    pub fn parse(input: &str) -> Result<ConsoleCmd, ConsoleError> {
        let input = input.trim();
        let (message_type, rem) = match input.find(' ') {
            Some(i) => (&input[..i], input[i + 1..].trim()),
            None => (input, ""),
        };
        let mut args = rem.split_whitespace();

        match message_type {
            "scan" => Ok(ConsoleCmd::Scan),
            "eject" => Ok(ConsoleCmd::Eject),
            "insert" => Ok(ConsoleCmd::Insert),
            "jump" => match args.next() {
                Some(value) => Ok(ConsoleCmd::Slide(number(value)?)),
                None => Ok(ConsoleCmd::Slide(1.0)),
            },
            "thruster" => {
                let index = number(args.next().ok_or(ConsoleError::MissingArgument("thruster"))?)?;
                let on = on_off(args.next().ok_or(ConsoleError::MissingArgument("thruster"))?)?;
                Ok(ConsoleCmd::Thruster { index, on })
            }
            "thrusters" => Ok(ConsoleCmd::Thrusters(on_off(
                args.next().ok_or(ConsoleError::MissingArgument("thrusters"))?,
            )?)),
            "location" => Ok(ConsoleCmd::Location(number(
                args.next().ok_or(ConsoleError::MissingArgument("location"))?,
            )?)),
            "dial" => {
                let name = args.next().ok_or(ConsoleError::MissingArgument("dial"))?;
                let kind = DialKind::parse(name)
                    .ok_or_else(|| ConsoleError::InvalidArgument(name.to_string()))?;
                let angle = number(args.next().ok_or(ConsoleError::MissingArgument("dial"))?)?;
                Ok(ConsoleCmd::Dial { kind, angle })
            }
            "lock" => Ok(ConsoleCmd::Lock(true)),
            "unlock" => Ok(ConsoleCmd::Lock(false)),
            "power" => {
                let station = station(args.next().ok_or(ConsoleError::MissingArgument("power"))?)?;
                let on = on_off(args.next().ok_or(ConsoleError::MissingArgument("power"))?)?;
                Ok(ConsoleCmd::Power { station, on })
            }
            "enter" => Ok(ConsoleCmd::Enter(station(
                args.next().ok_or(ConsoleError::MissingArgument("enter"))?,
            )?)),
            "leave" => Ok(ConsoleCmd::Leave(station(
                args.next().ok_or(ConsoleError::MissingArgument("leave"))?,
            )?)),
            "play" => Ok(ConsoleCmd::Play),
            "finish" if !rem.is_empty() => Ok(ConsoleCmd::VideoFinished(rem.to_owned())),
            "error" if !rem.is_empty() => Ok(ConsoleCmd::TranslationError(rem.to_owned())),
            "finish" | "error" => Err(ConsoleError::MissingArgument("video")),
            "reset" => Ok(ConsoleCmd::Reset),
            "code" if !rem.is_empty() => Ok(ConsoleCmd::Code(rem.to_owned())),
            "code" => Err(ConsoleError::MissingArgument("code")),
            "status" => Ok(ConsoleCmd::Status),
            "help" => Ok(ConsoleCmd::Help),
            "quit" | "exit" => Ok(ConsoleCmd::Quit),
            _ => Err(ConsoleError::Unknown(message_type.to_owned())),
        }
    }
}

fn number<T: std::str::FromStr>(arg: &str) -> Result<T, ConsoleError> {
    arg.parse()
        .map_err(|_| ConsoleError::InvalidArgument(arg.to_string()))
}

fn on_off(arg: &str) -> Result<bool, ConsoleError> {
    match arg {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(ConsoleError::InvalidArgument(arg.to_string())),
    }
}

fn station(arg: &str) -> Result<WorkstationId, ConsoleError> {
    WorkstationId::parse(arg).ok_or_else(|| ConsoleError::InvalidArgument(arg.to_string()))
}

/// Reads stdin lines on a plain thread and hands them to the async loop.
pub fn console_input_thread() -> Receiver<String> {
    let (sender, receiver) = mpsc::channel(100);
    thread::spawn(move || loop {
        let mut input = String::new();
        match stdin().read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                if sender.blocking_send(input).is_err() {
                    break;
                }
            }
        }
    });
    receiver
}
