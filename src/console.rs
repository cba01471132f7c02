//! Line-oriented operator console.
//!
//! Each input line is one command standing in for a button or switch on the panel:
//!
//! | Command                 | Effect                                   |
//! |-------------------------|------------------------------------------|
//! | `run` / `start`         | start an acquisition run                 |
//! | `stop`                  | finish the in-flight frame, then idle    |
//! | `abort`                 | cancel the in-flight frame immediately   |
//! | `mode single\|cont`     | single-shot or continuous acquisition    |
//! | `display 1d\|2d`        | main plot dimension                      |
//! | `source sim\|live`      | simulated or hardware data               |
//! | `debug on\|off`         | debug plot display                       |
//! | `status`                | print session state and switches         |
//! | `help`                  | list commands                            |
//! | `quit` / `exit`         | leave the console                        |

use crate::acquisition::AcquisitionController;
use crate::error::PanelError;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

/// A parsed console command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start a run
    Run,
    /// Finish the in-flight frame, then idle
    Stop,
    /// Cancel the in-flight frame
    Abort,
    /// Continuous (true) or single-shot (false)
    Continuous(bool),
    /// 1D range plot (true) or 2D image (false)
    OneDimensional(bool),
    /// Simulated (true) or live (false) data
    Simulated(bool),
    /// Debug display on or off
    Debug(bool),
    /// Print the session state
    Status,
    /// Print the command summary
    Help,
    /// Leave the console
    Quit,
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCommandError {
    /// Blank line
    #[error("empty command")]
    Empty,
    /// First word is not a command
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    /// Missing or unexpected argument
    #[error("'{command}' expects one of: {expected}")]
    BadArgument {
        /// Command word
        command: &'static str,
        /// Accepted arguments
        expected: &'static str,
    },
}

fn choice(
    command: &'static str,
    arg: Option<&str>,
    on: &str,
    off: &str,
) -> Result<bool, ParseCommandError> {
    let bad = || ParseCommandError::BadArgument {
        command,
        expected: match command {
            "mode" => "single, cont",
            "display" => "1d, 2d",
            "source" => "sim, live",
            _ => "on, off",
        },
    };
    match arg.map(str::to_ascii_lowercase) {
        Some(a) if a == on => Ok(true),
        Some(a) if a == off => Ok(false),
        _ => Err(bad()),
    }
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(ParseCommandError::Empty);
        };
        let arg = words.next();

        match head.to_ascii_lowercase().as_str() {
            "run" | "start" => Ok(Command::Run),
            "stop" => Ok(Command::Stop),
            "abort" => Ok(Command::Abort),
            "mode" => choice("mode", arg, "cont", "single").map(Command::Continuous),
            "display" => choice("display", arg, "1d", "2d").map(Command::OneDimensional),
            "source" => choice("source", arg, "sim", "live").map(Command::Simulated),
            "debug" => choice("debug", arg, "on", "off").map(Command::Debug),
            "status" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(ParseCommandError::Unknown(other.to_string())),
        }
    }
}

/// Command summary printed by `help`.
pub const HELP: &str = "\
commands:
  run | start            start acquisition
  stop                   stop after the current frame
  abort                  cancel the current frame
  mode single|cont       acquisition mode
  display 1d|2d          main plot dimension
  source sim|live        simulated or hardware data
  debug on|off           debug plot display
  status                 show session state
  quit | exit            leave";

/// Apply one command. Returns false when the console should exit.
pub fn apply(controller: &AcquisitionController, command: Command) -> bool {
    let toggles = controller.toggles();
    match command {
        Command::Run => match controller.start() {
            Ok(run_id) => info!(%run_id, "Run requested"),
            Err(PanelError::AlreadyRunning) => println!("already running"),
            Err(e) => warn!(error = %e, "Could not start run"),
        },
        Command::Stop => {
            if !controller.stop() {
                println!("not running");
            }
        }
        Command::Abort => {
            if !controller.abort() {
                println!("not running");
            }
        }
        Command::Continuous(on) => toggles.set_continuous(on),
        Command::OneDimensional(on) => toggles.set_one_dimensional(on),
        Command::Simulated(on) => toggles.set_simulated(on),
        Command::Debug(on) => controller.set_debug(on),
        Command::Status => {
            let session = controller.snapshot();
            let mode = toggles.snapshot();
            println!(
                "state: {}  frames: {}  debug: {:?}",
                session.run_state(),
                session.frames,
                controller.debug_state()
            );
            println!(
                "mode: {}  display: {}  source: {}",
                if mode.continuous { "cont" } else { "single" },
                if mode.one_dimensional { "1D" } else { "2D" },
                if mode.simulated { "sim" } else { "live" },
            );
            if let Some(error) = &session.last_error {
                println!("last error: {error}");
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => return false,
    }
    true
}

/// Read commands from `input` until `quit` or end of input.
pub async fn run_console<R>(controller: &AcquisitionController, input: R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match line.parse::<Command>() {
            Ok(command) => {
                if !apply(controller, command) {
                    break;
                }
            }
            Err(ParseCommandError::Empty) => {}
            Err(e) => println!("{e}"),
        }
    }
    Ok(())
}
