use std::{error::Error, fmt};

/// The command word sent as the first line of every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Train,
    Run,
    Type,
    Exit,
}

/// How the command line is matched against the command keywords.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommandMatch {
    /// The line only has to contain the keyword, checked in the order
    /// `train`, `run`, `type`, `exit`. Tolerates decorations around the keyword,
    /// but `retrain` also selects `train`.
    #[default]
    Substring,
    /// The line, without surrounding whitespace, must be exactly the keyword.
    Exact,
}

/// The command line didn't select any command. The server closes the connection
/// without answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedCommand(pub String);

impl Command {
    /// Every command in matching priority order.
    pub const ALL: [Command; 4] = [Command::Train, Command::Run, Command::Type, Command::Exit];

    /// The keyword that selects this command.
    pub fn keyword(self) -> &'static str {
        match self {
            Command::Train => "train",
            Command::Run => "run",
            Command::Type => "type",
            Command::Exit => "exit",
        }
    }

    /// Parses a command line.
    ///
    /// # Arguments
    /// * `line` - The first line received on the connection.
    /// * `mode` - The matching policy.
    ///
    /// # Returns
    /// The selected command, or `UnrecognizedCommand` carrying the line.
    pub fn parse(line: &str, mode: CommandMatch) -> Result<Self, UnrecognizedCommand> {
        let found = match mode {
            CommandMatch::Substring => Self::ALL.into_iter().find(|c| line.contains(c.keyword())),
            CommandMatch::Exact => {
                let word = line.trim();
                Self::ALL.into_iter().find(|c| c.keyword() == word)
            }
        };

        found.ok_or_else(|| UnrecognizedCommand(line.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl fmt::Display for UnrecognizedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized command {:?}", self.0)
    }
}

impl Error for UnrecognizedCommand {}
