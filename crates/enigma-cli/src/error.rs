use std::fmt;

use enigma_core::error::{ExecutionError, LoadError, ParseError, WorldError};

#[derive(Debug)]
pub enum CliError {
    Parse { message: String, line: usize },
    Runtime(ExecutionError),
    State(WorldError),
    Io(std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Runtime(_) => 1,
            CliError::Parse { .. } => 2,
            CliError::State(_) | CliError::Io(_) => 4,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Parse { message, line } => write!(f, "Parse error at line {}: {}", line, message),
            CliError::Runtime(e) => write!(f, "{}", e),
            CliError::State(e) => write!(f, "State error: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ParseError> for CliError {
    fn from(e: ParseError) -> Self {
        CliError::Parse {
            message: e.message,
            line: e.line,
        }
    }
}

impl From<LoadError> for CliError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::Parse(e) => e.into(),
            LoadError::Io { path, source } => {
                CliError::Io(std::io::Error::new(source.kind(), format!("{}: {}", path, source)))
            }
        }
    }
}

impl From<ExecutionError> for CliError {
    fn from(e: ExecutionError) -> Self {
        CliError::Runtime(e)
    }
}

impl From<WorldError> for CliError {
    fn from(e: WorldError) -> Self {
        CliError::State(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}
