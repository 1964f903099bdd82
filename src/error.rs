use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::executor::ExecError;
use crate::parser::ParseError;

/// Errors that end a whole shell session rather than one command.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
