use std::io::{self, Write};

use thiserror::Error;

use crate::ast::Command;
use crate::environment::VarError;
use crate::expander::ExpandError;
use crate::jobs::JobError;
use crate::parser::ParseError;

use super::redirect::IoContext;

pub type ExecStatus = Result<i32, ExecError>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{0}: command not found")]
    CommandNotFound(String),
    #[error("{path}: {source}")]
    Redirect {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{command}: {source}")]
    Process {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Variable(#[from] VarError),
    #[error(transparent)]
    Expand(#[from] ExpandError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}: not supported")]
    Unsupported(String),
    #[error("exit {0}")]
    Exit(i32),
}

impl ExecError {
    /// Exit status a command ends with when it fails with this error.
    pub fn status(&self) -> i32 {
        match self {
            ExecError::CommandNotFound(_) => 127,
            ExecError::Parse(_) | ExecError::InvalidArgument(_) => 2,
            ExecError::Exit(code) => *code,
            _ => 1,
        }
    }
}

pub trait Executor {
    fn exec(&self, node: &Command, io: &IoContext) -> ExecStatus;
}

/// Writes `tinysh: [NAME: ]ERROR` to the command's stderr.
pub fn report(io: &IoContext, name: Option<&str>, err: &ExecError) {
    let mut out = io.err();
    let _ = match name {
        Some(name) => writeln!(out, "tinysh: {}: {}", name, err),
        None => writeln!(out, "tinysh: {}", err),
    };
}

/// Reduces a status into the 0..=255 range of an OS exit code.
pub fn normalize_status(status: i32) -> i32 {
    status.rem_euclid(256)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{List, ListOp};
    use std::sync::Mutex;

    struct TestExecutor {
        // Records each node it visits
        log: Mutex<Vec<String>>,
    }

    impl TestExecutor {
        fn new() -> Self {
            Self { log: Mutex::new(vec![]) }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl Executor for TestExecutor {
        fn exec(&self, node: &Command, io: &IoContext) -> ExecStatus {
            match node {
                Command::Simple(cmd) => {
                    self.log.lock().unwrap().push(format!("command: {} {:?}", cmd.name, cmd.args));
                    match cmd.name.as_str() {
                        "false" => Ok(1),
                        "exit" => Err(ExecError::Exit(7)),
                        _ => Ok(0),
                    }
                }
                Command::Pipeline { left, right } => {
                    self.log.lock().unwrap().push("pipeline".to_string());
                    self.exec(left, io)?;
                    self.exec(right, io)
                }
                Command::Subshell(inner) => {
                    self.log.lock().unwrap().push("subshell".to_string());
                    match self.exec(inner, io) {
                        Err(ExecError::Exit(code)) => Ok(code),
                        other => other,
                    }
                }
                Command::List(list) => {
                    self.log.lock().unwrap().push("list".to_string());
                    let mut status = 0;
                    for (i, cmd) in list.commands.iter().enumerate() {
                        status = self.exec(cmd, io)?;
                        match list.operators.get(i) {
                            Some(ListOp::And) if status != 0 => break,
                            Some(ListOp::Or) if status == 0 => break,
                            _ => {}
                        }
                    }
                    Ok(status)
                }
                _ => {
                    self.log.lock().unwrap().push("compound".to_string());
                    Ok(0)
                }
            }
        }
    }

    fn cmd(name: &str, args: &[&str]) -> Command {
        Command::simple(name, args)
    }

    #[test]
    fn test_simple_command() {
        let exec = TestExecutor::new();
        let result = exec.exec(&cmd("echo", &["hello"]), &IoContext::inherit());
        assert!(matches!(result, Ok(0)));
        assert_eq!(exec.log(), vec!["command: echo [\"hello\"]"]);
    }

    #[test]
    fn test_pipeline_visits_both_stages() {
        let ast = Command::Pipeline {
            left: Box::new(cmd("ls", &[])),
            right: Box::new(cmd("wc", &[])),
        };
        let exec = TestExecutor::new();
        assert!(matches!(exec.exec(&ast, &IoContext::inherit()), Ok(0)));
        assert_eq!(exec.log(), vec!["pipeline", "command: ls []", "command: wc []"]);
    }

    #[test]
    fn test_exit_unwinds_until_a_subshell() {
        let exec = TestExecutor::new();
        let io = IoContext::inherit();
        assert!(matches!(exec.exec(&cmd("exit", &[]), &io), Err(ExecError::Exit(7))));
        let sub = Command::Subshell(Box::new(cmd("exit", &[])));
        assert!(matches!(exec.exec(&sub, &io), Ok(7)));
    }

    #[test]
    fn test_list_short_circuit() {
        // echo hi && false || echo fallback
        let ast = Command::List(List {
            commands: vec![cmd("echo", &["hi"]), cmd("false", &[]), cmd("echo", &["fallback"])],
            operators: vec![ListOp::And, ListOp::Or],
        });
        let exec = TestExecutor::new();
        assert!(matches!(exec.exec(&ast, &IoContext::inherit()), Ok(1)));
        assert_eq!(exec.log(), vec!["list", "command: echo [\"hi\"]", "command: false []"]);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ExecError::CommandNotFound("x".into()).status(), 127);
        assert_eq!(ExecError::InvalidArgument("x".into()).status(), 2);
        assert_eq!(ExecError::Unsupported("<<".into()).status(), 1);
        assert_eq!(ExecError::Exit(42).status(), 42);
        assert_eq!(
            ExecError::Parse(ParseError::MissingKeyword { expected: "fi" }).status(),
            2
        );
        assert_eq!(
            ExecError::CommandNotFound("nope".into()).to_string(),
            "nope: command not found"
        );
    }

    #[test]
    fn test_normalize_status() {
        assert_eq!(normalize_status(0), 0);
        assert_eq!(normalize_status(256), 0);
        assert_eq!(normalize_status(257), 1);
        assert_eq!(normalize_status(-1), 255);
    }
}
