use std::fs;
use std::io::{self, Read};
use std::path::Path;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ShellError;
use crate::executor::{normalize_status, report, DefaultExecutor, ExecError, Executor, IoContext};
use crate::parser::{self, ParseError};
use crate::prompt::ShellPrompt;
use crate::signals;

/// What the caller should do after one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Continue(i32),
    Exit(i32),
}

pub struct Shell {
    executor: DefaultExecutor,
    config: Config,
}

impl Shell {
    pub fn new(config: Config) -> Self {
        let executor = DefaultExecutor::new().with_default_path(&config.default_path);
        Self::with_executor(executor, config)
    }

    pub fn with_executor(executor: DefaultExecutor, config: Config) -> Self {
        let shell = Shell { executor, config };
        if let Err(e) = shell.init_environment() {
            warn!(error = %e, "could not initialize the environment");
        }
        shell
    }

    pub fn executor(&self) -> &DefaultExecutor {
        &self.executor
    }

    fn init_environment(&self) -> Result<(), ExecError> {
        let env = self.executor.env();
        let level = env
            .get("SHLVL")
            .and_then(|v| v.trim().parse::<i32>().ok())
            .unwrap_or(0);
        env.export_with_value("SHLVL", &(level + 1).to_string())?;
        let cwd = std::env::current_dir()?;
        env.export_with_value("PWD", &cwd.to_string_lossy())?;
        env.set("0", "tinysh")?;
        for (name, value) in &self.config.env_vars {
            env.export_with_value(name, value)?;
        }
        Ok(())
    }

    /// Parses and runs one line on the interpreter's own streams.
    pub fn run_line(&self, line: &str) -> LineOutcome {
        let io = IoContext::inherit();
        let commands = match parser::parse(line) {
            Ok(commands) => commands,
            Err(e) => {
                report(&io, None, &ExecError::Parse(e));
                return LineOutcome::Continue(2);
            }
        };
        let mut status = 0;
        for command in &commands {
            match self.executor.exec(command, &io) {
                Ok(s) => status = s,
                Err(ExecError::Exit(code)) => return LineOutcome::Exit(normalize_status(code)),
                Err(e) => {
                    report(&io, None, &e);
                    status = e.status();
                }
            }
        }
        LineOutcome::Continue(status)
    }

    /// Runs a script, `-c` text or piped stdin.
    ///
    /// Lines are gathered into chunks the way the prompt gathers continuation
    /// lines: a chunk ends once it parses or fails for a reason more input
    /// cannot fix. Each chunk runs on its own, so a syntax error only loses
    /// the chunk it is in.
    pub fn run_program(&self, source: &str) -> i32 {
        let mut status = 0;
        let mut chunk = String::new();
        for line in source.lines() {
            if !chunk.is_empty() {
                chunk.push('\n');
            }
            chunk.push_str(line);
            if chunk.trim().is_empty() || needs_more(&chunk) {
                continue;
            }
            match self.run_line(&chunk) {
                LineOutcome::Continue(s) => status = s,
                LineOutcome::Exit(code) => return code,
            }
            chunk.clear();
        }
        // Still open at end of input: report it like any other syntax error.
        if !chunk.trim().is_empty() {
            match self.run_line(&chunk) {
                LineOutcome::Continue(s) | LineOutcome::Exit(s) => status = s,
            }
        }
        status
    }

    pub fn run_script(&self, path: &Path) -> Result<i32, ShellError> {
        let source = fs::read_to_string(path)?;
        debug!(path = %path.display(), "running script");
        Ok(self.run_program(&source))
    }

    pub fn run_stdin(&self) -> Result<i32, ShellError> {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        Ok(self.run_program(&source))
    }

    /// The prompt loop. Returns the status to exit with.
    pub fn run_interactive(&self) -> Result<i32, ShellError> {
        let prompt = ShellPrompt::new(self.config.prompt.clone());
        signals::spawn_listener(true, self.config.prompt.clone())?;
        let mut status = 0;

        loop {
            prompt.show_prompt()?;
            let Some(mut line) = prompt.read_line()? else {
                // EOF (e.g. Ctrl+D)
                println!();
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            while needs_more(&line) {
                prompt.show_continuation()?;
                match prompt.read_line()? {
                    Some(more) => {
                        line.push('\n');
                        line.push_str(&more);
                    }
                    None => break,
                }
            }

            signals::set_busy(true);
            let outcome = self.run_line(&line);
            signals::set_busy(false);
            match outcome {
                LineOutcome::Continue(s) => status = s,
                LineOutcome::Exit(code) => return Ok(code),
            }
        }
        Ok(status)
    }
}

fn needs_more(line: &str) -> bool {
    matches!(parser::parse(line), Err(ref e) if ParseError::is_incomplete(e))
}
