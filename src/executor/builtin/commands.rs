use std::fs;
use std::io::Write;

use tracing::debug;

use crate::executor::{ExecError, ExecStatus};

use super::manager::{BuiltinCommand, BuiltinContext};

pub struct HelpCommand;

impl BuiltinCommand for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }
    fn summary(&self) -> &'static str {
        "Show this help"
    }
    fn run(&self, _args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        let mut out = ctx.io.out();
        writeln!(out, "Available built-in commands:")?;
        for (name, summary) in ctx.shell.builtins().entries() {
            writeln!(out, "  {:<10} {}", name, summary)?;
        }
        Ok(0)
    }
}

pub struct CdCommand;

impl BuiltinCommand for CdCommand {
    fn name(&self) -> &'static str {
        "cd"
    }
    fn summary(&self) -> &'static str {
        "Change directory (cd -, cd ~)"
    }
    fn run(&self, args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        let env = ctx.env();
        let home = || {
            env.get("HOME")
                .ok_or_else(|| ExecError::InvalidArgument("HOME not set".into()))
        };
        let (target, announce) = match args.first().map(String::as_str) {
            None | Some("~") => (home()?, false),
            Some("-") => {
                let previous = env
                    .get("OLDPWD")
                    .ok_or_else(|| ExecError::InvalidArgument("OLDPWD not set".into()))?;
                (previous, true)
            }
            Some(dir) if dir.starts_with("~/") => (format!("{}{}", home()?, &dir[1..]), false),
            Some(dir) => (dir.to_string(), false),
        };

        let previous = std::env::current_dir()?;
        if let Err(e) = std::env::set_current_dir(&target) {
            writeln!(ctx.io.err(), "tinysh: cd: {}: {}", target, e)?;
            return Ok(1);
        }
        let current = std::env::current_dir()?;
        env.export_with_value("OLDPWD", &previous.to_string_lossy())?;
        env.export_with_value("PWD", &current.to_string_lossy())?;
        debug!(dir = %current.display(), "changed directory");
        if announce {
            writeln!(ctx.io.out(), "{}", current.display())?;
        }
        Ok(0)
    }
}

pub struct PwdCommand;

impl BuiltinCommand for PwdCommand {
    fn name(&self) -> &'static str {
        "pwd"
    }
    fn summary(&self) -> &'static str {
        "Print the current directory"
    }
    fn run(&self, _args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        writeln!(ctx.io.out(), "{}", std::env::current_dir()?.display())?;
        Ok(0)
    }
}

pub struct EchoCommand;

impl BuiltinCommand for EchoCommand {
    fn name(&self) -> &'static str {
        "echo"
    }
    fn summary(&self) -> &'static str {
        "Print arguments (-n: no newline)"
    }
    fn run(&self, args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        let (newline, words) = match args.first().map(String::as_str) {
            Some("-n") => (false, &args[1..]),
            _ => (true, args),
        };
        let mut out = ctx.io.out();
        write!(out, "{}", words.join(" "))?;
        if newline {
            writeln!(out)?;
        }
        out.flush()?;
        Ok(0)
    }
}

pub struct TrueCommand;

impl BuiltinCommand for TrueCommand {
    fn name(&self) -> &'static str {
        "true"
    }
    fn summary(&self) -> &'static str {
        "Do nothing, successfully"
    }
    fn run(&self, _args: &[String], _ctx: &BuiltinContext<'_>) -> ExecStatus {
        Ok(0)
    }
}

pub struct FalseCommand;

impl BuiltinCommand for FalseCommand {
    fn name(&self) -> &'static str {
        "false"
    }
    fn summary(&self) -> &'static str {
        "Do nothing, unsuccessfully"
    }
    fn run(&self, _args: &[String], _ctx: &BuiltinContext<'_>) -> ExecStatus {
        Ok(1)
    }
}

pub struct ExitCommand;

impl BuiltinCommand for ExitCommand {
    fn name(&self) -> &'static str {
        "exit"
    }
    fn summary(&self) -> &'static str {
        "Exit the shell with status N"
    }
    fn run(&self, args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        let code = match args.first() {
            None => ctx.shell.last_status(),
            Some(arg) => arg.parse::<i32>().map_err(|_| {
                ExecError::InvalidArgument(format!("{}: numeric argument required", arg))
            })?,
        };
        Err(ExecError::Exit(code))
    }
}

/// `source FILE` and its `.` spelling.
pub struct SourceCommand {
    pub name: &'static str,
}

impl BuiltinCommand for SourceCommand {
    fn name(&self) -> &'static str {
        self.name
    }
    fn summary(&self) -> &'static str {
        "Run commands from FILE in this shell"
    }
    fn run(&self, args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        let path = args
            .first()
            .ok_or_else(|| ExecError::InvalidArgument("filename argument required".into()))?;
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                writeln!(ctx.io.err(), "tinysh: {}: {}: {}", self.name, path, e)?;
                return Ok(1);
            }
        };
        debug!(path = %path, "sourcing file");
        ctx.shell.run_source(&text, ctx.io)
    }
}
