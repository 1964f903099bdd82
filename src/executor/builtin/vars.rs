use std::io::{Read, Write};

use crate::environment::Variable;
use crate::executor::{ExecError, ExecStatus};
use crate::parser::default::is_name;

use super::manager::{BuiltinCommand, BuiltinContext};

fn check_name(name: &str) -> Result<(), ExecError> {
    if is_name(name) {
        Ok(())
    } else {
        Err(ExecError::InvalidArgument(format!("`{}': not a valid identifier", name)))
    }
}

fn render(var: &Variable) -> String {
    match &var.array {
        Some(items) => format!("{}=({})", var.name, items.join(" ")),
        None => format!("{}={}", var.name, var.value),
    }
}

pub struct ExportCommand;

impl BuiltinCommand for ExportCommand {
    fn name(&self) -> &'static str {
        "export"
    }
    fn summary(&self) -> &'static str {
        "Export NAME[=VALUE] to child processes"
    }
    fn run(&self, args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        let env = ctx.env();
        if args.is_empty() {
            let mut out = ctx.io.out();
            for (name, value) in env.exported_vars() {
                writeln!(out, "export {}={}", name, value)?;
            }
            return Ok(0);
        }
        for arg in args {
            match arg.split_once('=') {
                Some((name, value)) => {
                    check_name(name)?;
                    env.export_with_value(name, value)?;
                }
                None => {
                    check_name(arg)?;
                    env.export(arg);
                }
            }
        }
        Ok(0)
    }
}

pub struct UnsetCommand;

impl BuiltinCommand for UnsetCommand {
    fn name(&self) -> &'static str {
        "unset"
    }
    fn summary(&self) -> &'static str {
        "Remove variables"
    }
    fn run(&self, args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        for name in args {
            ctx.env().unset(name)?;
        }
        Ok(0)
    }
}

pub struct ReadonlyCommand;

impl BuiltinCommand for ReadonlyCommand {
    fn name(&self) -> &'static str {
        "readonly"
    }
    fn summary(&self) -> &'static str {
        "Mark NAME[=VALUE] read-only"
    }
    fn run(&self, args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        let env = ctx.env();
        if args.is_empty() {
            let mut out = ctx.io.out();
            for var in env.all().iter().filter(|v| v.readonly) {
                writeln!(out, "readonly {}", render(var))?;
            }
            return Ok(0);
        }
        for arg in args {
            let name = match arg.split_once('=') {
                Some((name, value)) => {
                    check_name(name)?;
                    env.set(name, value)?;
                    name
                }
                None => {
                    check_name(arg)?;
                    arg.as_str()
                }
            };
            env.set_readonly(name);
        }
        Ok(0)
    }
}

pub struct SetCommand;

impl BuiltinCommand for SetCommand {
    fn name(&self) -> &'static str {
        "set"
    }
    fn summary(&self) -> &'static str {
        "List all shell variables"
    }
    fn run(&self, _args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        let mut out = ctx.io.out();
        for var in ctx.env().all() {
            writeln!(out, "{}", render(&var))?;
        }
        Ok(0)
    }
}

/// `read [NAME...]`: one line from the command's own stdin.
///
/// Reads a byte at a time so nothing past the newline is consumed from a
/// shared input. Words go to the names in order and the last name takes
/// the rest of the line. With no names the line goes to `REPLY`.
pub struct ReadCommand;

impl BuiltinCommand for ReadCommand {
    fn name(&self) -> &'static str {
        "read"
    }
    fn summary(&self) -> &'static str {
        "Read a line into variables"
    }
    fn run(&self, args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        for name in args {
            check_name(name)?;
        }
        let mut input = ctx.io.input();
        let mut bytes = Vec::new();
        let mut byte = [0u8; 1];
        let mut saw_newline = false;
        while input.read(&mut byte)? == 1 {
            if byte[0] == b'\n' {
                saw_newline = true;
                break;
            }
            bytes.push(byte[0]);
        }
        if bytes.is_empty() && !saw_newline {
            return Ok(1);
        }
        let line = String::from_utf8_lossy(&bytes);
        let line = line.trim_end_matches('\r');

        let env = ctx.env();
        if args.is_empty() {
            env.set("REPLY", line)?;
            return Ok(0);
        }
        let mut rest = line.trim_start();
        for (i, name) in args.iter().enumerate() {
            if i + 1 == args.len() {
                env.set(name, rest.trim_end())?;
                break;
            }
            let (word, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            env.set(name, word)?;
            rest = tail.trim_start();
        }
        Ok(0)
    }
}
