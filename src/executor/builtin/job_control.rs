use std::io::Write;

use crate::executor::{ExecError, ExecStatus};
use crate::jobs::JobState;
use crate::signals;

use super::manager::{BuiltinCommand, BuiltinContext};

/// `%N` or `N` to a job id. `%%` and `%+` mean the most recent job.
fn parse_job_spec(spec: &str, ctx: &BuiltinContext<'_>) -> Result<usize, ExecError> {
    let digits = spec.strip_prefix('%').unwrap_or(spec);
    if digits == "%" || digits == "+" {
        return current_job(ctx, &[JobState::Running, JobState::Stopped]);
    }
    digits
        .parse()
        .map_err(|_| ExecError::InvalidArgument(format!("{}: no such job", spec)))
}

fn current_job(ctx: &BuiltinContext<'_>, states: &[JobState]) -> Result<usize, ExecError> {
    ctx.jobs()
        .latest(states)
        .ok_or_else(|| ExecError::InvalidArgument("current: no such job".into()))
}

pub struct JobsCommand;

impl BuiltinCommand for JobsCommand {
    fn name(&self) -> &'static str {
        "jobs"
    }
    fn summary(&self) -> &'static str {
        "List jobs (-r running, -s stopped)"
    }
    fn run(&self, args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        let jobs = ctx.jobs();
        let listed = match args.first().map(String::as_str) {
            None => jobs.list(),
            Some("-r") => jobs.by_state(JobState::Running),
            Some("-s") => jobs.by_state(JobState::Stopped),
            Some(other) => {
                return Err(ExecError::InvalidArgument(format!("{}: invalid option", other)));
            }
        };
        let mut out = ctx.io.out();
        for job in &listed {
            writeln!(out, "{}", job)?;
        }
        // Finished jobs are reported once, then forgotten.
        jobs.clean();
        Ok(0)
    }
}

pub struct FgCommand;

impl BuiltinCommand for FgCommand {
    fn name(&self) -> &'static str {
        "fg"
    }
    fn summary(&self) -> &'static str {
        "Wait for a job in the foreground"
    }
    fn run(&self, args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        let id = match args.first() {
            Some(spec) => parse_job_spec(spec, ctx)?,
            None => current_job(ctx, &[JobState::Running, JobState::Stopped])?,
        };
        if let Some(job) = ctx.jobs().get(id) {
            writeln!(ctx.io.out(), "{}", job.command)?;
        }
        Ok(ctx.jobs().foreground(id)?)
    }
}

pub struct BgCommand;

impl BuiltinCommand for BgCommand {
    fn name(&self) -> &'static str {
        "bg"
    }
    fn summary(&self) -> &'static str {
        "Resume a stopped job in the background"
    }
    fn run(&self, args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        let id = match args.first() {
            Some(spec) => parse_job_spec(spec, ctx)?,
            None => current_job(ctx, &[JobState::Stopped])?,
        };
        ctx.jobs().background(id)?;
        if let Some(job) = ctx.jobs().get(id) {
            writeln!(ctx.io.out(), "[{}] {} &", job.id, job.command)?;
        }
        Ok(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KillSignal {
    Term,
    Kill,
    Stop,
    Cont,
}

impl KillSignal {
    fn parse(flag: &str) -> Option<KillSignal> {
        match flag.trim_start_matches('-').trim_start_matches("SIG") {
            "TERM" | "15" => Some(KillSignal::Term),
            "KILL" | "9" => Some(KillSignal::Kill),
            "STOP" | "19" => Some(KillSignal::Stop),
            "CONT" | "18" => Some(KillSignal::Cont),
            _ => None,
        }
    }
}

/// `kill [-SIGNAL] %job|pid...`
pub struct KillCommand;

impl BuiltinCommand for KillCommand {
    fn name(&self) -> &'static str {
        "kill"
    }
    fn summary(&self) -> &'static str {
        "Signal jobs or processes (-TERM -KILL -STOP -CONT)"
    }
    fn run(&self, args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        let (signal, targets) = match args.first() {
            Some(flag) if flag.starts_with('-') => {
                let signal = KillSignal::parse(flag).ok_or_else(|| {
                    ExecError::InvalidArgument(format!("{}: invalid signal specification", flag))
                })?;
                (signal, &args[1..])
            }
            _ => (KillSignal::Term, args),
        };
        if targets.is_empty() {
            return Err(ExecError::InvalidArgument("usage: kill [-SIGNAL] %job|pid...".into()));
        }

        let jobs = ctx.jobs();
        for target in targets {
            if target.starts_with('%') {
                let id = parse_job_spec(target, ctx)?;
                match signal {
                    KillSignal::Term => jobs.kill(id)?,
                    KillSignal::Kill => jobs.force_kill(id)?,
                    KillSignal::Stop => jobs.stop(id)?,
                    KillSignal::Cont => jobs.resume(id)?,
                }
                continue;
            }
            let pid = parse_pid(target)?;
            let sent = match signal {
                KillSignal::Term => signals::terminate_process(pid),
                KillSignal::Kill => signals::force_kill(pid),
                KillSignal::Stop => signals::stop_process(pid),
                KillSignal::Cont => signals::continue_process(pid),
            };
            sent.map_err(|errno| ExecError::Io(errno.into()))?;
        }
        Ok(0)
    }
}

// A positive pid_t. Zero and negatives would signal whole process groups.
fn parse_pid(target: &str) -> Result<u32, ExecError> {
    match target.parse::<i32>() {
        Ok(pid) if pid > 0 => Ok(pid.unsigned_abs()),
        _ => Err(ExecError::InvalidArgument(format!(
            "{}: arguments must be process or job IDs",
            target
        ))),
    }
}

pub struct WaitCommand;

impl BuiltinCommand for WaitCommand {
    fn name(&self) -> &'static str {
        "wait"
    }
    fn summary(&self) -> &'static str {
        "Wait for a job, or for all jobs"
    }
    fn run(&self, args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus {
        match args.first() {
            None => Ok(ctx.jobs().wait_all()),
            Some(spec) => {
                let id = parse_job_spec(spec, ctx)?;
                Ok(ctx.jobs().wait(id)?)
            }
        }
    }
}
