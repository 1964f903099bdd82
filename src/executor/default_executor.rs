use std::collections::HashMap;
use std::io::Write;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{self, Child};
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use glob::Pattern;
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, info};

use crate::ast::{
    AssignValue, Assignment, CaseCommand, Command, ForCommand, FunctionDef, IfCommand, List,
    ListOp, Redirect, SimpleCommand, StreamTarget, WhileCommand,
};
use crate::environment::Environment;
use crate::expander::Expander;
use crate::jobs::JobManager;
use crate::parser;

use super::builtin::{BuiltinContext, BuiltinManager};
use super::executor::{normalize_status, report, ExecError, ExecStatus, Executor};
use super::path_resolver::PathResolver;
use super::pipeline::run_pipeline;
use super::redirect::{IoContext, Stream};

type FunctionTable = HashMap<String, Arc<Command>>;

/// The tree-walking interpreter.
///
/// Clones share all state, which is how pipeline stages and background
/// workers see the same variables and jobs. [`DefaultExecutor::scoped`] makes
/// the isolated copy used by subshells and function calls.
#[derive(Clone)]
pub struct DefaultExecutor {
    env: Arc<Environment>,
    builtins: Arc<BuiltinManager>,
    jobs: JobManager,
    functions: Arc<RwLock<FunctionTable>>,
    last_status: Arc<AtomicI32>,
    // 0 until the first background job
    last_background: Arc<AtomicU32>,
    resolver: PathResolver,
}

impl Default for DefaultExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultExecutor {
    /// Executor over the process environment.
    pub fn new() -> Self {
        Self::with_env(Environment::new())
    }

    /// Executor whose variables never reach the process environment.
    pub fn detached() -> Self {
        Self::with_env(Environment::detached())
    }

    pub fn with_env(env: Environment) -> Self {
        DefaultExecutor {
            env: Arc::new(env),
            builtins: Arc::new(BuiltinManager::new()),
            jobs: JobManager::new(),
            functions: Arc::new(RwLock::new(HashMap::new())),
            last_status: Arc::new(AtomicI32::new(0)),
            last_background: Arc::new(AtomicU32::new(0)),
            resolver: PathResolver::default(),
        }
    }

    /// Directories searched when the shell has no `PATH` variable.
    pub fn with_default_path(mut self, default_path: &str) -> Self {
        self.resolver = PathResolver::new(default_path);
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub fn builtins(&self) -> &BuiltinManager {
        &self.builtins
    }

    pub fn last_status(&self) -> i32 {
        self.last_status.load(Ordering::SeqCst)
    }

    fn last_background(&self) -> Option<u32> {
        match self.last_background.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    /// Runs `command` on the interpreter's own streams and returns its status.
    /// `exit` ends up here as its code.
    pub fn execute(&self, command: &Command) -> i32 {
        let io = IoContext::inherit();
        match self.exec(command, &io) {
            Ok(status) => status,
            Err(e) => {
                if !matches!(e, ExecError::Exit(_)) {
                    report(&io, None, &e);
                }
                normalize_status(e.status())
            }
        }
    }

    /// Parses `source` as one program and runs it. Returns the last status.
    pub fn run_source(&self, source: &str, io: &IoContext) -> ExecStatus {
        let commands = parser::parse(source)?;
        let mut status = 0;
        for command in &commands {
            status = self.exec(command, io)?;
        }
        Ok(status)
    }

    /// Copy with its own variables and functions for a subshell or function call.
    /// Jobs and builtins stay shared.
    pub fn scoped(&self) -> Self {
        let functions = self
            .functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        DefaultExecutor {
            env: Arc::new(self.env.snapshot()),
            builtins: Arc::clone(&self.builtins),
            jobs: self.jobs.clone(),
            functions: Arc::new(RwLock::new(functions)),
            last_status: Arc::new(AtomicI32::new(self.last_status())),
            last_background: Arc::clone(&self.last_background),
            resolver: self.resolver.clone(),
        }
    }

    fn expander(&self) -> Expander<'_> {
        Expander::new(&self.env, self.last_status(), self.last_background())
    }

    fn function(&self, name: &str) -> Option<Arc<Command>> {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn define_function(&self, def: &FunctionDef) {
        debug!(name = %def.name, "function defined");
        self.functions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(def.name.clone(), Arc::new((*def.body).clone()));
    }

    fn apply_assignments(&self, assignments: &[Assignment]) -> Result<(), ExecError> {
        let expander = self.expander();
        for assignment in assignments {
            match &assignment.value {
                AssignValue::Scalar(value) => {
                    self.env.set(&assignment.name, &expander.substitute(value)?)?;
                }
                AssignValue::Array(items) => {
                    self.env.set_array(&assignment.name, expander.expand_all(items)?)?;
                }
            }
        }
        Ok(())
    }

    fn exec_simple(&self, cmd: &SimpleCommand, io: &IoContext) -> ExecStatus {
        let expander = self.expander();
        let name = expander.substitute(&cmd.name)?;
        let args = expander.expand_all(&cmd.args)?;
        let redirects = self.expand_redirects(cmd)?;

        if name.is_empty() {
            self.apply_assignments(&cmd.assignments)?;
            // Still creates or truncates the targets, like `> file` alone does.
            io.with_redirects(&redirects)?;
            return Ok(0);
        }

        let io = io.with_redirects(&redirects)?;

        if let Some(builtin) = self.builtins.lookup(&name) {
            debug!(command = %name, "builtin");
            self.apply_assignments(&cmd.assignments)?;
            let ctx = BuiltinContext { io: &io, shell: self };
            return match builtin.run(&args, &ctx) {
                Err(ExecError::Exit(code)) => Err(ExecError::Exit(code)),
                Err(e) => {
                    report(&io, Some(&name), &e);
                    Ok(e.status())
                }
                ok => ok,
            };
        }

        if let Some(body) = self.function(&name) {
            debug!(function = %name, "call");
            let scope = self.scoped();
            scope.apply_assignments(&cmd.assignments)?;
            scope.bind_positional(&args)?;
            return scope.exec(&body, &io);
        }

        let path = self.resolve(&name)?;
        let mut command = self.external_command(&path, &name, &args, &cmd.assignments, &io)?;
        debug!(command = %name, path = %path.display(), "spawn");
        let mut child = command.spawn().map_err(|source| ExecError::Process {
            command: name.clone(),
            source,
        })?;
        // Drop our copies of the child's stdio before blocking on it.
        drop(command);
        self.wait_foreground(child, &name, &cmd.to_string(), &io)
    }

    /// Waits for a foreground child. One stopped by a signal is handed to the
    /// job table as Stopped, and the shell carries on.
    fn wait_foreground(&self, child: Child, name: &str, text: &str, io: &IoContext) -> ExecStatus {
        let process_error = |errno: Errno| ExecError::Process {
            command: name.to_string(),
            source: errno.into(),
        };
        let pid = i32::try_from(child.id()).map_err(|_| process_error(Errno::ESRCH))?;
        loop {
            match waitpid(Pid::from_raw(pid), Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(code),
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    info!(?signal, "child killed by signal");
                    return Ok(128 + signal as i32);
                }
                Ok(WaitStatus::Stopped(_, signal)) => {
                    let id = self.jobs.add_stopped(child, text)?;
                    writeln!(io.err(), "\n[{}]+  Stopped  {}", id, text)?;
                    return Ok(128 + signal as i32);
                }
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(errno) => return Err(process_error(errno)),
            }
        }
    }

    fn expand_redirects(&self, cmd: &SimpleCommand) -> Result<Vec<Redirect>, ExecError> {
        let expander = self.expander();
        cmd.redirects
            .iter()
            .map(|r| {
                Ok(Redirect {
                    kind: r.kind,
                    target: expander.substitute(&r.target)?,
                })
            })
            .collect()
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, ExecError> {
        let path_var = self.env.get("PATH");
        self.resolver
            .resolve(name, path_var.as_deref())
            .ok_or_else(|| ExecError::CommandNotFound(name.to_string()))
    }

    fn external_command(
        &self,
        path: &Path,
        name: &str,
        args: &[String],
        assignments: &[Assignment],
        io: &IoContext,
    ) -> Result<process::Command, ExecError> {
        let expander = self.expander();
        let mut command = process::Command::new(path);
        command
            .arg0(name)
            .args(args)
            .env_clear()
            .envs(self.env.exported_vars());
        // Prefix assignments reach only this child.
        for assignment in assignments {
            let value = match &assignment.value {
                AssignValue::Scalar(value) => expander.substitute(value)?,
                AssignValue::Array(items) => expander.expand_all(items)?.join(" "),
            };
            command.env(&assignment.name, value);
        }
        command
            .stdin(io.stdin.stdio()?)
            .stdout(io.stdout.stdio()?)
            .stderr(io.stderr.stdio()?);
        Ok(command)
    }

    fn bind_positional(&self, args: &[String]) -> Result<(), ExecError> {
        for i in 1..=9 {
            match args.get(i - 1) {
                Some(arg) => self.env.set(&i.to_string(), arg)?,
                None => self.env.unset(&i.to_string())?,
            }
        }
        self.env.set("#", &args.len().to_string())?;
        Ok(())
    }

    fn exec_background(&self, command: &Command, source: &str, io: &IoContext) -> ExecStatus {
        if let Command::Simple(simple) = command {
            if let Some(status) = self.spawn_job(simple, source, io)? {
                return Ok(status);
            }
        }

        // Builtins, functions and compound commands run as a subshell on a
        // thread of their own, tracked as a job without a pid.
        let worker = self.scoped();
        let tree = command.clone();
        let worker_io = io.try_clone()?;
        let id = self.jobs.add_task(source, move || match worker.exec(&tree, &worker_io) {
            Ok(status) => status,
            Err(e) => normalize_status(e.status()),
        })?;
        writeln!(io.err(), "[{}]", id)?;
        Ok(0)
    }

    /// Starts an external command as a job. `None` when the name is not external.
    fn spawn_job(
        &self,
        cmd: &SimpleCommand,
        source: &str,
        io: &IoContext,
    ) -> Result<Option<i32>, ExecError> {
        let expander = self.expander();
        let name = expander.substitute(&cmd.name)?;
        if name.is_empty() || self.builtins.is_builtin(&name) || self.function(&name).is_some() {
            return Ok(None);
        }
        let args = expander.expand_all(&cmd.args)?;
        let redirects = self.expand_redirects(cmd)?;
        let mut job_io = io.with_redirects(&redirects)?;
        if !redirects.iter().any(|r| r.kind.stream() == StreamTarget::Stdin) {
            job_io.stdin = Stream::Null;
        }

        let path = self.resolve(&name)?;
        let mut command = self.external_command(&path, &name, &args, &cmd.assignments, &job_io)?;
        let child = command.spawn().map_err(|source| ExecError::Process {
            command: name.clone(),
            source,
        })?;
        drop(command);
        let pid = child.id();
        let id = self.jobs.add(child, source)?;
        self.last_background.store(pid, Ordering::SeqCst);
        writeln!(io.err(), "[{}] {}", id, pid)?;
        Ok(Some(0))
    }

    fn exec_list(&self, list: &List, io: &IoContext) -> ExecStatus {
        let mut status = 0;
        for (i, command) in list.commands.iter().enumerate() {
            status = self.exec(command, io)?;
            match list.operators.get(i) {
                Some(ListOp::And) if status != 0 => break,
                Some(ListOp::Or) if status == 0 => break,
                _ => {}
            }
        }
        Ok(status)
    }

    fn exec_if(&self, cmd: &IfCommand, io: &IoContext) -> ExecStatus {
        if self.exec(&cmd.condition, io)? == 0 {
            self.exec(&cmd.then_branch, io)
        } else if let Some(else_branch) = &cmd.else_branch {
            self.exec(else_branch, io)
        } else {
            Ok(0)
        }
    }

    fn exec_while(&self, cmd: &WhileCommand, io: &IoContext) -> ExecStatus {
        let mut status = 0;
        while self.exec(&cmd.condition, io)? == 0 {
            status = self.exec(&cmd.body, io)?;
        }
        Ok(status)
    }

    fn exec_for(&self, cmd: &ForCommand, io: &IoContext) -> ExecStatus {
        // Values are fixed before the first iteration.
        let values = self.expander().expand_all(&cmd.values)?;
        let mut status = 0;
        for value in &values {
            self.env.set(&cmd.variable, value)?;
            status = self.exec(&cmd.body, io)?;
        }
        Ok(status)
    }

    fn exec_case(&self, cmd: &CaseCommand, io: &IoContext) -> ExecStatus {
        let expander = self.expander();
        let subject = expander.substitute(&cmd.subject)?;
        for branch in &cmd.branches {
            for pattern in &branch.patterns {
                let pattern = expander.substitute(pattern)?;
                let matched = match Pattern::new(&pattern) {
                    Ok(glob) => glob.matches(&subject),
                    Err(_) => pattern == subject,
                };
                if matched {
                    return self.exec(&branch.body, io);
                }
            }
        }
        Ok(0)
    }

    fn exec_subshell(&self, inner: &Command, io: &IoContext) -> ExecStatus {
        match self.scoped().exec(inner, io) {
            Err(ExecError::Exit(code)) => Ok(code),
            other => other,
        }
    }

    fn exec_group(&self, commands: &[Command], io: &IoContext) -> ExecStatus {
        let mut status = 0;
        for command in commands {
            status = self.exec(command, io)?;
        }
        Ok(status)
    }
}

impl Executor for DefaultExecutor {
    fn exec(&self, node: &Command, io: &IoContext) -> ExecStatus {
        let result = match node {
            Command::Simple(cmd) => self.exec_simple(cmd, io),
            Command::Pipeline { left, right } => run_pipeline(self, left, right, io),
            Command::Background { command, source } => self.exec_background(command, source, io),
            Command::List(list) => self.exec_list(list, io),
            Command::If(cmd) => self.exec_if(cmd, io),
            Command::For(cmd) => self.exec_for(cmd, io),
            Command::While(cmd) => self.exec_while(cmd, io),
            Command::Case(cmd) => self.exec_case(cmd, io),
            Command::Function(def) => {
                self.define_function(def);
                Ok(0)
            }
            Command::Subshell(inner) => self.exec_subshell(inner, io),
            Command::Group(commands) => self.exec_group(commands, io),
        };
        let status = match result {
            Ok(status) => status,
            Err(ExecError::Exit(code)) => return Err(ExecError::Exit(code)),
            Err(e) => {
                report(io, None, &e);
                e.status()
            }
        };
        let status = normalize_status(status);
        self.last_status.store(status, Ordering::SeqCst);
        Ok(status)
    }
}
