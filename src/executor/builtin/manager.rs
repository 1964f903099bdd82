use std::collections::HashMap;

use crate::environment::Environment;
use crate::executor::{DefaultExecutor, ExecStatus, IoContext};
use crate::jobs::JobManager;

use super::commands::{
    CdCommand, EchoCommand, ExitCommand, FalseCommand, HelpCommand, PwdCommand, SourceCommand,
    TrueCommand,
};
use super::job_control::{BgCommand, FgCommand, JobsCommand, KillCommand, WaitCommand};
use super::test::TestCommand;
use super::vars::{ExportCommand, ReadCommand, ReadonlyCommand, SetCommand, UnsetCommand};

/// What a builtin can reach while it runs.
pub struct BuiltinContext<'a> {
    pub io: &'a IoContext,
    pub shell: &'a DefaultExecutor,
}

impl BuiltinContext<'_> {
    pub fn env(&self) -> &Environment {
        self.shell.env()
    }

    pub fn jobs(&self) -> &JobManager {
        self.shell.jobs()
    }
}

pub trait BuiltinCommand: Send + Sync {
    fn name(&self) -> &'static str;
    /// One line for `help`.
    fn summary(&self) -> &'static str;
    fn run(&self, args: &[String], ctx: &BuiltinContext<'_>) -> ExecStatus;
}

pub struct BuiltinManager {
    commands: HashMap<String, Box<dyn BuiltinCommand>>,
}

impl Default for BuiltinManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinManager {
    /// A registry holding every shell builtin.
    pub fn new() -> Self {
        let mut mgr = BuiltinManager::empty();
        mgr.register(Box::new(HelpCommand));
        mgr.register(Box::new(CdCommand));
        mgr.register(Box::new(PwdCommand));
        mgr.register(Box::new(EchoCommand));
        mgr.register(Box::new(TrueCommand));
        mgr.register(Box::new(FalseCommand));
        mgr.register(Box::new(ExitCommand));
        mgr.register(Box::new(SourceCommand { name: "source" }));
        mgr.register(Box::new(SourceCommand { name: "." }));
        mgr.register(Box::new(ExportCommand));
        mgr.register(Box::new(UnsetCommand));
        mgr.register(Box::new(ReadonlyCommand));
        mgr.register(Box::new(SetCommand));
        mgr.register(Box::new(ReadCommand));
        mgr.register(Box::new(TestCommand { bracket: false }));
        mgr.register(Box::new(TestCommand { bracket: true }));
        mgr.register(Box::new(JobsCommand));
        mgr.register(Box::new(FgCommand));
        mgr.register(Box::new(BgCommand));
        mgr.register(Box::new(KillCommand));
        mgr.register(Box::new(WaitCommand));
        mgr
    }

    pub fn empty() -> Self {
        BuiltinManager {
            commands: HashMap::new(),
        }
    }

    pub fn register(&mut self, cmd: Box<dyn BuiltinCommand>) {
        self.commands.insert(cmd.name().to_string(), cmd);
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn BuiltinCommand> {
        self.commands.get(name).map(|cmd| cmd.as_ref())
    }

    /// `(name, summary)` pairs sorted by name.
    pub fn entries(&self) -> Vec<(&'static str, &'static str)> {
        let mut entries: Vec<_> = self
            .commands
            .values()
            .map(|cmd| (cmd.name(), cmd.summary()))
            .collect();
        entries.sort();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecError;

    struct Marker;

    impl BuiltinCommand for Marker {
        fn name(&self) -> &'static str {
            "marker"
        }
        fn summary(&self) -> &'static str {
            "test only"
        }
        fn run(&self, args: &[String], _ctx: &BuiltinContext<'_>) -> ExecStatus {
            match args.first() {
                Some(code) => code.parse().map_err(|_| ExecError::InvalidArgument(code.clone())),
                None => Ok(0),
            }
        }
    }

    #[test]
    fn test_default_registry() {
        let mgr = BuiltinManager::new();
        for name in [
            "cd", "pwd", "echo", "help", "exit", "export", "unset", "readonly", "set", "source",
            ".", "read", "test", "[", "jobs", "fg", "bg", "kill", "wait", "true", "false",
        ] {
            assert!(mgr.is_builtin(name), "{name} should be a builtin");
        }
        assert!(!mgr.is_builtin("ls"));
        assert!(mgr.lookup("ls").is_none());
    }

    #[test]
    fn test_register_and_run() {
        let mut mgr = BuiltinManager::empty();
        mgr.register(Box::new(Marker));
        let shell = DefaultExecutor::detached();
        let io = IoContext::inherit();
        let ctx = BuiltinContext { io: &io, shell: &shell };
        let marker = mgr.lookup("marker").unwrap();
        assert_eq!(marker.run(&["4".to_string()], &ctx).unwrap(), 4);
        assert!(matches!(
            marker.run(&["x".to_string()], &ctx),
            Err(ExecError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_entries_are_sorted() {
        let entries = BuiltinManager::new().entries();
        let names: Vec<&str> = entries.iter().map(|(name, _)| *name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(entries.iter().all(|(_, summary)| !summary.is_empty()));
    }
}
