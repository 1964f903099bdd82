use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::Child;
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;

use chrono::{DateTime, Local};
use nix::errno::Errno;
use nix::sys::wait::{waitid, Id, WaitPidFlag};
use nix::unistd::Pid;
use thiserror::Error;
use tracing::{info, warn};

use crate::signals;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Done,
    Killed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Killed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Running => "Running",
            JobState::Stopped => "Stopped",
            JobState::Done => "Done",
            JobState::Killed => "Killed",
        };
        f.pad(s)
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("%{0}: no such job")]
    NotFound(usize),
    #[error("%{id}: job is {actual}, expected {expected}")]
    InvalidState {
        id: usize,
        expected: JobState,
        actual: JobState,
    },
    #[error("%{0}: job has already terminated")]
    Finished(usize),
    #[error("%{0}: job runs inside the shell and cannot be signalled")]
    NoProcess(usize),
    #[error("%{id}: failed to send {signal}: {source}")]
    Signal {
        id: usize,
        signal: &'static str,
        #[source]
        source: Errno,
    },
    #[error("could not start job monitor: {0}")]
    Spawn(#[from] io::Error),
}

// Released exactly once, by the thread that owns the job, with the exit code.
#[derive(Debug, Default)]
struct Completion {
    code: Mutex<Option<i32>>,
    ready: Condvar,
}

impl Completion {
    fn release(&self, code: i32) {
        let mut slot = self.code.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(code);
        self.ready.notify_all();
    }

    fn wait(&self) -> i32 {
        let slot = self.code.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = self
            .ready
            .wait_while(slot, |code| code.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        slot.unwrap_or(1)
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: usize,
    /// `None` for a job that runs on a shell thread rather than as a child process.
    pub pid: Option<u32>,
    pub command: String,
    pub state: JobState,
    pub started: DateTime<Local>,
    pub finished: Option<DateTime<Local>>,
    pub exit_code: Option<i32>,
    completion: Arc<Completion>,
}

impl Job {
    pub fn elapsed(&self) -> chrono::TimeDelta {
        self.finished.unwrap_or_else(Local::now) - self.started
    }

    fn process(&self) -> Result<u32, JobError> {
        self.pid.ok_or(JobError::NoProcess(self.id))
    }
}

fn format_elapsed(delta: chrono::TimeDelta) -> String {
    let secs = delta.num_seconds().max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match (self.state, self.exit_code) {
            (JobState::Done, Some(code)) if code != 0 => format!("Exit {}", code),
            (state, _) => state.to_string(),
        };
        let pid = self.pid.map_or_else(|| "-".to_string(), |pid| pid.to_string());
        write!(
            f,
            "{:<5} {:<8} {:<8} {:>6}  {}",
            format!("[{}]", self.id),
            state,
            pid,
            format_elapsed(self.elapsed()),
            self.command
        )
    }
}

#[derive(Debug, Default)]
struct JobTable {
    jobs: BTreeMap<usize, Job>,
    last_id: usize,
}

impl JobTable {
    fn insert(&mut self, pid: Option<u32>, command: &str, state: JobState) -> (usize, Arc<Completion>) {
        self.last_id += 1;
        let id = self.last_id;
        let completion = Arc::new(Completion::default());
        self.jobs.insert(
            id,
            Job {
                id,
                pid,
                command: command.to_string(),
                state,
                started: Local::now(),
                finished: None,
                exit_code: None,
                completion: Arc::clone(&completion),
            },
        );
        (id, completion)
    }

    fn finish(&mut self, id: usize, state: JobState, code: i32) {
        if let Some(job) = self.jobs.get_mut(&id) {
            // An explicit kill already moved the job to a terminal state.
            if !job.state.is_terminal() {
                job.state = state;
            }
            job.finished = Some(Local::now());
            job.exit_code = Some(code);
        }
    }

    /// The job if it is still alive, for sending it a signal.
    fn live(&mut self, id: usize) -> Result<&mut Job, JobError> {
        let job = self.jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        if job.state.is_terminal() {
            return Err(JobError::Finished(id));
        }
        Ok(job)
    }
}

/// Table of background jobs. Cloning shares the same table.
///
/// A child is only reaped while the table's write lock is held, and every
/// signal is sent under the same lock after checking the job is still live.
/// So a job that looks live always has a pid the kernel has not recycled.
#[derive(Debug, Clone, Default)]
pub struct JobManager {
    table: Arc<RwLock<JobTable>>,
}

fn read_table(table: &RwLock<JobTable>) -> RwLockReadGuard<'_, JobTable> {
    table.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_table(table: &RwLock<JobTable>) -> RwLockWriteGuard<'_, JobTable> {
    table.write().unwrap_or_else(PoisonError::into_inner)
}

impl JobManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a running child and starts the monitor thread that reaps it.
    pub fn add(&self, child: Child, command: &str) -> Result<usize, JobError> {
        self.watch(child, command, JobState::Running)
    }

    /// Registers a child that was stopped while in the foreground.
    pub fn add_stopped(&self, child: Child, command: &str) -> Result<usize, JobError> {
        self.watch(child, command, JobState::Stopped)
    }

    fn watch(&self, child: Child, command: &str, state: JobState) -> Result<usize, JobError> {
        let pid = child.id();
        let (id, completion) = write_table(&self.table).insert(Some(pid), command, state);

        let table = Arc::clone(&self.table);
        let spawned = thread::Builder::new()
            .name(format!("job-{id}"))
            .spawn(move || monitor(table, id, child, completion));
        if let Err(e) = spawned {
            write_table(&self.table).jobs.remove(&id);
            return Err(JobError::Spawn(e));
        }

        info!(job = id, pid, command, %state, "job started");
        Ok(id)
    }

    /// Runs `task` on a thread of its own as a job without a process.
    /// The job is Done with whatever code `task` returns.
    pub fn add_task<F>(&self, command: &str, task: F) -> Result<usize, JobError>
    where
        F: FnOnce() -> i32 + Send + 'static,
    {
        let (id, completion) = write_table(&self.table).insert(None, command, JobState::Running);

        let table = Arc::clone(&self.table);
        let spawned = thread::Builder::new().name(format!("job-{id}")).spawn(move || {
            let code = task();
            write_table(&table).finish(id, JobState::Done, code);
            info!(job = id, code, "job finished");
            completion.release(code);
        });
        if let Err(e) = spawned {
            write_table(&self.table).jobs.remove(&id);
            return Err(JobError::Spawn(e));
        }

        info!(job = id, command, "task job started");
        Ok(id)
    }

    pub fn get(&self, id: usize) -> Option<Job> {
        read_table(&self.table).jobs.get(&id).cloned()
    }

    pub fn get_by_pid(&self, pid: u32) -> Option<Job> {
        read_table(&self.table)
            .jobs
            .values()
            .find(|j| j.pid == Some(pid))
            .cloned()
    }

    /// All jobs in id order.
    pub fn list(&self) -> Vec<Job> {
        read_table(&self.table).jobs.values().cloned().collect()
    }

    pub fn by_state(&self, state: JobState) -> Vec<Job> {
        read_table(&self.table)
            .jobs
            .values()
            .filter(|j| j.state == state)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        read_table(&self.table).jobs.len()
    }

    pub fn running_count(&self) -> usize {
        self.count_in(JobState::Running)
    }

    pub fn stopped_count(&self) -> usize {
        self.count_in(JobState::Stopped)
    }

    fn count_in(&self, state: JobState) -> usize {
        read_table(&self.table)
            .jobs
            .values()
            .filter(|j| j.state == state)
            .count()
    }

    /// Highest id among jobs in one of `states`; the default target of `fg`/`bg`.
    pub fn latest(&self, states: &[JobState]) -> Option<usize> {
        read_table(&self.table)
            .jobs
            .values()
            .rev()
            .find(|j| states.contains(&j.state))
            .map(|j| j.id)
    }

    /// Drops every job that reached Done or Killed. Returns how many were removed.
    pub fn clean(&self) -> usize {
        let mut table = write_table(&self.table);
        let before = table.jobs.len();
        table.jobs.retain(|_, j| !j.state.is_terminal());
        before - table.jobs.len()
    }

    pub fn kill(&self, id: usize) -> Result<(), JobError> {
        let mut table = write_table(&self.table);
        let job = table.live(id)?;
        let pid = job.process()?;

        if let Err(errno) = signals::terminate_process(pid) {
            warn!(job = id, %errno, "SIGTERM failed, sending SIGKILL");
            signals::force_kill(pid).map_err(|source| JobError::Signal {
                id,
                signal: "SIGKILL",
                source,
            })?;
        }
        // A stopped process only acts on SIGTERM once continued.
        if job.state == JobState::Stopped {
            let _ = signals::continue_process(pid);
        }
        job.state = JobState::Killed;
        info!(job = id, "job killed");
        Ok(())
    }

    /// SIGKILL without trying SIGTERM first.
    pub fn force_kill(&self, id: usize) -> Result<(), JobError> {
        let mut table = write_table(&self.table);
        let job = table.live(id)?;
        signals::force_kill(job.process()?).map_err(|source| JobError::Signal {
            id,
            signal: "SIGKILL",
            source,
        })?;
        job.state = JobState::Killed;
        info!(job = id, "job killed");
        Ok(())
    }

    pub fn stop(&self, id: usize) -> Result<(), JobError> {
        self.transition(id, JobState::Running, JobState::Stopped, "SIGSTOP", signals::stop_process)
    }

    pub fn resume(&self, id: usize) -> Result<(), JobError> {
        self.transition(id, JobState::Stopped, JobState::Running, "SIGCONT", signals::continue_process)
    }

    fn transition(
        &self,
        id: usize,
        from: JobState,
        to: JobState,
        signal: &'static str,
        send: fn(u32) -> Result<(), Errno>,
    ) -> Result<(), JobError> {
        let mut table = write_table(&self.table);
        let job = table.jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        if job.state != from {
            return Err(JobError::InvalidState {
                id,
                expected: from,
                actual: job.state,
            });
        }
        send(job.process()?).map_err(|source| JobError::Signal { id, signal, source })?;
        job.state = to;
        info!(job = id, state = %to, "job state changed");
        Ok(())
    }

    /// Resumes the job if stopped, then blocks until it exits. Returns its exit code.
    pub fn foreground(&self, id: usize) -> Result<i32, JobError> {
        let completion = {
            let mut table = write_table(&self.table);
            let job = table.jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
            if job.state == JobState::Stopped {
                signals::continue_process(job.process()?).map_err(|source| {
                    JobError::Signal {
                        id,
                        signal: "SIGCONT",
                        source,
                    }
                })?;
                job.state = JobState::Running;
            }
            Arc::clone(&job.completion)
        };
        // The lock is released while waiting so the monitor can record the exit.
        Ok(completion.wait())
    }

    /// Resumes a stopped job without waiting for it.
    pub fn background(&self, id: usize) -> Result<(), JobError> {
        let state = self.get(id).ok_or(JobError::NotFound(id))?.state;
        match state {
            JobState::Stopped => self.resume(id),
            JobState::Running => Ok(()),
            JobState::Done | JobState::Killed => Err(JobError::Finished(id)),
        }
    }

    /// Blocks until the job exits and returns its exit code.
    pub fn wait(&self, id: usize) -> Result<i32, JobError> {
        let completion = read_table(&self.table)
            .jobs
            .get(&id)
            .map(|j| Arc::clone(&j.completion))
            .ok_or(JobError::NotFound(id))?;
        Ok(completion.wait())
    }

    /// Waits for every job in the table. Returns the exit code of the highest id, or 0 with no jobs.
    pub fn wait_all(&self) -> i32 {
        self.wait_where(|_| true)
    }

    /// Waits for the jobs that run on shell threads. They die with the shell,
    /// unlike child processes, so the shell waits for them before exiting.
    pub fn wait_tasks(&self) -> i32 {
        self.wait_where(|job| job.pid.is_none())
    }

    fn wait_where(&self, pick: impl Fn(&Job) -> bool) -> i32 {
        let pending: Vec<Arc<Completion>> = read_table(&self.table)
            .jobs
            .values()
            .filter(|j| pick(j))
            .map(|j| Arc::clone(&j.completion))
            .collect();
        pending.iter().map(|c| c.wait()).last().unwrap_or(0)
    }
}

fn monitor(table: Arc<RwLock<JobTable>>, id: usize, mut child: Child, completion: Arc<Completion>) {
    wait_exited(id, child.id());

    let code = {
        // Reaping frees the pid, so it happens under the lock that signal senders take.
        let mut table = write_table(&table);
        let (state, code) = match child.wait() {
            Ok(status) => match (status.code(), status.signal()) {
                (Some(code), _) => (JobState::Done, code),
                (None, Some(signo)) => (JobState::Killed, 128 + signo),
                (None, None) => (JobState::Killed, 1),
            },
            Err(e) => {
                warn!(job = id, error = %e, "wait failed");
                (JobState::Killed, 1)
            }
        };
        table.finish(id, state, code);
        code
    };
    info!(job = id, code, "job finished");
    completion.release(code);
}

// Blocks until the child has exited, leaving it unreaped.
fn wait_exited(id: usize, pid: u32) {
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    loop {
        match waitid(Id::Pid(Pid::from_raw(raw)), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT) {
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                warn!(job = id, %errno, "waitid failed");
                return;
            }
            Ok(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn spawn(program: &str, args: &[&str]) -> Child {
        Command::new(program).args(args).spawn().unwrap()
    }

    #[test]
    fn test_add_then_wait_reaches_done() {
        let jobs = JobManager::new();
        let id = jobs.add(spawn("sleep", &["0.2"]), "sleep 0.2").unwrap();
        let job = jobs.get(id).unwrap();
        assert_eq!(job.state, JobState::Running);
        assert_eq!(job.command, "sleep 0.2");
        assert_eq!(jobs.running_count(), 1);

        assert_eq!(jobs.wait(id).unwrap(), 0);
        let job = jobs.get(id).unwrap();
        assert_eq!(job.state, JobState::Done);
        assert_eq!(job.exit_code, Some(0));
        assert!(job.finished.is_some());
    }

    #[test]
    fn test_nonzero_exit_is_still_done() {
        let jobs = JobManager::new();
        let id = jobs.add(spawn("sh", &["-c", "exit 3"]), "sh").unwrap();
        assert_eq!(jobs.wait(id).unwrap(), 3);
        assert_eq!(jobs.get(id).unwrap().state, JobState::Done);
        assert!(jobs.get(id).unwrap().to_string().contains("Exit 3"));
    }

    #[test]
    fn test_signal_death_is_killed_with_derived_code() {
        let jobs = JobManager::new();
        let child = spawn("sleep", &["5"]);
        let pid = child.id();
        let id = jobs.add(child, "sleep 5").unwrap();
        signals::force_kill(pid).unwrap();
        assert_eq!(jobs.wait(id).unwrap(), 128 + 9);
        assert_eq!(jobs.get(id).unwrap().state, JobState::Killed);
    }

    #[test]
    fn test_kill_marks_killed_immediately_and_stays_terminal() {
        let jobs = JobManager::new();
        let id = jobs.add(spawn("sleep", &["5"]), "sleep 5").unwrap();
        jobs.kill(id).unwrap();
        assert_eq!(jobs.get(id).unwrap().state, JobState::Killed);
        assert_eq!(jobs.wait(id).unwrap(), 128 + 15);
        assert_eq!(jobs.get(id).unwrap().state, JobState::Killed);
        assert!(matches!(jobs.kill(id), Err(JobError::Finished(i)) if i == id));
    }

    #[test]
    fn test_force_kill() {
        let jobs = JobManager::new();
        let id = jobs.add(spawn("sleep", &["5"]), "sleep 5").unwrap();
        jobs.force_kill(id).unwrap();
        assert_eq!(jobs.wait(id).unwrap(), 128 + 9);
        assert!(matches!(jobs.force_kill(id), Err(JobError::Finished(_))));
    }

    #[test]
    fn test_stop_resume_and_state_checks() {
        let jobs = JobManager::new();
        let id = jobs.add(spawn("sleep", &["5"]), "sleep 5").unwrap();

        assert!(matches!(
            jobs.resume(id),
            Err(JobError::InvalidState { expected: JobState::Stopped, actual: JobState::Running, .. })
        ));
        jobs.stop(id).unwrap();
        assert_eq!(jobs.get(id).unwrap().state, JobState::Stopped);
        assert_eq!(jobs.stopped_count(), 1);
        assert_eq!(jobs.by_state(JobState::Stopped).len(), 1);
        assert!(matches!(jobs.stop(id), Err(JobError::InvalidState { .. })));

        jobs.resume(id).unwrap();
        assert_eq!(jobs.get(id).unwrap().state, JobState::Running);
        jobs.kill(id).unwrap();
        jobs.wait(id).unwrap();
    }

    #[test]
    fn test_kill_while_stopped_terminates() {
        let jobs = JobManager::new();
        let id = jobs.add(spawn("sleep", &["5"]), "sleep 5").unwrap();
        jobs.stop(id).unwrap();
        jobs.kill(id).unwrap();
        assert_eq!(jobs.wait(id).unwrap(), 128 + 15);
    }

    #[test]
    fn test_foreground_resumes_and_blocks() {
        let jobs = JobManager::new();
        let id = jobs.add(spawn("sleep", &["0.2"]), "sleep 0.2").unwrap();
        jobs.stop(id).unwrap();
        assert_eq!(jobs.foreground(id).unwrap(), 0);
        assert_eq!(jobs.get(id).unwrap().state, JobState::Done);
    }

    #[test]
    fn test_background_resumes_without_blocking() {
        let jobs = JobManager::new();
        let id = jobs.add(spawn("sleep", &["5"]), "sleep 5").unwrap();
        jobs.stop(id).unwrap();
        jobs.background(id).unwrap();
        assert_eq!(jobs.get(id).unwrap().state, JobState::Running);
        // Already running is fine
        jobs.background(id).unwrap();
        jobs.kill(id).unwrap();
        jobs.wait(id).unwrap();
        assert!(matches!(jobs.background(id), Err(JobError::Finished(_))));
    }

    #[test]
    fn test_unknown_ids() {
        let jobs = JobManager::new();
        assert!(matches!(jobs.kill(7), Err(JobError::NotFound(7))));
        assert!(matches!(jobs.stop(7), Err(JobError::NotFound(7))));
        assert!(matches!(jobs.foreground(7), Err(JobError::NotFound(7))));
        assert!(matches!(jobs.background(7), Err(JobError::NotFound(7))));
        assert!(jobs.get(7).is_none());
    }

    #[test]
    fn test_ids_are_never_reused_after_clean() {
        let jobs = JobManager::new();
        let first = jobs.add(spawn("true", &[]), "true").unwrap();
        jobs.wait(first).unwrap();
        assert_eq!(jobs.clean(), 1);
        assert_eq!(jobs.count(), 0);
        let second = jobs.add(spawn("true", &[]), "true").unwrap();
        assert_eq!(second, first + 1);
        jobs.wait(second).unwrap();
    }

    #[test]
    fn test_clean_keeps_unfinished_jobs() {
        let jobs = JobManager::new();
        let done = jobs.add(spawn("true", &[]), "true").unwrap();
        let running = jobs.add(spawn("sleep", &["5"]), "sleep 5").unwrap();
        jobs.wait(done).unwrap();
        assert_eq!(jobs.clean(), 1);
        assert_eq!(jobs.list().iter().map(|j| j.id).collect::<Vec<_>>(), vec![running]);
        assert_eq!(jobs.latest(&[JobState::Running]), Some(running));
        jobs.kill(running).unwrap();
        assert_eq!(jobs.wait_all(), 128 + 15);
    }

    #[test]
    fn test_get_by_pid_and_listing_line() {
        let jobs = JobManager::new();
        let child = spawn("sleep", &["5"]);
        let pid = child.id();
        let id = jobs.add(child, "sleep 5").unwrap();
        let job = jobs.get_by_pid(pid).unwrap();
        assert_eq!(job.id, id);
        let line = job.to_string();
        assert!(line.starts_with(&format!("[{}]", id)));
        assert!(line.contains("Running"));
        assert!(line.ends_with("sleep 5"));
        jobs.kill(id).unwrap();
        jobs.wait(id).unwrap();
    }

    #[test]
    fn test_elapsed_formatting() {
        assert_eq!(format_elapsed(chrono::TimeDelta::seconds(5)), "5s");
        assert_eq!(format_elapsed(chrono::TimeDelta::seconds(125)), "2m05s");
        assert_eq!(format_elapsed(chrono::TimeDelta::seconds(3720)), "1h02m");
        assert_eq!(format_elapsed(chrono::TimeDelta::milliseconds(10)), "0s");
    }

    #[test]
    fn test_task_jobs_are_waited_but_not_signalled() {
        let jobs = JobManager::new();
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let id = jobs
            .add_task("{ work; }", move || {
                rx.recv().unwrap();
                4
            })
            .unwrap();
        let job = jobs.get(id).unwrap();
        assert_eq!(job.pid, None);
        assert_eq!(job.state, JobState::Running);
        assert!(job.to_string().contains(" - "));
        assert!(matches!(jobs.kill(id), Err(JobError::NoProcess(i)) if i == id));
        assert!(matches!(jobs.stop(id), Err(JobError::NoProcess(_))));

        tx.send(()).unwrap();
        assert_eq!(jobs.wait_tasks(), 4);
        assert_eq!(jobs.get(id).unwrap().state, JobState::Done);
        assert_eq!(jobs.get(id).unwrap().exit_code, Some(4));
    }

    #[test]
    fn test_wait_tasks_skips_child_processes() {
        let jobs = JobManager::new();
        let child = jobs.add(spawn("sleep", &["5"]), "sleep 5").unwrap();
        jobs.add_task("true", || 0).unwrap();
        assert_eq!(jobs.wait_tasks(), 0);
        assert_eq!(jobs.get(child).unwrap().state, JobState::Running);
        jobs.kill(child).unwrap();
        jobs.wait(child).unwrap();
    }

    #[test]
    fn test_add_stopped_then_foreground() {
        let jobs = JobManager::new();
        let child = spawn("sh", &["-c", "exit 2"]);
        signals::stop_process(child.id()).unwrap();
        let id = jobs.add_stopped(child, "sh -c 'exit 2'").unwrap();
        assert_eq!(jobs.get(id).unwrap().state, JobState::Stopped);
        assert_eq!(jobs.foreground(id).unwrap(), 2);
        assert_eq!(jobs.get(id).unwrap().state, JobState::Done);
    }

    #[test]
    fn test_job_is_live_until_reaped_under_the_lock() {
        let jobs = JobManager::new();
        let id = jobs.add(spawn("true", &[]), "true").unwrap();
        jobs.wait(id).unwrap();
        // Once the monitor has reaped the child, the job refuses signals.
        assert!(matches!(jobs.kill(id), Err(JobError::Finished(_))));
        assert!(matches!(jobs.force_kill(id), Err(JobError::Finished(_))));
    }
}
