use std::fs::File;
use std::thread;

use nix::fcntl::OFlag;
use nix::unistd::pipe2;
use tracing::{debug, warn};

use crate::ast::Command;

use super::executor::{report, ExecError, ExecStatus, Executor};
use super::redirect::{IoContext, Stream};

/// Runs `left | right` with both stages alive at once.
///
/// The left stage runs on a scoped thread, the right one on the caller's.
/// Each stage owns its pipe end and closes it when it finishes, so the
/// reader sees EOF as soon as the writer is done. The status is the right
/// stage's.
pub fn run_pipeline<E>(executor: &E, left: &Command, right: &Command, io: &IoContext) -> ExecStatus
where
    E: Executor + Sync,
{
    let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC).map_err(std::io::Error::from)?;

    let mut left_io = io.try_clone()?;
    left_io.stdout = Stream::File(File::from(write_end));
    let mut right_io = io.try_clone()?;
    right_io.stdin = Stream::File(File::from(read_end));
    debug!(left = %left, right = %right, "pipeline");

    thread::scope(|scope| -> ExecStatus {
        let writer = thread::Builder::new()
            .name("pipeline-stage".to_string())
            .spawn_scoped(scope, move || run_stage(executor, left, left_io))?;
        let status = run_stage(executor, right, right_io);
        if writer.join().is_err() {
            warn!("pipeline stage panicked");
        }
        Ok(status)
    })
}

// `exit` inside a stage ends only that stage.
fn run_stage<E: Executor>(executor: &E, command: &Command, io: IoContext) -> i32 {
    match executor.exec(command, &io) {
        Ok(status) => status,
        Err(ExecError::Exit(code)) => code,
        Err(e) => {
            report(&io, None, &e);
            e.status()
        }
    }
}
