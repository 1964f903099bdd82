//! Signal handling for the interpreter
//!
//! - A listener thread that lives for the whole process and turns
//!   SIGINT/SIGTERM/SIGTSTP into shell actions
//! - Thin `kill(2)` wrappers used by job control

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use signal_hook::consts::{SIGINT, SIGTERM, SIGTSTP};
use signal_hook::iterator::Signals;
use tracing::{debug, info};

/// Set while a line is being executed, so SIGINT does not redraw the prompt
/// over a running command's output.
static BUSY: AtomicBool = AtomicBool::new(false);

pub fn set_busy(busy: bool) {
    BUSY.store(busy, Ordering::SeqCst);
}

/// Starts the listener thread.
///
/// Interactive: SIGINT abandons the current input line and redraws `prompt`,
/// SIGTSTP at the prompt suspends the interpreter. Non-interactive: SIGINT exits with 130.
/// SIGTERM always exits with 143.
pub fn spawn_listener(interactive: bool, prompt: String) -> io::Result<JoinHandle<()>> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGTSTP])?;
    thread::Builder::new()
        .name("signal-listener".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                debug!(signal, "signal received");
                match signal {
                    SIGINT if interactive => {
                        let mut out = io::stdout();
                        if BUSY.load(Ordering::SeqCst) {
                            let _ = writeln!(out);
                        } else {
                            let _ = write!(out, "\n{prompt}");
                        }
                        let _ = out.flush();
                    }
                    SIGINT => std::process::exit(130),
                    SIGTERM => {
                        info!("terminated by SIGTERM");
                        std::process::exit(143);
                    }
                    // A foreground child is stopped instead and becomes a job.
                    SIGTSTP if interactive && !BUSY.load(Ordering::SeqCst) => {
                        if let Err(e) = suspend_self() {
                            debug!(error = %e, "could not suspend");
                        }
                    }
                    _ => {}
                }
            }
        })
}

fn suspend_self() -> Result<(), Errno> {
    kill(Pid::this(), Signal::SIGSTOP)
}

/// Pids that name exactly one process. 0 and anything that would wrap to a
/// negative `pid_t` address process groups or every process, so they are refused.
fn pid_of(pid: u32) -> Result<Pid, Errno> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(Pid::from_raw(raw)),
        _ => Err(Errno::EINVAL),
    }
}

/// Send SIGSTOP to a process
pub fn stop_process(pid: u32) -> Result<(), Errno> {
    kill(pid_of(pid)?, Signal::SIGSTOP)
}

/// Send SIGCONT to a process
pub fn continue_process(pid: u32) -> Result<(), Errno> {
    kill(pid_of(pid)?, Signal::SIGCONT)
}

/// Send SIGTERM to a process
pub fn terminate_process(pid: u32) -> Result<(), Errno> {
    kill(pid_of(pid)?, Signal::SIGTERM)
}

/// Send SIGKILL to a process
pub fn force_kill(pid: u32) -> Result<(), Errno> {
    kill(pid_of(pid)?, Signal::SIGKILL)
}
