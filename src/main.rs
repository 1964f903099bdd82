use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

use argh::FromArgs;
use tracing_subscriber::EnvFilter;

use tinysh::config::{Config, ConfigLoader};
use tinysh::error::ShellError;
use tinysh::repl::Shell;
use tinysh::signals;

/// Log filter variable, e.g. `TINYSH_LOG=tinysh=debug`.
const LOG_ENV: &str = "TINYSH_LOG";

#[derive(FromArgs)]
/// A small POSIX-style command interpreter.
struct Args {
    /// run COMMAND and exit
    #[argh(option, short = 'c')]
    command: Option<String>,

    /// configuration file (default: $TINYSH_CONFIG)
    #[argh(option)]
    config: Option<PathBuf>,

    /// script file to run
    #[argh(positional)]
    script: Option<PathBuf>,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(config.log_filter.as_deref().unwrap_or("warn"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(shell: &Shell, args: Args, prompt: String) -> Result<i32, ShellError> {
    let interactive = args.command.is_none() && args.script.is_none() && std::io::stdin().is_terminal();
    if !interactive {
        signals::spawn_listener(false, prompt)?;
    }

    if let Some(command) = args.command {
        return Ok(shell.run_program(&command));
    }
    if let Some(script) = args.script {
        return shell.run_script(&script);
    }
    if !interactive {
        return shell.run_stdin();
    }
    shell.run_interactive()
}

fn main() {
    let args: Args = argh::from_env();

    let config = match ConfigLoader::load(args.config.clone()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tinysh: {}", e);
            process::exit(2);
        }
    };
    init_tracing(&config);

    let prompt = config.prompt.clone();
    let shell = Shell::new(config);
    let status = match run(&shell, args, prompt) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("tinysh: {}", e);
            1
        }
    };
    // Background compound commands run on shell threads and would die with us.
    shell.executor().jobs().wait_tasks();
    process::exit(status);
}
