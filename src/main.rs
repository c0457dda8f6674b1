use std::io::IsTerminal;
use std::process::Command;

use anyhow::Result;
use argh::FromArgs;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use osh::ReplController;
use osh::config::{LOG_ENV, ShellConfig};
use osh::env::Environment;
use osh::error::LaunchError;
use osh::input::{EditorReader, PlainReader};
use osh::launcher::SystemLauncher;

#[derive(FromArgs)]
/// A small interactive shell with a bounded, replayable command history.
struct Cli {
    #[argh(switch)]
    /// read commands from standard input without line editing.
    plain: bool,

    #[argh(positional, greedy)]
    /// run this program with its arguments in place of the shell.
    command: Vec<String>,
}

fn main() -> Result<()> {
    let cli: Cli = argh::from_env();
    init_logging();

    if let Some((program, args)) = cli.command.split_first() {
        run_direct(program, args);
    }

    let config = ShellConfig {
        plain: cli.plain || !std::io::stdin().is_terminal(),
        ..ShellConfig::default()
    };
    debug!(?config, "starting interactive shell");
    let launcher = SystemLauncher::with_max_jobs(Environment::new(), config.max_jobs);

    if config.plain {
        let input = PlainReader::new(std::io::stdin().lock(), std::io::stdout());
        ReplController::new(config, input, launcher, std::io::stdout()).run()
    } else {
        let input = EditorReader::new()?;
        ReplController::new(config, input, launcher, std::io::stdout()).run()
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Replace this process with `program`. Only returns by exiting.
#[cfg(unix)]
fn run_direct(program: &str, args: &[String]) -> ! {
    use std::os::unix::process::CommandExt;

    debug!(program, "direct invocation");
    let err = LaunchError::from_spawn(program, Command::new(program).args(args).exec());
    eprintln!("osh: {err}");
    std::process::exit(err.exit_status());
}

#[cfg(not(unix))]
fn run_direct(program: &str, args: &[String]) -> ! {
    debug!(program, "direct invocation");
    match Command::new(program).args(args).status() {
        Ok(status) => std::process::exit(osh::launcher::exit_code(status)),
        Err(e) => {
            let err = LaunchError::from_spawn(program, e);
            eprintln!("osh: {err}");
            std::process::exit(err.exit_status());
        }
    }
}
