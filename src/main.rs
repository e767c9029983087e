use argh::FromArgs;
use simpleshell::config::DEFAULT_PROMPT;
use simpleshell::history::INITIAL_HISTORY_CAPACITY;
use simpleshell::{Interpreter, ShellConfig};
use std::sync::atomic::Ordering;
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the log filter, e.g. `SIMPLESHELL_LOG=debug`.
const LOG_ENV: &str = "SIMPLESHELL_LOG";

#[derive(FromArgs)]
/// run pipelines of programs and keep a timed history of every command
struct Args {
    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    /// text printed before every input line
    prompt: String,

    #[argh(option, default = "INITIAL_HISTORY_CAPACITY")]
    /// initial number of history records to reserve room for
    history_capacity: usize,

    #[argh(switch, short = 'v')]
    /// log debug diagnostics to stderr unless SIMPLESHELL_LOG says otherwise
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> std::process::ExitCode {
    let args: Args = argh::from_env();
    init_logging(args.verbose);

    let mut sh = Interpreter::new(ShellConfig {
        prompt: args.prompt,
        history_capacity: args.history_capacity,
    });

    let interrupted = sh.interrupt_handle();
    if let Err(err) = ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst)) {
        error!(error = %err, "could not install interrupt handler");
    }

    match sh.repl() {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "shell stopped");
            eprintln!("SimpleShell: {err:#}");
            std::process::ExitCode::FAILURE
        }
    }
}
