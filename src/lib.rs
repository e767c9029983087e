//! A small line-oriented shell that runs pipelines of external programs.
//!
//! A line such as `ls -l | grep rs | wc -l` is split on `|`, every stage is
//! tokenized on whitespace, and each stage runs as its own child process with
//! adjacent stages connected by anonymous pipes. A single-stage line naming
//! a built-in (`exit`, `history`) runs inside the shell instead. Every
//! submitted line is recorded with the pid of its last stage, its start time
//! and how long it took.
//!
//! The main entry point is [`Interpreter`]. The [`parser`] module exposes the
//! line splitter and tokenizer, [`history`] the ledger of past invocations, and
//! [`run_pipeline`] the executor on its own.

mod builtin;
pub mod command;
pub mod config;
pub mod error;
mod external;
pub mod history;
mod interpreter;
mod io_adapters;
pub mod parser;
pub mod session;

pub use builtin::{default_builtins, dispatch};
pub use command::{Dispatch, ExitCode, Flow};
pub use config::ShellConfig;
pub use error::{LedgerError, PipelineError};
pub use external::{PipelineOutcome, Spawn, run_pipeline};
pub use history::{HistoryLedger, InvocationRecord};
/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
pub use io_adapters::ShellOutput;
pub use session::Session;
