use crate::builtin::{self, Exit};
use crate::command::{CommandFactory, Dispatch, Flow};
use crate::config::ShellConfig;
use crate::external;
use crate::history::HistoryLedger;
use crate::io_adapters::ShellOutput;
use crate::parser::{self, MAX_STAGES};
use crate::session::Session;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A line-oriented shell that runs pipelines of external programs and keeps
/// a timed history of every submitted line.
///
/// The interpreter owns the [`Session`] (and with it the history ledger) and
/// the set of built-ins. Lines are handled one at a time: a line is split,
/// dispatched or executed, and recorded before the next one is read.
///
/// Example
/// ```no_run
/// use simpleshell::{Flow, Interpreter};
/// let mut sh = Interpreter::default();
/// assert_eq!(sh.execute_line("echo hello | wc -c").unwrap(), Flow::Continue);
/// assert_eq!(sh.history().len(), 1);
/// ```
pub struct Interpreter {
    session: Session,
    builtins: Vec<Box<dyn CommandFactory>>,
    output: ShellOutput,
    config: ShellConfig,
    interrupted: Arc<AtomicBool>,
}

impl Interpreter {
    pub fn new(config: ShellConfig) -> Self {
        Self {
            session: Session::new(HistoryLedger::with_capacity(config.history_capacity)),
            builtins: builtin::default_builtins(),
            output: ShellOutput::Inherit,
            config,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Send command output somewhere other than the shell's stdout.
    pub fn with_output(mut self, output: ShellOutput) -> Self {
        self.output = output;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.session.history
    }

    /// Flag that requests a shutdown once the current line is done.
    ///
    /// Meant to be set from a signal handler; the loop checks it between lines.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Handle one input line.
    ///
    /// Blank lines are ignored. Anything else gets a history record, then
    /// either runs as a built-in (single stage only) or as a pipeline of
    /// external programs. Failing to start a pipeline is reported on stderr
    /// and does not stop the shell.
    pub fn execute_line(&mut self, line: &str) -> anyhow::Result<Flow> {
        if parser::is_blank(line) {
            return Ok(Flow::Continue);
        }
        let (line, truncated) = parser::bound_line(line);
        if truncated {
            warn!(max = parser::MAX_LINE_LEN - 1, "input line too long, truncated");
        }

        let index = self.session.history.append(line);
        let start = Instant::now();

        let stages = parser::split_line(line);
        if stages.truncated() {
            warn!(max = MAX_STAGES, "too many pipeline stages, extra ones dropped");
        }

        if let [stage] = stages.as_slice() {
            let argv = parser::tokenize(stage);
            if let Some(cmd) = builtin::find_builtin(&self.builtins, &argv) {
                self.session
                    .history
                    .finalize(index, self.session.shell_pid, start.elapsed())?;
                debug!(name = argv.program(), "dispatching builtin");
                let mut out = self.output.writer()?;
                return Ok(match builtin::run_builtin(cmd, &mut *out, &mut self.session)? {
                    Dispatch::Terminate => Flow::Terminate,
                    Dispatch::Continue | Dispatch::NotBuiltin => Flow::Continue,
                });
            }
        }

        match external::run_pipeline(stages.as_slice(), self.output.stage_stdout()) {
            Ok(outcome) => {
                let elapsed = start.elapsed();
                self.session
                    .history
                    .finalize(index, outcome.terminal_pid, elapsed)?;
                info!(
                    pid = %outcome.terminal_pid,
                    status = ?outcome.terminal_status(),
                    duration_secs = elapsed.as_secs_f64(),
                    "pipeline finished"
                );
            }
            Err(err) => {
                eprintln!("SimpleShell: {err}");
            }
        }
        Ok(Flow::Continue)
    }

    /// Emit the session summary and release the history, as `exit` does.
    pub fn shutdown(&mut self) -> anyhow::Result<()> {
        let mut out = self.output.writer()?;
        let exit = Box::new(Exit { _args: Vec::new() });
        builtin::run_builtin(exit, &mut *out, &mut self.session)?;
        Ok(())
    }

    /// Read-Eval-Print Loop on the terminal.
    ///
    /// Ends on `exit`, end of input, or an interrupt. In the last two cases
    /// the summary is emitted here, on the normal control path.
    pub fn repl(&mut self) -> anyhow::Result<()> {
        let mut rl = DefaultEditor::new()?;

        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                info!("interrupt received, shutting down");
                break;
            }
            match rl.readline(&self.config.prompt) {
                Ok(line) => {
                    if !parser::is_blank(&line) {
                        rl.add_history_entry(line.as_str())?;
                    }
                    match self.execute_line(&line) {
                        Ok(Flow::Terminate) => return Ok(()),
                        Ok(Flow::Continue) => {}
                        Err(err) => {
                            error!(error = %err, "line failed");
                            eprintln!("SimpleShell: {err:#}");
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    info!("interrupted at prompt");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    debug!("end of input");
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.shutdown()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(ShellConfig::default())
    }
}
