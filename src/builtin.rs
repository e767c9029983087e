use crate::command::{CommandFactory, Dispatch, ExecutableCommand, ExitCode};
use crate::parser::Argv;
use crate::session::Session;
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use std::io::Write;
use tracing::debug;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "exit" or "history".
    fn name() -> &'static str;

    /// Builds the command from its arguments. `EarlyExit` turns into usage
    /// or an argument error instead of running the command.
    fn parse(name: &str, args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[name], args)
    }

    /// Executes the command using the provided output and session.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, stdout, session) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stdout, "{}", e)?;
                Ok(1)
            }
        }
    }
}

/// Stands in for a builtin whose arguments did not parse (or asked for `--help`).
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, _session: &mut Session) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.output)?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

/// Factory allows creating instances of a builtin by name.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::parse(name, args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

/// The fixed set of commands that must run inside the shell's own process.
pub fn default_builtins() -> Vec<Box<dyn CommandFactory>> {
    vec![
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<History>::default()),
    ]
}

/// Look up the builtin named by `argv`, if any.
pub(crate) fn find_builtin(
    factories: &[Box<dyn CommandFactory>],
    argv: &Argv<'_>,
) -> Option<Box<dyn ExecutableCommand>> {
    let name = argv.program()?;
    factories
        .iter()
        .find_map(|factory| factory.try_create(name, argv.args()))
}

/// Run a builtin in-process if `argv` names one.
///
/// Only single-stage lines may be dispatched here; pipelines always run
/// their stages as external programs.
pub fn dispatch(
    factories: &[Box<dyn CommandFactory>],
    argv: &Argv<'_>,
    stdout: &mut dyn Write,
    session: &mut Session,
) -> Result<Dispatch> {
    match find_builtin(factories, argv) {
        Some(cmd) => run_builtin(cmd, stdout, session),
        None => Ok(Dispatch::NotBuiltin),
    }
}

pub(crate) fn run_builtin(
    cmd: Box<dyn ExecutableCommand>,
    stdout: &mut dyn Write,
    session: &mut Session,
) -> Result<Dispatch> {
    let code = cmd.execute(stdout, session)?;
    stdout.flush()?;
    debug!(code, should_exit = session.should_exit, "builtin finished");
    Ok(if session.should_exit {
        Dispatch::Terminate
    } else {
        Dispatch::Continue
    })
}

#[derive(FromArgs)]
/// print the session summary and leave the shell
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored; the shell always exits with status 0
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    /// Anything after `exit` is ignored, including `-1` or `--help`.
    fn parse(_name: &str, args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Exit {
            _args: args.iter().map(|arg| arg.to_string()).collect(),
        })
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        session.history.write_summary(stdout)?;
        session.history.clear();
        session.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// list every command submitted in this session, oldest first
pub struct History {}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(self, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode> {
        session.history.write_listing(stdout)?;
        Ok(0)
    }
}
