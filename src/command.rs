use crate::session::Session;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Exit status of a child whose program could not be executed.
pub const COMMAND_NOT_FOUND: ExitCode = 127;

/// What the shell loop should do after a line has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// Stop the loop; the session summary has already been emitted.
    Terminate,
}

/// Result of offering a single-stage command to the built-in dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The name is not a built-in; run it as an external program.
    NotBuiltin,
    /// The built-in ran and the loop goes on.
    Continue,
    /// The built-in ran and the loop must stop.
    Terminate,
}

/// Object-safe trait for a command that runs inside the shell's own process.
pub trait ExecutableCommand {
    /// Executes the command against the session state.
    fn execute(self: Box<Self>, stdout: &mut dyn Write, session: &mut Session) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}
