use crate::history::HistoryLedger;
use nix::unistd::{Pid, getpid};

/// Mutable state of one interactive session.
///
/// The session owns the history ledger; built-ins receive it by `&mut` so
/// nothing has to live in a global.
///
/// Note: fields are public to keep built-ins short, like the rest of this crate.
#[derive(Debug)]
pub struct Session {
    /// Every line submitted so far.
    pub history: HistoryLedger,
    /// Pid recorded for commands that run inside the shell itself.
    pub shell_pid: Pid,
    /// When set to true, the interactive loop stops after the current line.
    pub should_exit: bool,
}

impl Session {
    pub fn new(history: HistoryLedger) -> Self {
        Self {
            history,
            shell_pid: getpid(),
            should_exit: false,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(HistoryLedger::new())
    }
}
