use crate::history::INITIAL_HISTORY_CAPACITY;

/// Prompt shown before every line unless configured otherwise.
pub const DEFAULT_PROMPT: &str = "SimpleShell> ";

/// Settings of an interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub prompt: String,
    /// Initial capacity of the history ledger; it doubles when full.
    pub history_capacity: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            history_capacity: INITIAL_HISTORY_CAPACITY,
        }
    }
}
