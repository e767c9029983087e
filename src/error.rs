//! Error types for the pipeline executor and the history ledger.

/// Reasons a pipeline could not be started.
///
/// Any of these abandons the current line only; the shell loop keeps going.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The pipeline had no stages.
    #[error("empty pipeline")]
    Empty,

    /// A pipe between two stages could not be created.
    #[error("pipe: {0}")]
    Pipe(#[source] nix::Error),

    /// A stage's process could not be created.
    #[error("fork: {0}")]
    Fork(#[source] nix::Error),

    /// A token cannot be handed to the OS as a C string.
    #[error("argument contains a NUL byte: {0:?}")]
    InvalidArgument(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("no history record at index {0}")]
    NoSuchRecord(usize),
}
