use std::fs::File;
use std::io::{Result as IoResult, Write};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

/// Where the shell sends command output.
///
/// Built-ins write to it directly; for pipelines it becomes the stdout of the
/// last stage.
#[derive(Debug, Default)]
pub enum ShellOutput {
    /// The shell's own stdout.
    #[default]
    Inherit,
    /// A descriptor supplied by the embedder, e.g. the write end of a pipe.
    Fd(OwnedFd),
}

impl ShellOutput {
    /// Descriptor for the terminal stage, or `None` to inherit stdout.
    pub fn stage_stdout(&self) -> Option<BorrowedFd<'_>> {
        match self {
            ShellOutput::Inherit => None,
            ShellOutput::Fd(fd) => Some(fd.as_fd()),
        }
    }

    /// Writer for output produced inside the shell process.
    pub fn writer(&self) -> IoResult<Box<dyn Write>> {
        match self {
            ShellOutput::Inherit => Ok(Box::new(std::io::stdout())),
            ShellOutput::Fd(fd) => Ok(Box::new(File::from(fd.try_clone()?))),
        }
    }
}

impl From<OwnedFd> for ShellOutput {
    fn from(fd: OwnedFd) -> Self {
        ShellOutput::Fd(fd)
    }
}
