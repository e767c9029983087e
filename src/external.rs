//! Running pipelines of external programs.
//!
//! Every stage becomes its own child process. Adjacent stages are joined by an
//! anonymous pipe whose ends are handed out so that, once setup is done, each
//! end is open in exactly one process: the writer's stdout or the reader's
//! stdin. The shell drops its copies as soon as the next stage is forked,
//! otherwise a reader would never see EOF.

use crate::command::{COMMAND_NOT_FOUND, ExitCode};
use crate::error::PipelineError;
use crate::parser;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::libc;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{self, ForkResult, Pid, dup2, fork, pipe2};
use std::ffi::CString;
use std::io::Write;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use tracing::{debug, warn};

/// What came out of a pipeline once all of its stages were reaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Pid of the last stage; this is the pid recorded in history.
    pub terminal_pid: Pid,
    /// Exit status per stage, in stage order. `None` if a stage could not be
    /// reaped.
    pub statuses: Vec<Option<ExitCode>>,
}

impl PipelineOutcome {
    /// Exit status of the last stage.
    pub fn terminal_status(&self) -> Option<ExitCode> {
        self.statuses.last().copied().flatten()
    }

    pub fn success(&self) -> bool {
        self.terminal_status() == Some(0)
    }
}

/// Result of trying to start one stage.
#[derive(Debug)]
pub enum Spawn {
    /// The child exists; it is either running its program or reporting that
    /// the program could not be found.
    Running(Pid),
    /// No child was created.
    LaunchFailed(nix::Error),
}

/// Arguments of one stage, converted before forking so the child does not
/// have to allocate.
struct ExecArgs {
    argv: Vec<CString>,
    /// NULL-terminated pointers into `argv`, as `execvp(3)` takes them.
    ptrs: Vec<*const libc::c_char>,
    not_found: Vec<u8>,
}

impl ExecArgs {
    fn new(stage: &str) -> Result<Self, PipelineError> {
        let tokens = parser::tokenize(stage);
        if tokens.truncated() {
            debug!(stage, "stage has too many arguments, extra ones dropped");
        }
        let argv = tokens
            .tokens()
            .iter()
            .map(|token| {
                CString::new(*token).map_err(|_| PipelineError::InvalidArgument(token.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let ptrs = argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();
        let not_found = match tokens.program() {
            Some(name) => format!("SimpleShell: command not found: {name}\n").into_bytes(),
            None => Vec::new(),
        };
        Ok(Self {
            argv,
            ptrs,
            not_found,
        })
    }
}

/// The descriptors one child needs to rewire before it execs.
struct StageIo<'a> {
    /// Read end of the pipe from the previous stage.
    stdin: Option<&'a OwnedFd>,
    /// Both ends of the pipe to the next stage.
    pipe: Option<&'a (OwnedFd, OwnedFd)>,
    /// Where the last stage writes, when not the shell's own stdout.
    output: Option<BorrowedFd<'a>>,
}

/// Run `stages` as one pipeline and wait for all of them.
///
/// Every stage is tokenized before the first process is started, so an
/// argument the OS cannot take fails the whole line with nothing spawned. The
/// first stage reads the shell's stdin; the last writes to `output` or, when
/// that is `None`, to the shell's stdout.
///
/// A stage whose program cannot be run still counts as started: its child
/// reports the problem and exits with [`COMMAND_NOT_FOUND`]. Failure to
/// create a pipe or a process is returned as an error, after the shell's pipe
/// ends are closed and the stages that did start are reaped.
pub fn run_pipeline(
    stages: &[&str],
    output: Option<BorrowedFd<'_>>,
) -> Result<PipelineOutcome, PipelineError> {
    if stages.is_empty() {
        return Err(PipelineError::Empty);
    }
    let prepared = stages
        .iter()
        .map(|stage| ExecArgs::new(stage))
        .collect::<Result<Vec<_>, _>>()?;
    let last = stages.len() - 1;
    let mut children: Vec<Pid> = Vec::with_capacity(stages.len());
    let mut prev_read: Option<OwnedFd> = None;

    for (i, (stage, args)) in stages.iter().zip(&prepared).enumerate() {
        let pipe = if i < last {
            match pipe2(OFlag::O_CLOEXEC) {
                Ok(pipe) => Some(pipe),
                Err(err) => {
                    // Started stages block on their pipes until these close.
                    drop(prev_read.take());
                    return Err(abandon(PipelineError::Pipe(err), &children));
                }
            }
        } else {
            None
        };

        let io = StageIo {
            stdin: prev_read.as_ref(),
            pipe: pipe.as_ref(),
            output: if i == last { output } else { None },
        };
        match spawn_stage(args, &io) {
            Spawn::Running(pid) => {
                debug!(stage = i, %pid, command = stage.trim(), "stage started");
                children.push(pid);
            }
            Spawn::LaunchFailed(err) => {
                drop(pipe);
                drop(prev_read.take());
                return Err(abandon(PipelineError::Fork(err), &children));
            }
        }

        // The child owns its ends now. Keep only the read end the next stage
        // will inherit.
        drop(prev_read.take());
        prev_read = pipe.map(|(read, write)| {
            drop(write);
            read
        });
    }

    let statuses = children.iter().map(|&pid| wait_for(pid)).collect();
    Ok(PipelineOutcome {
        terminal_pid: children[last],
        statuses,
    })
}

/// Reap every child that was already started, then hand back `err`.
///
/// The shell must not hold any pipe end at this point, or a started stage
/// may never see EOF and this would block forever.
fn abandon(err: PipelineError, children: &[Pid]) -> PipelineError {
    warn!(error = %err, started = children.len(), "abandoning pipeline");
    for &pid in children {
        wait_for(pid);
    }
    err
}

fn spawn_stage(args: &ExecArgs, io: &StageIo<'_>) -> Spawn {
    // Buffered output must not be duplicated into the child.
    let _ = std::io::stdout().flush();

    // SAFETY: between fork and exec the child calls only dup2, close, write,
    // execvp and _exit, and reads memory prepared before the fork. It never
    // allocates or takes a lock.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => Spawn::Running(child),
        Ok(ForkResult::Child) => exec_stage(args, io),
        Err(err) => Spawn::LaunchFailed(err),
    }
}

/// Child side: rewire stdin/stdout, then become the stage's program.
fn exec_stage(args: &ExecArgs, io: &StageIo<'_>) -> ! {
    if let Some(read) = io.stdin {
        redirect(read.as_raw_fd(), libc::STDIN_FILENO);
        let _ = unistd::close(read.as_raw_fd());
    }
    if let Some((read, write)) = io.pipe {
        redirect(write.as_raw_fd(), libc::STDOUT_FILENO);
        let _ = unistd::close(read.as_raw_fd());
        let _ = unistd::close(write.as_raw_fd());
    } else if let Some(output) = io.output {
        redirect(output.as_raw_fd(), libc::STDOUT_FILENO);
    }

    if args.argv.is_empty() {
        child_exit(0);
    }
    // SAFETY: `ptrs` is NULL-terminated and points into `argv`, which outlives
    // this call. execvp only returns on failure.
    unsafe { libc::execvp(args.ptrs[0], args.ptrs.as_ptr()) };
    let _ = unistd::write(std::io::stderr(), &args.not_found);
    child_exit(COMMAND_NOT_FOUND)
}

fn redirect(from: RawFd, to: RawFd) {
    if from == to {
        return;
    }
    loop {
        match dup2(from, to) {
            Ok(_) => return,
            Err(Errno::EINTR) => continue,
            Err(_) => child_exit(libc::EXIT_FAILURE),
        }
    }
}

fn child_exit(code: i32) -> ! {
    // SAFETY: _exit skips destructors and atexit handlers that belong to the
    // shell, not to this child.
    unsafe { libc::_exit(code) }
}

/// Block until `pid` terminates and translate its wait status.
///
/// A child killed by a signal reports `128 + signo`, like a POSIX shell.
fn wait_for(pid: Pid) -> Option<ExitCode> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Some(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Some(128 + signal as i32),
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(err) => {
                warn!(%pid, error = %err, "could not collect child status");
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Read;
    use std::os::fd::AsFd;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    /// Run `line` with the terminal stage's stdout captured.
    fn run_captured(line: &str) -> (PipelineOutcome, String) {
        let (read, write) = pipe2(OFlag::O_CLOEXEC).unwrap();
        let stages = parser::split_line(line);
        let outcome = run_pipeline(stages.as_slice(), Some(write.as_fd())).unwrap();
        drop(write);

        let mut out = String::new();
        File::from(read).read_to_string(&mut out).unwrap();
        (outcome, out)
    }

    #[test]
    fn test_single_stage_runs_and_reports_pid() {
        let (outcome, out) = run_captured("echo hello world");
        assert_eq!(out, "hello world\n");
        assert!(outcome.success());
        assert_eq!(outcome.statuses.len(), 1);
        assert!(outcome.terminal_pid.as_raw() > 0);
    }

    #[test]
    fn test_two_stage_word_count() {
        let (outcome, out) = run_captured("echo hi there | wc -w");
        assert_eq!(out.trim(), "2");
        assert_eq!(outcome.terminal_status(), Some(0));
        assert_eq!(outcome.statuses, vec![Some(0), Some(0)]);
    }

    #[test]
    fn test_three_stage_filter_and_count() {
        let (outcome, out) = run_captured(r"printf apple\nbanana\npineapple\n | grep apple | wc -l");
        assert_eq!(out.trim(), "2");
        assert!(outcome.success());
        assert_eq!(outcome.statuses.len(), 3);
    }

    #[test]
    fn test_missing_program_exits_with_not_found() {
        let (outcome, out) = run_captured("definitely-not-a-real-program-xyz --flag");
        assert!(out.is_empty());
        assert_eq!(outcome.terminal_status(), Some(COMMAND_NOT_FOUND));
        assert!(!outcome.success());
    }

    #[test]
    fn test_failing_middle_stage_still_records_terminal_pid() {
        let (outcome, out) = run_captured("echo hi | no-such-filter-abc | wc -l");
        assert_eq!(out.trim(), "0");
        assert_eq!(outcome.statuses[1], Some(COMMAND_NOT_FOUND));
        assert_eq!(outcome.terminal_status(), Some(0));
        assert!(outcome.terminal_pid.as_raw() > 0);
    }

    #[test]
    fn test_empty_stage_exits_cleanly() {
        let (outcome, out) = run_captured("echo hi |  | wc -c");
        assert_eq!(out.trim(), "0");
        assert_eq!(outcome.statuses[1], Some(0));
    }

    #[test]
    fn test_failing_status_is_propagated() {
        let (outcome, _) = run_captured("false");
        assert_eq!(outcome.terminal_status(), Some(1));
    }

    #[test]
    fn test_reader_sees_eof_when_writer_exits() {
        // `cat` only finishes once every write end of its stdin is closed.
        let (outcome, out) = run_captured("echo done | cat | cat");
        assert_eq!(out, "done\n");
        assert!(outcome.success());
    }

    #[test]
    fn test_empty_pipeline_is_rejected() {
        let err = run_pipeline(&[], None).unwrap_err();
        assert!(matches!(err, PipelineError::Empty));
    }

    #[test]
    fn test_nul_in_argument_is_rejected_before_spawning() {
        let err = run_pipeline(&["echo a\0b"], None).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[test]
    fn test_exec_args_are_null_terminated() {
        let args = ExecArgs::new(" echo  a b ").unwrap();
        assert_eq!(args.ptrs.len(), 4);
        assert_eq!(args.ptrs[0], args.argv[0].as_ptr());
        assert!(args.ptrs[3].is_null());
        assert_eq!(args.not_found, b"SimpleShell: command not found: echo\n");

        let empty = ExecArgs::new("   ").unwrap();
        assert_eq!(empty.ptrs.len(), 1);
        assert!(empty.ptrs[0].is_null());
        assert!(empty.not_found.is_empty());
    }

    #[test]
    fn test_bad_later_stage_fails_before_anything_starts() {
        // `yes` would write forever into a pipe the shell still held open.
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(run_pipeline(&["yes", "echo a\0b"], None));
        });

        let res = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("pipeline with a bad stage did not return");
        assert!(matches!(res, Err(PipelineError::InvalidArgument(_))));
    }
}
