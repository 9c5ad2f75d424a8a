use crate::builtin::Builtins;
use crate::command::{Command, Pipeline};
use crate::env::Environment;
use nix::errno::Errno;
use nix::fcntl::{OFlag, open};
use nix::libc;
use nix::sys::stat::Mode;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, close, dup2, execvp, fork, pipe2};
use std::ffi::{CString, NulError};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use thiserror::Error;

/// Exit status of a child whose program could not be found.
const STATUS_NOT_FOUND: i32 = 127;
/// Exit status of a child whose program exists but could not be executed.
const STATUS_NOT_EXECUTABLE: i32 = 126;
/// Exit status of a child that failed while wiring its descriptors.
const STATUS_SETUP_FAILED: i32 = 1;

/// How a pipeline ended, as seen by the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecResult {
    /// Foreground pipeline finished; status of its last stage.
    Status(u8),
    /// Background pipeline launched; pid of its first stage.
    Backgrounded(Pid),
}

/// Failures that abort a whole statement before or while spawning.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("pipe: {0}")]
    PipeCreationFailed(Errno),
    #[error("fork: {0}")]
    ForkFailed(Errno),
    #[error("argument contains a NUL byte: {0}")]
    InvalidArgument(#[from] NulError),
}

/// Child-side failure, reported by the child itself before it exits.
enum ChildError {
    Redirect { path: String, errno: Errno },
    Wiring(Errno),
    Exec { program: String, errno: Errno },
}

impl ChildError {
    fn exit_status(&self) -> i32 {
        match self {
            ChildError::Exec {
                errno: Errno::ENOENT,
                ..
            } => STATUS_NOT_FOUND,
            ChildError::Exec { .. } => STATUS_NOT_EXECUTABLE,
            ChildError::Redirect { .. } | ChildError::Wiring(_) => STATUS_SETUP_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            ChildError::Redirect { path, errno } => format!("{path}: {}\n", errno.desc()),
            ChildError::Wiring(errno) => format!("dup2: {}\n", errno.desc()),
            ChildError::Exec {
                program,
                errno: Errno::ENOENT,
            } => format!("{program}: command not found\n"),
            ChildError::Exec { program, errno } => format!("{program}: {}\n", errno.desc()),
        }
    }
}

/// Runs parsed pipelines against one session's state.
pub struct Executor<'a> {
    env: &'a mut Environment,
    builtins: &'a Builtins,
}

impl<'a> Executor<'a> {
    pub fn new(env: &'a mut Environment, builtins: &'a Builtins) -> Self {
        Self { env, builtins }
    }

    /// Expand, then run `pipeline`.
    ///
    /// A single foreground stage naming a builtin runs in-process. Otherwise one
    /// child is forked per stage; the shell either waits for all of them and
    /// reports the last stage's status, or records the first stage's pid as a
    /// background job and returns at once.
    pub fn execute(
        &mut self,
        mut pipeline: Pipeline,
        background: bool,
        cmdline: &str,
    ) -> Result<ExecResult, ExecError> {
        self.env.variables.expand_pipeline(&mut pipeline);

        if pipeline.len() == 1 && !background {
            let mut stdout = io::stdout().lock();
            if let Some(code) =
                self.builtins
                    .dispatch(&pipeline.stages[0].argv, &mut stdout, self.env)
            {
                return Ok(ExecResult::Status((code & 0xff) as u8));
            }
        }

        let pids = spawn_pipeline(&pipeline)?;

        if background {
            let leader = pids[0];
            match self.env.jobs.add(leader, cmdline) {
                Ok(()) => {
                    log::info!("background job {leader} started: {cmdline}");
                    println!("[bg] started PID {leader}");
                }
                Err(e) => {
                    log::warn!("{e}; {leader} runs untracked");
                    eprintln!("Warning: job list full; cannot track background job");
                }
            }
            return Ok(ExecResult::Backgrounded(leader));
        }

        Ok(ExecResult::Status(wait_all(&pids)))
    }
}

/// Create the `n - 1` pipes joining `n` stages. Pipes are close-on-exec; the
/// ends a child keeps are re-installed on fd 0/1 with `dup2`.
fn create_pipes(stages: usize) -> Result<Vec<(OwnedFd, OwnedFd)>, ExecError> {
    let mut pipes = Vec::with_capacity(stages.saturating_sub(1));
    for _ in 1..stages {
        // Dropping `pipes` on error closes whatever was already created.
        pipes.push(pipe2(OFlag::O_CLOEXEC).map_err(ExecError::PipeCreationFailed)?);
    }
    Ok(pipes)
}

fn spawn_pipeline(pipeline: &Pipeline) -> Result<Vec<Pid>, ExecError> {
    let argvs = pipeline
        .stages
        .iter()
        .map(|stage| {
            stage
                .argv
                .iter()
                .map(|arg| CString::new(arg.as_bytes()))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let pipes = create_pipes(pipeline.len())?;
    let _ = io::stdout().flush();

    let mut pids = Vec::with_capacity(pipeline.len());
    for (i, (stage, argv)) in pipeline.stages.iter().zip(&argvs).enumerate() {
        // SAFETY: the child only rewires descriptors, then execs or `_exit`s.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                log::debug!("stage {i} ({}) spawned as {child}", stage.program());
                pids.push(child);
            }
            Ok(ForkResult::Child) => run_child(stage, i, &pipes, argv),
            Err(errno) => {
                drop(pipes);
                wait_all(&pids);
                return Err(ExecError::ForkFailed(errno));
            }
        }
    }

    // The shell takes no part in the data flow; every pipe end belongs to a child now.
    drop(pipes);
    Ok(pids)
}

/// Child half of the fork. Never returns to shell logic.
fn run_child(stage: &Command, index: usize, pipes: &[(OwnedFd, OwnedFd)], argv: &[CString]) -> ! {
    let error = match wire_child(stage, index, pipes) {
        Err(e) => e,
        Ok(()) => match execvp(&argv[0], argv) {
            Err(errno) => ChildError::Exec {
                program: stage.program().to_string(),
                errno,
            },
            Ok(never) => match never {},
        },
    };
    let message = error.message();
    // SAFETY: plain writes and `_exit` are async-signal-safe; destructors and
    // stdio buffers inherited from the shell must not run in the child.
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            message.as_ptr().cast(),
            message.len(),
        );
        libc::_exit(error.exit_status())
    }
}

fn wire_child(stage: &Command, index: usize, pipes: &[(OwnedFd, OwnedFd)]) -> Result<(), ChildError> {
    if index > 0 {
        dup2(pipes[index - 1].0.as_raw_fd(), libc::STDIN_FILENO).map_err(ChildError::Wiring)?;
    }
    if index < pipes.len() {
        dup2(pipes[index].1.as_raw_fd(), libc::STDOUT_FILENO).map_err(ChildError::Wiring)?;
    }
    // Only fds 0/1 matter from here on; a failed close leaves nothing to undo.
    for (read, write) in pipes {
        let _ = close(read.as_raw_fd());
        let _ = close(write.as_raw_fd());
    }

    if let Some(path) = &stage.input {
        redirect(path, OFlag::O_RDONLY, libc::STDIN_FILENO)?;
    }
    if let Some(path) = &stage.output {
        redirect(
            path,
            OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
            libc::STDOUT_FILENO,
        )?;
    }
    Ok(())
}

/// Open `path` and install it as `target`, replacing any pipe wiring.
///
/// The file is opened without `O_CLOEXEC`: when `target` was closed, `open`
/// hands back `target` itself and that fd must survive the exec.
fn redirect(path: &str, flags: OFlag, target: RawFd) -> Result<(), ChildError> {
    let mode = Mode::from_bits_truncate(0o644);
    let fd = open(path, flags, mode).map_err(|errno| ChildError::Redirect {
        path: path.to_string(),
        errno,
    })?;
    if fd != target {
        let installed = dup2(fd, target);
        let _ = close(fd);
        installed.map_err(ChildError::Wiring)?;
    }
    Ok(())
}

fn wait_for(pid: Pid) -> nix::Result<WaitStatus> {
    loop {
        match waitpid(pid, None) {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}

/// Wait for every pid; only the last one's status is kept.
fn wait_all(pids: &[Pid]) -> u8 {
    let mut last = 0;
    for (i, &pid) in pids.iter().enumerate() {
        match wait_for(pid) {
            Ok(status) => {
                if i + 1 == pids.len() {
                    last = status_code(status);
                }
            }
            Err(e) => log::warn!("waitpid({pid}) failed: {e}"),
        }
    }
    last
}

/// Shell status of a terminated child: its exit code, or 128 + signal.
pub fn status_code(status: WaitStatus) -> u8 {
    let code = match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, signal, _) => 128 + signal as i32,
        WaitStatus::Stopped(_, signal) => 128 + signal as i32,
        _ => 1,
    };
    (code & 0xff) as u8
}
