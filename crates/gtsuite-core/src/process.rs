//! Subprocess substrate: run a command, capture its output, enforce a budget.

use crate::domain::ProcessStatus;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub program: &'a Path,
    pub args: &'a [String],
    pub working_dir: &'a Path,
    pub time_budget: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: ProcessStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn not_started(reason: impl Into<String>) -> Self {
        Self {
            status: ProcessStatus::NotStarted {
                reason: reason.into(),
            },
            stdout: Vec::new(),
            stderr: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }
}

pub trait ProcessRunner {
    fn run(&self, invocation: &Invocation<'_>) -> ProcessOutput;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, invocation: &Invocation<'_>) -> ProcessOutput {
        let started = Instant::now();
        let mut command = Command::new(invocation.program);
        command
            .args(invocation.args)
            .current_dir(invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        own_process_group(&mut command);
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                warn!(
                    program = %invocation.program.display(),
                    "failed to spawn process: {}",
                    source
                );
                return ProcessOutput::not_started(format!(
                    "failed to spawn '{}': {}",
                    invocation.program.display(),
                    source
                ));
            }
        };

        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let status = wait_within_budget(&mut child, invocation.time_budget);
        // A descendant that left the process group may still hold the pipes open.
        let (stdout, stderr) = if status.is_timeout() {
            (Vec::new(), Vec::new())
        } else {
            (collect(stdout_reader), collect(stderr_reader))
        };
        let elapsed = started.elapsed();

        debug!(
            program = %invocation.program.display(),
            elapsed_ms = elapsed.as_millis() as u64,
            "process finished with {}",
            status
        );

        ProcessOutput {
            status,
            stdout,
            stderr,
            elapsed,
        }
    }
}

fn wait_within_budget(child: &mut Child, budget: Option<Duration>) -> ProcessStatus {
    let Some(budget) = budget else {
        return match child.wait() {
            Ok(status) => status_from_exit(status),
            Err(source) => ProcessStatus::NotStarted {
                reason: format!("failed to wait for process: {}", source),
            },
        };
    };

    let deadline = Instant::now() + budget;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status_from_exit(status),
            Ok(None) if Instant::now() >= deadline => {
                warn!(
                    budget_ms = budget.as_millis() as u64,
                    pid = child.id(),
                    "time budget exceeded; terminating process group"
                );
                terminate_group(child);
                let _ = child.wait();
                return ProcessStatus::timed_out(budget);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                return ProcessStatus::NotStarted {
                    reason: format!("failed to poll process: {}", source),
                };
            }
        }
    }
}

/// Puts the child at the head of a new process group so a timeout can reach
/// everything it started.
#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

#[cfg(unix)]
fn terminate_group(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw_pid) = i32::try_from(child.id()) else {
        let _ = child.kill();
        return;
    };
    if let Err(errno) = killpg(Pid::from_raw(raw_pid), Signal::SIGKILL) {
        debug!(pid = raw_pid, "killpg failed ({}); killing child only", errno);
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn terminate_group(child: &mut Child) {
    let _ = child.kill();
}

fn status_from_exit(status: ExitStatus) -> ProcessStatus {
    if let Some(code) = status.code() {
        return ProcessStatus::Exited { code };
    }
    ProcessStatus::Signaled {
        signal: exit_signal(status).unwrap_or(-1),
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<i32> {
    None
}

fn drain<R>(stream: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    stream.map(|mut stream| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = stream.read_to_end(&mut buffer);
            buffer
        })
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
