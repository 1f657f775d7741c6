//! External process execution
//!
//! [`ProcessRunner`] is the narrow capability the orchestration code uses to
//! talk to the outside world: run a command to completion, or spawn one and
//! keep a handle to terminate it later. [`TokioProcessRunner`] is the real
//! implementation; `fake::FakeRunner` (behind the `fake` feature) scripts
//! outcomes for tests.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// How long a terminated process gets to exit before it is killed
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(10);

/// A command line plus the directory to run it in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a command run to completion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn first_stdout_line(&self) -> Option<&str> {
        first_line(&self.stdout)
    }

    pub fn first_stderr_line(&self) -> Option<&str> {
        first_line(&self.stderr)
    }

    /// On success, the first line of stdout (empty if there was none).
    /// Otherwise, `wrap` applied to the first line of stderr.
    pub fn into_result<F>(self, wrap: F) -> E2eResult<String>
    where
        F: FnOnce(String) -> E2eError,
    {
        if self.success() {
            return Ok(self.first_stdout_line().unwrap_or_default().to_string());
        }

        let diagnostic = match (self.first_stderr_line(), self.code) {
            (Some(line), _) => line.to_string(),
            (None, Some(code)) => format!("exit code {}", code),
            (None, None) => "terminated by signal".to_string(),
        };
        Err(wrap(diagnostic))
    }
}

fn first_line(s: &str) -> Option<&str> {
    s.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Runs external commands
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion, capturing both output streams
    async fn run(&self, command: &CommandSpec) -> std::io::Result<ProcessOutput>;

    /// Start `command` and return without waiting for it
    fn spawn(&self, command: &CommandSpec) -> std::io::Result<Box<dyn RunningProcess>>;
}

/// Handle to a spawned process
#[async_trait]
pub trait RunningProcess: Send + Sync {
    /// OS process id, while the process is alive
    fn id(&self) -> Option<u32>;

    /// Ask the process to stop, kill it if it doesn't, and reap it
    async fn terminate(&mut self) -> std::io::Result<()>;
}

/// Run `command` and return the first line of its stdout.
///
/// Spawn failures and nonzero exits are both passed through `wrap`, which
/// supplies the error kind and its fixed message prefix.
pub async fn run_checked<F>(runner: &dyn ProcessRunner, command: &CommandSpec, wrap: F) -> E2eResult<String>
where
    F: FnOnce(String) -> E2eError,
{
    debug!("running: {}", command);
    match runner.run(command).await {
        Ok(output) => output.into_result(wrap),
        Err(e) => Err(wrap(format!("{}: {}", command.program, e))),
    }
}

/// Production `ProcessRunner` on top of `tokio::process`
#[derive(Debug, Clone)]
pub struct TokioProcessRunner {
    grace: Duration,
}

impl TokioProcessRunner {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    fn command(command: &CommandSpec) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl Default for TokioProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TERMINATE_GRACE)
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: &CommandSpec) -> std::io::Result<ProcessOutput> {
        let output = Self::command(command).output().await?;
        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn spawn(&self, command: &CommandSpec) -> std::io::Result<Box<dyn RunningProcess>> {
        let mut child = Self::command(command).spawn()?;
        let pid = child.id().unwrap_or_default();
        info!("spawned {} (pid: {})", command, pid);

        // Drain the pipes so a chatty process never blocks on a full buffer
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, pid, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, pid, "stderr"));
        }

        Ok(Box::new(TokioProcess {
            child,
            program: command.program.clone(),
            grace: self.grace,
        }))
    }
}

async fn forward_lines<R>(stream: R, pid: u32, name: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(pid, stream = name, "{}", line);
    }
}

struct TokioProcess {
    child: tokio::process::Child,
    program: String,
    grace: Duration,
}

#[async_trait]
impl RunningProcess for TokioProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn terminate(&mut self) -> std::io::Result<()> {
        let Some(pid) = self.child.id() else {
            // Already reaped
            return Ok(());
        };
        info!("stopping {} (pid: {})", self.program, pid);

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                match tokio::time::timeout(self.grace, self.child.wait()).await {
                    Ok(status) => {
                        debug!("{} exited: {}", self.program, status?);
                        return Ok(());
                    }
                    Err(_) => warn!(
                        "{} (pid: {}) ignored SIGTERM for {:?}, killing",
                        self.program, pid, self.grace
                    ),
                }
            }
        }

        self.child.kill().await
    }
}
