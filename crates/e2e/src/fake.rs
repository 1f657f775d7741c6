//! Scripted `ProcessRunner` for exercising orchestration without a real
//! container runtime.
//!
//! Outcomes are keyed by the command's first argument (`build`, `run`,
//! `rmi`, `rev-parse`, ...), or by the program name for argument-less
//! commands. Unscripted commands succeed with empty output. Every call is
//! recorded, including terminations of spawned processes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::process::{CommandSpec, ProcessOutput, ProcessRunner, RunningProcess};

/// One recorded call against a [`FakeRunner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Run(CommandSpec),
    Spawn(CommandSpec),
    /// Fake process id passed to `terminate`
    Terminate(u32),
}

#[derive(Debug, Clone)]
enum Outcome {
    Output(ProcessOutput),
    SpawnError(String),
}

#[derive(Debug, Default)]
pub struct FakeRunner {
    outcomes: Mutex<HashMap<String, Outcome>>,
    log: Arc<Mutex<Vec<Invocation>>>,
    next_pid: AtomicU32,
}

fn key(command: &CommandSpec) -> &str {
    command.args.first().unwrap_or(&command.program)
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU32::new(1000),
            ..Default::default()
        }
    }

    /// Commands keyed by `key` exit 0 printing `stdout`
    pub fn succeed(&self, key: &str, stdout: &str) {
        self.script(
            key,
            Outcome::Output(ProcessOutput {
                code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            }),
        );
    }

    /// Commands keyed by `key` exit with `code` printing `stderr`
    pub fn fail(&self, key: &str, code: i32, stderr: &str) {
        self.script(
            key,
            Outcome::Output(ProcessOutput {
                code: Some(code),
                stdout: String::new(),
                stderr: stderr.to_string(),
            }),
        );
    }

    /// Commands keyed by `key` cannot be started at all
    pub fn spawn_error(&self, key: &str, message: &str) {
        self.script(key, Outcome::SpawnError(message.to_string()));
    }

    fn script(&self, key: &str, outcome: Outcome) {
        self.outcomes.lock().insert(key.to_string(), outcome);
    }

    fn outcome(&self, command: &CommandSpec) -> Option<Outcome> {
        self.outcomes.lock().get(key(command)).cloned()
    }

    fn record(&self, invocation: Invocation) {
        self.log.lock().push(invocation);
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.log.lock().clone()
    }

    /// First arguments of every `run`/`spawn` call, in order
    pub fn subcommands(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .filter_map(|inv| match inv {
                Invocation::Run(cmd) | Invocation::Spawn(cmd) => Some(key(cmd).to_string()),
                Invocation::Terminate(_) => None,
            })
            .collect()
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.invocations()
            .iter()
            .filter_map(|inv| match inv {
                Invocation::Terminate(pid) => Some(*pid),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, command: &CommandSpec) -> std::io::Result<ProcessOutput> {
        self.record(Invocation::Run(command.clone()));
        match self.outcome(command) {
            Some(Outcome::Output(output)) => Ok(output),
            Some(Outcome::SpawnError(msg)) => Err(std::io::Error::new(std::io::ErrorKind::NotFound, msg)),
            None => Ok(ProcessOutput {
                code: Some(0),
                ..Default::default()
            }),
        }
    }

    fn spawn(&self, command: &CommandSpec) -> std::io::Result<Box<dyn RunningProcess>> {
        self.record(Invocation::Spawn(command.clone()));
        if let Some(Outcome::SpawnError(msg)) = self.outcome(command) {
            return Err(std::io::Error::new(std::io::ErrorKind::NotFound, msg));
        }

        Ok(Box::new(FakeProcess {
            pid: Some(self.next_pid.fetch_add(1, Ordering::SeqCst)),
            log: self.log.clone(),
        }))
    }
}

struct FakeProcess {
    pid: Option<u32>,
    log: Arc<Mutex<Vec<Invocation>>>,
}

#[async_trait]
impl RunningProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    async fn terminate(&mut self) -> std::io::Result<()> {
        if let Some(pid) = self.pid.take() {
            self.log.lock().push(Invocation::Terminate(pid));
        }
        Ok(())
    }
}
