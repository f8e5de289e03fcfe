//! Local process execution
//!
//! Every external program (git, rsync, npm, zip, the editor) goes through
//! [`CommandRunner`] so the packaging and notification logic can be driven
//! by an in-memory runner in tests.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, ShipError};

/// A program invocation with its working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ShellCommand {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a successful command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub execution_time: Duration,
}

impl CommandOutput {
    /// Trimmed stdout, the usual shape of a single-value git query
    pub fn value(&self) -> String {
        self.stdout.trim().to_string()
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion capturing output; a non-zero exit is a `ShipError::Command`.
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput>;

    /// Run with the terminal handed over to the child process.
    async fn run_interactive(&self, program: &str, args: &[String]) -> Result<()>;
}

/// Runner backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput> {
        let start_time = Instant::now();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }

        debug!(command = %command, cwd = ?command.cwd, "Running command");

        let output = cmd.output().await.map_err(|e| ShipError::Command {
            command: command.to_string(),
            output: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let diagnostic = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(ShipError::Command {
                command: command.to_string(),
                output: format!("{} ({})", diagnostic, output.status),
            });
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            execution_time: start_time.elapsed(),
        })
    }

    async fn run_interactive(&self, program: &str, args: &[String]) -> Result<()> {
        // EDITOR may carry flags, e.g. "code --wait"
        let mut parts = program.split_whitespace();
        let binary = parts.next().ok_or_else(|| ShipError::Command {
            command: program.to_string(),
            output: "empty program".to_string(),
        })?;

        let status = Command::new(binary)
            .args(parts)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| ShipError::Command {
                command: program.to_string(),
                output: e.to_string(),
            })?;

        if !status.success() {
            return Err(ShipError::Command {
                command: program.to_string(),
                output: format!("exited with {}", status),
            });
        }
        Ok(())
    }
}
