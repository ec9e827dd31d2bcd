//! SafeCommandExecutor: allow-listed external command execution
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only pre-approved container tools can execute
//! - **Injection prevention**: Uses `std::process::Command`, never a shell
//! - **Argument sanitization**: Arguments passed as Vec, never interpolated into shell strings
//! - **Working directory validation**: Validates existence before execution
//! - **Secret-safe stdin**: Passwords are written to the child's stdin, never to argv
//!
//! # Example
//!
//! ```rust,no_run
//! use ecr_publisher::SafeCommandExecutor;
//!
//! let executor = SafeCommandExecutor::new(std::env::temp_dir()).unwrap();
//! let output = executor.execute("docker", &["--version"]).unwrap();
//! println!("{}", String::from_utf8_lossy(&output.stdout));
//! ```

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};
use thiserror::Error;

/// Allowed container tools.
///
/// Only these executables can be run by the default executor. A full path
/// is accepted when its file name is in the list.
pub const ALLOWED_COMMANDS: &[&str] = &["docker", "podman", "finch", "nerdctl"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Command execution failed (e.g., binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),
}

/// Safe command executor with security controls
#[derive(Debug, Clone)]
pub struct SafeCommandExecutor {
    /// Working directory where commands will be executed
    working_dir: PathBuf,
    /// Executables this executor may run
    allowed: Vec<String>,
}

impl SafeCommandExecutor {
    /// Create a new SafeCommandExecutor with working directory validation.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        Self::with_allowlist(working_dir, ALLOWED_COMMANDS)
    }

    /// Create an executor with a custom allow list.
    pub fn with_allowlist<P: AsRef<Path>>(
        working_dir: P,
        allowed: &[&str],
    ) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self {
            working_dir,
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Same allow list, different working directory
    pub fn in_dir<P: AsRef<Path>>(&self, working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self {
            working_dir,
            allowed: self.allowed.clone(),
        })
    }

    /// Check a command against the allow list
    pub fn is_allowed(&self, command: &str) -> bool {
        let name = Path::new(command)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(command);
        self.allowed.iter().any(|a| a == name)
    }

    fn command(&self, command: &str, args: &[&str]) -> Result<Command, CommandError> {
        // Whitelist validation: Only pre-approved commands
        if !self.is_allowed(command) {
            return Err(CommandError::CommandNotAllowed(command.to_string()));
        }

        tracing::debug!("exec: {} {}", command, args.join(" "));

        let mut cmd = Command::new(command);
        cmd.args(args).current_dir(&self.working_dir);
        Ok(cmd)
    }

    /// Execute a command and capture its output.
    ///
    /// # Errors
    ///
    /// - `CommandError::CommandNotAllowed` - Command not in whitelist
    /// - `CommandError::ExecutionFailed` - Binary not found or execution error
    pub fn execute(&self, command: &str, args: &[&str]) -> Result<Output, CommandError> {
        self.command(command, args)?
            .output()
            .map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", command, e)))
    }

    /// Execute a command with `input` written to its stdin, capturing output.
    pub fn execute_with_stdin(
        &self,
        command: &str,
        args: &[&str],
        input: &[u8],
    ) -> Result<Output, CommandError> {
        let mut child = self
            .command(command, args)?
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", command, e)))?;

        // Dropping stdin closes the pipe so the child sees EOF.
        // A child that exits without reading its input closes the pipe first;
        // its own status and stderr are what the caller needs then.
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(input) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    tracing::debug!("{} closed stdin before reading all input", command);
                }
                Err(e) => {
                    return Err(CommandError::ExecutionFailed(format!("{}: {}", command, e)));
                }
            }
        }

        child
            .wait_with_output()
            .map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", command, e)))
    }

    /// Execute a command with stdout/stderr attached to the terminal.
    ///
    /// Used for long-running steps (build, push) whose progress the user
    /// should see.
    pub fn execute_inherited(
        &self,
        command: &str,
        args: &[&str],
    ) -> Result<ExitStatus, CommandError> {
        self.command(command, args)?
            .stdin(Stdio::null())
            .status()
            .map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", command, e)))
    }
}
