//! SafeCommandExecutor: hook command execution without a shell
//!
//! # Security Features
//!
//! - **Injection prevention**: the command line is split on whitespace and run
//!   directly, never through a shell
//! - **Data on stdin**: run data is passed as JSON on stdin, never interpolated
//!   into arguments
//! - **Working directory validation**: validates existence before execution
//! - **Timeout control**: hanging processes are killed
//!
//! # Example
//!
//! ```rust,no_run
//! use webstore_publisher::security::SafeCommandExecutor;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let mut executor = SafeCommandExecutor::new(std::env::temp_dir()).unwrap();
//! executor.set_timeout(Duration::from_secs(30));
//!
//! let output = executor.execute("notify-release --channel ci", b"{}").await.unwrap();
//! println!("{}", String::from_utf8_lossy(&output.stdout));
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Timeout applied unless configured
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command is empty")]
    EmptyCommand,

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Command execution failed (e.g., binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Command '{command}' exited with {status}: {stderr}")]
    NonZeroExit {
        command: String,
        status: String,
        stderr: String,
    },

    /// Command exceeded the timeout duration
    #[error("Command timeout after {0:?}")]
    Timeout(Duration),
}

/// Safe command executor with security controls
#[derive(Debug)]
pub struct SafeCommandExecutor {
    /// Working directory where commands will be executed
    working_dir: PathBuf,
    timeout: Duration,
}

impl SafeCommandExecutor {
    /// Create a new SafeCommandExecutor with working directory validation.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self {
            working_dir,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Set command execution timeout.
    ///
    /// Commands exceeding this duration are killed.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Execute a command line, writing `input` to its stdin.
    ///
    /// # Errors
    ///
    /// - `CommandError::EmptyCommand` - Nothing to run
    /// - `CommandError::ExecutionFailed` - Binary not found or I/O error
    /// - `CommandError::NonZeroExit` - The command reported failure
    /// - `CommandError::Timeout` - The command did not finish in time
    pub async fn execute(&self, command_line: &str, input: &[u8]) -> Result<Output, CommandError> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next().ok_or(CommandError::EmptyCommand)?;
        let args: Vec<&str> = parts.collect();

        let mut child = Command::new(program)
            .args(&args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", program, e)))?;

        let stdin = child.stdin.take();
        let run = async move {
            if let Some(mut stdin) = stdin {
                // A command that ignores its input may close stdin early
                if let Err(e) = stdin.write_all(input).await
                    && e.kind() != std::io::ErrorKind::BrokenPipe
                {
                    return Err(e);
                }
            }
            child.wait_with_output().await
        };

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| CommandError::Timeout(self.timeout))?
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(CommandError::NonZeroExit {
                command: program.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> SafeCommandExecutor {
        SafeCommandExecutor::new(std::env::temp_dir()).unwrap()
    }

    #[tokio::test]
    async fn test_empty_command() {
        let result = executor().execute("   ", b"").await;
        assert!(matches!(result, Err(CommandError::EmptyCommand)));
    }

    #[test]
    fn test_invalid_working_directory() {
        let result = SafeCommandExecutor::new("/nonexistent/directory/that/does/not/exist");
        assert!(
            matches!(result, Err(CommandError::InvalidWorkingDirectory(_))),
            "Should reject non-existent working directory"
        );
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let result = executor()
            .execute("definitely-not-a-real-binary-4711", b"")
            .await;
        assert!(matches!(result, Err(CommandError::ExecutionFailed(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_input_is_passed_on_stdin() {
        let output = executor().execute("cat", br#"{"ok":true}"#).await.unwrap();
        assert_eq!(output.stdout, br#"{"ok":true}"#);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_arguments_are_not_shell_interpreted() {
        let output = executor().execute("echo $HOME;ls", b"").await.unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "$HOME;ls");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit() {
        let result = executor().execute("false", b"").await;
        assert!(matches!(result, Err(CommandError::NonZeroExit { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_with_timeout() {
        let mut executor = executor();
        executor.set_timeout(Duration::from_millis(100));

        let result = executor.execute("sleep 5", b"").await;
        assert!(matches!(result, Err(CommandError::Timeout(_))));
    }
}
