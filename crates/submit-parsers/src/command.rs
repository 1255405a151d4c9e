//! Command execution for the scheduler submission binaries.

use thiserror::Error;
use tokio::process::Command;

/// Error type for command execution.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to execute {command}: {source}")]
    Execution {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Command {command} failed with exit code {code:?}: {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Execute a command and capture stdout and stderr as strings.
///
/// A non-zero exit status is reported as [`CommandError::Failed`] carrying
/// the command's stderr (or stdout when stderr is empty).
pub async fn run_command(cmd: &mut Command, name: &str) -> Result<CommandOutput, CommandError> {
    let output = cmd.output().await.map_err(|source| CommandError::Execution {
        command: name.to_string(),
        source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let message = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(CommandError::Failed {
            command: name.to_string(),
            code: output.status.code(),
            stderr: message,
        });
    }

    Ok(CommandOutput { stdout, stderr })
}
