//! External command execution.
//!
//! Two shapes only: fire-and-forget spawn (VM/process start) and
//! spawn-and-wait (taskkill, where a later start must not race the old
//! instance's exit). Commands never open a console window.

use crate::error::ResourceError;
use async_trait::async_trait;
use tokio::process::Command;

/// Seam for spawning external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Launch a command and return as soon as the process exists.
    fn spawn(&self, path: &str, args: &[String]) -> Result<(), ResourceError>;

    /// Launch a command and wait for it to finish. A non-zero exit status
    /// is reported as `CommandFailed`.
    async fn spawn_and_wait(&self, path: &str, args: &[String]) -> Result<(), ResourceError>;
}

/// Production runner over `tokio::process`.
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    fn command(path: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(path);
        cmd.args(args);
        #[cfg(windows)]
        {
            // CREATE_NO_WINDOW
            cmd.creation_flags(0x0800_0000);
        }
        cmd
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    fn spawn(&self, path: &str, args: &[String]) -> Result<(), ResourceError> {
        Self::command(path, args)
            .spawn()
            .map(|_child| ())
            .map_err(|e| ResourceError::CommandFailed {
                cmd: path.to_string(),
                reason: e.to_string(),
            })
    }

    async fn spawn_and_wait(&self, path: &str, args: &[String]) -> Result<(), ResourceError> {
        let mut child =
            Self::command(path, args)
                .spawn()
                .map_err(|e| ResourceError::CommandFailed {
                    cmd: path.to_string(),
                    reason: e.to_string(),
                })?;

        let status = child.wait().await.map_err(|e| ResourceError::CommandFailed {
            cmd: path.to_string(),
            reason: e.to_string(),
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(ResourceError::CommandFailed {
                cmd: path.to_string(),
                reason: format!("exit status {}", status),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_missing_binary_is_command_failed() {
        let runner = TokioCommandRunner;
        let result = runner.spawn("/nonexistent/trayctl-test-binary", &[]);
        assert!(matches!(
            result,
            Err(ResourceError::CommandFailed { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_and_wait_reports_exit_status() {
        let runner = TokioCommandRunner;
        let args = vec!["-c".to_string(), "exit 3".to_string()];
        let result = runner.spawn_and_wait("sh", &args).await;
        match result {
            Err(ResourceError::CommandFailed { reason, .. }) => {
                assert!(reason.contains("exit status"), "got: {}", reason)
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_and_wait_success() {
        let runner = TokioCommandRunner;
        let args = vec!["-c".to_string(), "true".to_string()];
        assert!(runner.spawn_and_wait("sh", &args).await.is_ok());
    }
}
