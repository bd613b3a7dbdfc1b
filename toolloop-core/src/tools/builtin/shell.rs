//! Shell command tool

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::info;

use super::{required_str, truncate_output};
use crate::tools::{ToolDescriptor, ToolError, ToolHandler, ToolMetadata, ToolSchema};

struct RunCommand {
    workdir: PathBuf,
}

#[async_trait]
impl ToolHandler for RunCommand {
    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let command = required_str(&args, "command")?;
        info!(command = %command, "Executing command");

        let (shell, shell_arg) = if cfg!(target_os = "windows") {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let output = Command::new(shell)
            .arg(shell_arg)
            .arg(command)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ToolError::execution(format!("failed to start command: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);

        let mut result = format!("Exit code: {}\n", exit_code);
        if !stdout.is_empty() {
            result.push_str("\n--- stdout ---\n");
            result.push_str(&stdout);
        }
        if !stderr.is_empty() {
            result.push_str("\n--- stderr ---\n");
            result.push_str(&stderr);
        }

        Ok(truncate_output(result))
    }
}

/// `run_command`: run a shell command in `workdir` and report exit code and output.
///
/// A non-zero exit code is reported as normal output so the model can react to it.
/// Timeouts are enforced by the executor.
pub fn run_command(workdir: &Path) -> ToolDescriptor {
    ToolDescriptor::local(
        ToolMetadata::new(
            "run_command",
            "Execute a shell command in the working directory. Returns the exit code, stdout and stderr.",
        ),
        ToolSchema::new(json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })),
        Arc::new(RunCommand {
            workdir: workdir.to_path_buf(),
        }),
    )
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_command_reports_output_and_exit_code() {
        let dir = TempDir::new().unwrap();
        let tool = run_command(dir.path());
        let handler = tool.handler.clone().unwrap();

        let out = handler
            .call(json!({"command": "echo hi; echo oops >&2; exit 3"}))
            .await
            .unwrap();

        assert!(out.starts_with("Exit code: 3"));
        assert!(out.contains("--- stdout ---\nhi"));
        assert!(out.contains("--- stderr ---\noops"));
    }

    #[tokio::test]
    async fn test_run_command_uses_workdir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let handler = run_command(dir.path()).handler.unwrap();

        let out = handler.call(json!({"command": "ls"})).await.unwrap();
        assert!(out.contains("marker.txt"));
    }
}
