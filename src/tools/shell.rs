//! Command execution tools: shell one-liners and inline Python.
//!
//! Both funnel into [`run_command`], which enforces a wall-clock timeout,
//! merges stderr after stdout, annotates non-zero exit codes, and truncates
//! unbounded output.

use std::process::Stdio;
use std::time::Duration;

use serde_json::json;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{truncate_output, Tool, ToolFuture};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);
const OUTPUT_LIMIT_CHARS: usize = 30_000;

async fn run_command(mut command: Command, label: &str) -> Result<String, String> {
    command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    // kill_on_drop reaps the child if the timeout fires and we abandon it.
    command.kill_on_drop(true);

    debug!(command = label, "running command");

    let output = match timeout(COMMAND_TIMEOUT, command.output()).await {
        Err(_) => {
            return Err(format!(
                "Command timed out after {} seconds.",
                COMMAND_TIMEOUT.as_secs()
            ));
        }
        Ok(Err(e)) => return Err(format!("could not run {label}: {e}")),
        Ok(Ok(output)) => output,
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let mut text = stdout.to_string();
    if !stderr.trim().is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str("--- stderr ---\n");
        text.push_str(&stderr);
    }

    match output.status.code() {
        Some(0) => {}
        Some(code) => {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&format!("[Exit code: {code}]"));
        }
        // Killed by signal.
        None => {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str("[Terminated by signal]");
        }
    }

    if text.is_empty() {
        text = "(no output)".to_string();
    }

    Ok(truncate_output(text, OUTPUT_LIMIT_CHARS, "output"))
}

// ── run_shell_command ─────────────────────────────────────────────────────────

pub struct RunShellCommandTool;

impl Tool for RunShellCommandTool {
    fn name(&self) -> &str {
        "run_shell_command"
    }

    fn description(&self) -> &str {
        "Run a shell command and return its output. \
         Times out after 60 seconds."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "The shell command to run"},
                "working_dir": {"type": "string", "description": "Directory to run in (optional)"}
            },
            "required": ["command"]
        })
    }

    fn call(&self, args: serde_json::Value) -> ToolFuture {
        Box::pin(async move {
            let line = args
                .get("command")
                .and_then(|v| v.as_str())
                .ok_or("missing required argument 'command'")?
                .to_string();

            let mut command = Command::new("sh");
            command.arg("-c").arg(&line);
            if let Some(dir) = args.get("working_dir").and_then(|v| v.as_str()) {
                command.current_dir(dir);
            }

            run_command(command, "shell command").await
        })
    }
}

// ── run_python_code ───────────────────────────────────────────────────────────

pub struct RunPythonCodeTool;

impl Tool for RunPythonCodeTool {
    fn name(&self) -> &str {
        "run_python_code"
    }

    fn description(&self) -> &str {
        "Execute a Python snippet with python3 and return its output. \
         Times out after 60 seconds."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "description": "Python source to execute"}
            },
            "required": ["code"]
        })
    }

    fn call(&self, args: serde_json::Value) -> ToolFuture {
        Box::pin(async move {
            let code = args
                .get("code")
                .and_then(|v| v.as_str())
                .ok_or("missing required argument 'code'")?
                .to_string();

            let mut command = Command::new("python3");
            command.arg("-c").arg(&code);

            run_command(command, "python3").await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn shell_captures_stdout() {
        let out = RunShellCommandTool
            .call(json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn stderr_is_separated_and_exit_code_annotated() {
        let out = RunShellCommandTool
            .call(json!({"command": "echo out; echo err >&2; exit 3"}))
            .await
            .unwrap();
        assert!(out.contains("out"));
        assert!(out.contains("--- stderr ---"));
        assert!(out.contains("err"));
        assert!(out.contains("[Exit code: 3]"));
    }

    #[tokio::test]
    async fn working_dir_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let out = RunShellCommandTool
            .call(json!({"command": "pwd", "working_dir": dir.path().to_string_lossy()}))
            .await
            .unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(out.trim(), canonical.to_string_lossy());
    }

    #[tokio::test]
    async fn silent_success_says_so() {
        let out = RunShellCommandTool.call(json!({"command": "true"})).await.unwrap();
        assert_eq!(out, "(no output)");
    }

    #[tokio::test]
    async fn missing_command_argument_errors() {
        let err = RunShellCommandTool.call(json!({})).await.unwrap_err();
        assert!(err.contains("'command'"));
    }
}
