// src/exec/command.rs

//! Shell command actions, used by the TOML runner.

use std::process::Stdio;

use anyhow::Context;
use serde_json::json;
use tokio::process::Command;
use tracing::{debug, info};

use crate::task::{Action, ActionError, ActionFuture};

/// Runs `cmd` through the platform shell.
///
/// Success is a zero exit code; the output is `{"exit_code", "stdout"}`.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    label: String,
    cmd: String,
}

impl ShellCommand {
    pub fn new(label: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            cmd: cmd.into(),
        }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    fn build(&self) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self) -> Result<serde_json::Value, ActionError> {
        info!(task = %self.label, cmd = %self.cmd, "starting task process");

        let output = self
            .build()
            .output()
            .await
            .with_context(|| format!("spawning process for task '{}'", self.label))?;

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            debug!(task = %self.label, "stderr: {}", line);
        }

        let code = output.status.code().unwrap_or(-1);
        info!(
            task = %self.label,
            exit_code = code,
            success = output.status.success(),
            "task process exited"
        );

        if output.status.success() {
            Ok(json!({
                "exit_code": code,
                "stdout": String::from_utf8_lossy(&output.stdout).trim_end(),
            }))
        } else {
            Err(ActionError::Failed(format!("command exited with code {code}")))
        }
    }
}

impl Action for ShellCommand {
    fn call(&self) -> ActionFuture<'_> {
        Box::pin(self.run())
    }
}
