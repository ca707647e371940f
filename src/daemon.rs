use std::{collections::BTreeMap, process::Stdio, time::Duration};

use tokio::process::Command;

pub const DAEMON_START_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonCommand {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Default for DaemonCommand {
    fn default() -> Self {
        Self {
            program: "slack-cli".to_string(),
            args: vec!["server".to_string(), "start".to_string()],
            timeout: DAEMON_START_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStatus {
    Started,
    /// The start command failed or timed out; it is usually already running.
    AssumedRunning,
}

/// Best-effort start of the background Slack server both configurations use.
/// Failures are logged and never propagated.
pub async fn ensure_daemon(command: &DaemonCommand, env: &BTreeMap<String, String>) -> DaemonStatus {
    let output = Command::new(&command.program)
        .args(&command.args)
        .env_clear()
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(command.timeout, output).await {
        Ok(Ok(output)) if output.status.success() => DaemonStatus::Started,
        Ok(Ok(output)) => {
            tracing::warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "daemon start command failed"
            );
            DaemonStatus::AssumedRunning
        }
        Ok(Err(err)) => {
            tracing::warn!(program = %command.program, error = %err, "could not run daemon start command");
            DaemonStatus::AssumedRunning
        }
        Err(_) => {
            tracing::warn!(timeout = ?command.timeout, "daemon start command timed out");
            DaemonStatus::AssumedRunning
        }
    }
}
