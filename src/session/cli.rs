use std::{path::PathBuf, process::Stdio};

use async_stream::try_stream;
use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
};

use serde_json::Value;

use super::{AgentBackend, ResultEvent, SessionEvent, SessionEventStream, SessionOptions};
use crate::error::BenchError;

const STDERR_TAIL_CHARS: usize = 500;

/// Runs sessions through the agent CLI in print mode with streamed JSON output.
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    program: PathBuf,
}

impl ClaudeCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl AgentBackend for ClaudeCli {
    async fn open(
        &self,
        prompt: &str,
        options: &SessionOptions,
    ) -> Result<SessionEventStream, BenchError> {
        let args = options.to_cli_args(prompt)?;
        tracing::debug!(
            program = %self.program.display(),
            resume = ?options.resume,
            remote_tools = options.uses_remote_tools(),
            "spawning agent session"
        );

        let mut child = Command::new(&self.program)
            .args(&args)
            .current_dir(&options.cwd)
            .env_clear()
            .envs(&options.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BenchError::Session("agent stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BenchError::Session("agent stderr was not captured".to_string()))?;

        // Drained separately so a chatty stderr cannot block the child.
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = BufReader::new(stderr).read_to_string(&mut buf).await;
            buf
        });

        let stream = try_stream! {
            let mut reader = BufReader::new(stdout);
            let mut line = Vec::new();
            loop {
                line.clear();
                let read = reader.read_until(b'\n', &mut line).await.map_err(BenchError::from)?;
                if read == 0 {
                    break;
                }
                if let Some(event) = parse_line(&line) {
                    yield event;
                }
            }

            let status = child.wait().await.map_err(BenchError::from)?;
            if !status.success() {
                let stderr = stderr_task.await.unwrap_or_default();
                let tail: String = stderr
                    .trim()
                    .chars()
                    .rev()
                    .take(STDERR_TAIL_CHARS)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                Err::<(), BenchError>(BenchError::Session(format!(
                    "agent exited with {status}: {tail}"
                )))?;
            }
        };

        Ok(Box::pin(stream))
    }

}

/// Decodes one stdout line. Blank, non-JSON and undecodable lines yield
/// nothing; a malformed `result` line is read leniently so the run still ends.
fn parse_line(line: &[u8]) -> Option<SessionEvent> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_slice::<SessionEvent>(line) {
        Ok(event) => Some(event),
        Err(err) => {
            let value = serde_json::from_slice::<Value>(line).ok();
            match value {
                Some(value) if value.get("type").and_then(Value::as_str) == Some("result") => {
                    tracing::warn!(error = %err, "result event did not match the expected shape");
                    Some(SessionEvent::Result(ResultEvent::from_value_lenient(&value)))
                }
                _ => {
                    tracing::debug!(error = %err, "skipping non-event output line");
                    None
                }
            }
        }
    }
}
