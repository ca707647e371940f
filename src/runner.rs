use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::{
    error::BenchError,
    metrics::extract_result,
    session::{AgentBackend, AssistantEvent, SessionDefaults, SessionEvent, SessionOptions},
    types::{ConfigKind, RunResult, Scenario},
};

const TOOL_INPUT_PREVIEW_CHARS: usize = 80;

/// Drives one scenario under one configuration to a normalized result.
#[async_trait]
pub trait ScenarioRunner: Send + Sync {
    async fn run(
        &self,
        config: ConfigKind,
        scenario: &Scenario,
        resume: Option<&str>,
    ) -> Result<RunResult, BenchError>;
}

pub struct SessionRunner {
    backend: Arc<dyn AgentBackend>,
    defaults: SessionDefaults,
    verbose: bool,
}

impl SessionRunner {
    pub fn new(backend: Arc<dyn AgentBackend>, defaults: SessionDefaults) -> Self {
        Self {
            backend,
            defaults,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn log_tool_use(&self, event: &AssistantEvent) {
        if !self.verbose {
            return;
        }
        for line in tool_use_lines(event) {
            println!("{line}");
        }
    }
}

fn tool_use_lines(event: &AssistantEvent) -> Vec<String> {
    event
        .tool_uses()
        .map(|(name, input)| {
            let input: String = input
                .to_string()
                .chars()
                .take(TOOL_INPUT_PREVIEW_CHARS)
                .collect();
            format!("    → {name}({input}...)")
        })
        .collect()
}

#[async_trait]
impl ScenarioRunner for SessionRunner {
    async fn run(
        &self,
        config: ConfigKind,
        scenario: &Scenario,
        resume: Option<&str>,
    ) -> Result<RunResult, BenchError> {
        let options = SessionOptions::for_config(config, &self.defaults, resume);
        let mut events = self.backend.open(&scenario.prompt, &options).await?;

        while let Some(event) = events.next().await {
            match event? {
                SessionEvent::Assistant(assistant) => self.log_tool_use(&assistant),
                SessionEvent::Result(result) => {
                    tracing::debug!(
                        config = %config,
                        scenario = %scenario.id,
                        subtype = %result.subtype,
                        "terminal event received"
                    );
                    return Ok(extract_result(&result, config, scenario));
                }
                other => tracing::trace!(kind = other.kind(), "ignoring session event"),
            }
        }

        Err(BenchError::NoResult {
            config,
            scenario: scenario.id.clone(),
        })
    }
}
