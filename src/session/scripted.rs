use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::stream;

use super::{AgentBackend, SessionEvent, SessionEventStream, SessionOptions};
use crate::error::BenchError;

type Script =
    dyn Fn(&str, &SessionOptions) -> Result<Vec<SessionEvent>, BenchError> + Send + Sync;

#[derive(Debug, Clone)]
pub struct ScriptedCall {
    pub prompt: String,
    pub options: SessionOptions,
}

/// Deterministic backend: a closure decides the events of every session.
pub struct ScriptedBackend {
    script: Box<Script>,
    calls: Mutex<Vec<ScriptedCall>>,
}

impl ScriptedBackend {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&str, &SessionOptions) -> Result<Vec<SessionEvent>, BenchError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sessions opened so far, in order.
    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AgentBackend for ScriptedBackend {
    async fn open(
        &self,
        prompt: &str,
        options: &SessionOptions,
    ) -> Result<SessionEventStream, BenchError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ScriptedCall {
                prompt: prompt.to_string(),
                options: options.clone(),
            });

        let events = (self.script)(prompt, options)?;
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}
