use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How the collaboration tool's capabilities are exposed to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConfigKind {
    /// Project skill plus shell access, disclosed progressively.
    Skill,
    /// Remote tool schemas injected up front over an MCP connection.
    Mcp,
}

impl ConfigKind {
    pub const ALL: [ConfigKind; 2] = [ConfigKind::Skill, ConfigKind::Mcp];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKind::Skill => "skill",
            ConfigKind::Mcp => "mcp",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Every (scenario, config) pair gets a fresh session.
    #[default]
    Isolated,
    /// Scenarios chain within one resumed session per config.
    Single,
}

impl SessionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Isolated => "isolated",
            SessionMode::Single => "single",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Bedrock,
}

impl Provider {
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Anthropic => "Anthropic API",
            Provider::Bedrock => "AWS Bedrock",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub prompt: String,
}

/// Normalized metrics for one (scenario, config) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub config: ConfigKind,
    pub scenario: String,
    pub scenario_name: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    pub total_cost_usd: f64,
    pub num_turns: u32,
    pub duration_ms: u64,
    pub duration_api_ms: u64,
    pub result_text: String,
    pub is_error: bool,
    pub session_id: String,
}

impl RunResult {
    /// The session handle, if the run produced a resumable one.
    pub fn resume_handle(&self) -> Option<&str> {
        if self.session_id.is_empty() {
            None
        } else {
            Some(&self.session_id)
        }
    }
}
