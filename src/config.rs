use std::{collections::BTreeMap, ffi::OsString, fmt, path::PathBuf};

use clap::{builder::FalseyValueParser, Parser};

use crate::{
    error::BenchError,
    types::{ConfigKind, Provider, SessionMode},
};

pub const MAX_TURNS: u32 = 15;
pub const DEFAULT_MCP_URL: &str = "http://127.0.0.1:13080/sse";
pub const DEFAULT_AWS_REGION: &str = "us-west-2";
pub const DEFAULT_RESULTS_DIR: &str = "bench/results";
pub const DEFAULT_CLAUDE_BIN: &str = "claude";

const AUTH_SETTING: &str =
    "ANTHROPIC_API_KEY or AWS_ACCESS_KEY_ID+AWS_SECRET_ACCESS_KEY or AWS_BEARER_TOKEN_BEDROCK";

/// Raw process configuration. Every value may come from a flag or from the
/// environment (including a `.env` file loaded by the binary).
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "tokenbench")]
#[command(about = "Compare token cost of skill-based vs MCP tool exposure")]
pub struct Settings {
    /// Slack channel the scenarios read from and post to
    #[arg(long, env = "BENCHMARK_CHANNEL")]
    pub channel: Option<String>,

    /// Primary model identifier
    #[arg(long, env = "BENCHMARK_MODEL")]
    pub model: Option<String>,

    /// Optional fast model identifier
    #[arg(long, env = "BENCHMARK_SMALL_MODEL")]
    pub small_model: Option<String>,

    /// Log every tool invocation
    #[arg(long, env = "VERBOSE", value_parser = FalseyValueParser::new())]
    pub verbose: bool,

    /// Run only the scenario with this id
    #[arg(long, env = "BENCHMARK_SCENARIO")]
    pub scenario: Option<String>,

    /// Run only this configuration
    #[arg(long, value_enum, env = "BENCHMARK_CONFIG")]
    pub config: Option<ConfigKind>,

    /// Session topology
    #[arg(long, value_enum, env = "BENCHMARK_SESSION_MODE")]
    pub session_mode: Option<SessionMode>,

    #[arg(long, env = "SLACK_MCP_XOXP_TOKEN", hide_env_values = true)]
    pub slack_token: Option<String>,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub aws_access_key_id: Option<String>,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub aws_secret_access_key: Option<String>,

    #[arg(long, env = "AWS_BEARER_TOKEN_BEDROCK", hide_env_values = true)]
    pub aws_bearer_token: Option<String>,

    #[arg(long, env = "AWS_REGION")]
    pub aws_region: Option<String>,

    /// Agent CLI executable
    #[arg(long, env = "BENCHMARK_CLAUDE_BIN")]
    pub claude_bin: Option<PathBuf>,

    /// SSE endpoint of the Slack MCP server
    #[arg(long, env = "BENCHMARK_MCP_URL")]
    pub mcp_url: Option<String>,

    /// Working directory for agent sessions
    #[arg(long, env = "BENCHMARK_PROJECT_ROOT")]
    pub project_root: Option<PathBuf>,

    /// Directory for JSON result artifacts
    #[arg(long, env = "BENCHMARK_RESULTS_DIR")]
    pub results_dir: Option<PathBuf>,

    /// Scenario catalog (YAML or JSON) replacing the built-in one
    #[arg(long, env = "BENCHMARK_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Do not try to start the slack-cli daemon
    #[arg(long, env = "BENCHMARK_SKIP_DAEMON", value_parser = FalseyValueParser::new())]
    pub skip_daemon: bool,
}

#[derive(Clone, Default)]
pub struct Credentials {
    pub slack_token: String,
    pub api_key: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_bearer_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("slack_token", &"<redacted>")
            .field("api_key", &redact(&self.api_key))
            .field("aws_access_key_id", &redact(&self.aws_access_key_id))
            .field("aws_secret_access_key", &redact(&self.aws_secret_access_key))
            .field("aws_bearer_token", &redact(&self.aws_bearer_token))
            .finish()
    }
}

/// Validated configuration for one harness invocation.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub channel: String,
    pub model: String,
    pub small_model: Option<String>,
    pub provider: Provider,
    pub aws_region: Option<String>,
    pub verbose: bool,
    pub scenario_filter: Option<String>,
    pub config_filter: Option<ConfigKind>,
    pub session_mode: SessionMode,
    pub max_turns: u32,
    pub claude_bin: PathBuf,
    pub mcp_url: String,
    pub project_root: PathBuf,
    pub results_dir: PathBuf,
    pub catalog: Option<PathBuf>,
    pub skip_daemon: bool,
    pub credentials: Credentials,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Validates the settings, reporting every missing required value at once.
    pub fn resolve(self) -> Result<BenchConfig, BenchError> {
        let channel = present(self.channel);
        let model = present(self.model);
        let slack_token = present(self.slack_token);
        let api_key = present(self.api_key);
        let aws_access_key_id = present(self.aws_access_key_id);
        let aws_secret_access_key = present(self.aws_secret_access_key);
        let aws_bearer_token = present(self.aws_bearer_token);

        let has_aws_creds = aws_access_key_id.is_some() && aws_secret_access_key.is_some();
        let has_bearer = aws_bearer_token.is_some();

        let mut missing = Vec::new();
        if channel.is_none() {
            missing.push("BENCHMARK_CHANNEL".to_string());
        }
        if model.is_none() {
            missing.push("BENCHMARK_MODEL".to_string());
        }
        if slack_token.is_none() {
            missing.push("SLACK_MCP_XOXP_TOKEN".to_string());
        }
        if api_key.is_none() && !has_aws_creds && !has_bearer {
            missing.push(AUTH_SETTING.to_string());
        }

        let (Some(channel), Some(model), Some(slack_token)) = (channel, model, slack_token) else {
            return Err(BenchError::MissingConfig(missing));
        };
        if !missing.is_empty() {
            return Err(BenchError::MissingConfig(missing));
        }

        let provider = if api_key.is_none() {
            Provider::Bedrock
        } else {
            Provider::Anthropic
        };
        let aws_region = match provider {
            Provider::Bedrock => Some(
                present(self.aws_region).unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
            ),
            Provider::Anthropic => present(self.aws_region),
        };

        Ok(BenchConfig {
            channel,
            model,
            small_model: present(self.small_model),
            provider,
            aws_region,
            verbose: self.verbose,
            scenario_filter: present(self.scenario),
            config_filter: self.config,
            session_mode: self.session_mode.unwrap_or_default(),
            max_turns: MAX_TURNS,
            claude_bin: self
                .claude_bin
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CLAUDE_BIN)),
            mcp_url: present(self.mcp_url).unwrap_or_else(|| DEFAULT_MCP_URL.to_string()),
            project_root: self.project_root.unwrap_or_else(|| PathBuf::from(".")),
            results_dir: self
                .results_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIR)),
            catalog: self.catalog,
            skip_daemon: self.skip_daemon,
            credentials: Credentials {
                slack_token,
                api_key,
                aws_access_key_id,
                aws_secret_access_key,
                aws_bearer_token,
            },
        })
    }
}

/// Inherited process variables usable as session environment. Entries whose
/// key or value is not valid UTF-8 are dropped.
pub fn inherited_env<I>(vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                tracing::debug!(key = ?key, "dropping non-UTF-8 environment variable");
                None
            }
        })
        .collect()
}

impl BenchConfig {
    pub fn configs(&self) -> Vec<ConfigKind> {
        match self.config_filter {
            Some(kind) => vec![kind],
            None => ConfigKind::ALL.to_vec(),
        }
    }

    /// Environment for agent sessions and the daemon: the inherited
    /// environment plus model selection, provider switches and credentials.
    pub fn session_env<I>(&self, base: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut env: BTreeMap<String, String> = base.into_iter().collect();

        env.insert("ANTHROPIC_MODEL".to_string(), self.model.clone());
        if let Some(small) = &self.small_model {
            env.insert("ANTHROPIC_SMALL_FAST_MODEL".to_string(), small.clone());
        }

        let creds = &self.credentials;
        env.insert("SLACK_MCP_XOXP_TOKEN".to_string(), creds.slack_token.clone());
        let optional = [
            ("ANTHROPIC_API_KEY", &creds.api_key),
            ("AWS_ACCESS_KEY_ID", &creds.aws_access_key_id),
            ("AWS_SECRET_ACCESS_KEY", &creds.aws_secret_access_key),
            ("AWS_BEARER_TOKEN_BEDROCK", &creds.aws_bearer_token),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                env.insert(key.to_string(), value.clone());
            }
        }

        if self.provider == Provider::Bedrock {
            env.insert("CLAUDE_CODE_USE_BEDROCK".to_string(), "1".to_string());
            let region = self
                .aws_region
                .clone()
                .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());
            env.insert("AWS_REGION".to_string(), region);
        }

        // Write tools are needed by the posting scenario; the daemon restarts
        // itself when SLACK_MCP_* variables change.
        env.insert("SLACK_MCP_ADD_MESSAGE_TOOL".to_string(), "true".to_string());
        env
    }
}
