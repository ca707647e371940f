use std::{collections::BTreeMap, path::PathBuf};

use serde::Serialize;

use crate::{config::BenchConfig, types::ConfigKind};

pub const SYSTEM_PROMPT_PRESET: &str = "claude_code";
pub const MCP_SERVER_NAME: &str = "slack";

/// Built-in task tracking tools would add calls unrelated to Slack access.
pub const DISALLOWED_TOOLS: [&str; 5] = ["TodoWrite", "TaskCreate", "TaskUpdate", "TaskList", "TaskGet"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SystemPrompt {
    Preset { preset: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingSource {
    Project,
}

impl SettingSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SettingSource::Project => "project",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    BypassPermissions,
}

impl PermissionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionMode::BypassPermissions => "bypassPermissions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpServerConfig {
    Sse { url: String },
}

/// Values shared by every session of one harness invocation.
#[derive(Debug, Clone)]
pub struct SessionDefaults {
    pub model: String,
    pub max_turns: u32,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, String>,
    pub mcp_url: String,
}

impl SessionDefaults {
    pub fn from_config(config: &BenchConfig, env: BTreeMap<String, String>) -> Self {
        Self {
            model: config.model.clone(),
            max_turns: config.max_turns,
            cwd: config.project_root.clone(),
            env,
            mcp_url: config.mcp_url.clone(),
        }
    }
}

/// Everything a session is opened with, apart from the prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    pub system_prompt: SystemPrompt,
    pub setting_sources: Vec<SettingSource>,
    pub model: String,
    pub max_turns: u32,
    pub disallowed_tools: Vec<String>,
    pub permission_mode: PermissionMode,
    pub cwd: PathBuf,
    #[serde(skip)]
    pub env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
}

impl SessionOptions {
    pub fn for_config(kind: ConfigKind, defaults: &SessionDefaults, resume: Option<&str>) -> Self {
        let (setting_sources, mcp_servers) = match kind {
            ConfigKind::Skill => (vec![SettingSource::Project], BTreeMap::new()),
            ConfigKind::Mcp => {
                let mut servers = BTreeMap::new();
                servers.insert(
                    MCP_SERVER_NAME.to_string(),
                    McpServerConfig::Sse {
                        url: defaults.mcp_url.clone(),
                    },
                );
                (Vec::new(), servers)
            }
        };

        Self {
            system_prompt: SystemPrompt::Preset {
                preset: SYSTEM_PROMPT_PRESET.to_string(),
            },
            setting_sources,
            model: defaults.model.clone(),
            max_turns: defaults.max_turns,
            disallowed_tools: DISALLOWED_TOOLS.iter().map(|t| t.to_string()).collect(),
            permission_mode: PermissionMode::BypassPermissions,
            cwd: defaults.cwd.clone(),
            env: defaults.env.clone(),
            resume: resume.map(str::to_string),
            mcp_servers,
        }
    }

    pub fn uses_remote_tools(&self) -> bool {
        !self.mcp_servers.is_empty()
    }

    /// JSON accepted by the CLI's `--mcp-config` flag.
    pub fn mcp_config_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&serde_json::json!({ "mcpServers": self.mcp_servers }))
    }

    /// Print-mode arguments for the agent CLI. The CLI's default system prompt
    /// is the `claude_code` preset, so no flag is emitted for it.
    pub fn to_cli_args(&self, prompt: &str) -> Result<Vec<String>, serde_json::Error> {
        let sources: Vec<&str> = self.setting_sources.iter().map(|s| s.as_str()).collect();

        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--model".to_string(),
            self.model.clone(),
            "--max-turns".to_string(),
            self.max_turns.to_string(),
            "--permission-mode".to_string(),
            self.permission_mode.as_str().to_string(),
            "--setting-sources".to_string(),
            sources.join(","),
            "--disallowedTools".to_string(),
            self.disallowed_tools.join(","),
        ];
        if self.permission_mode == PermissionMode::BypassPermissions {
            args.push("--dangerously-skip-permissions".to_string());
        }
        if self.uses_remote_tools() {
            args.push("--mcp-config".to_string());
            args.push(self.mcp_config_json()?);
            args.push("--strict-mcp-config".to_string());
        }
        if let Some(resume) = &self.resume {
            args.push("--resume".to_string());
            args.push(resume.clone());
        }
        args.push("--".to_string());
        args.push(prompt.to_string());
        Ok(args)
    }
}
