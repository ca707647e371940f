pub mod config;
pub mod daemon;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod report;
pub mod runner;
pub mod scenarios;
pub mod session;
pub mod types;

pub use config::{inherited_env, BenchConfig, Settings};
pub use daemon::{ensure_daemon, DaemonCommand, DaemonStatus};
pub use error::BenchError;
pub use metrics::extract_result;
pub use orchestrator::{execute, ChainState, RunFailure, RunOutcome, RunPlan};
pub use report::{
    delta_str, pct_diff, render_summary, word_count, write_artifact, ArtifactMeta, BenchArtifact,
};
pub use runner::{ScenarioRunner, SessionRunner};
pub use scenarios::ScenarioCatalog;
pub use session::{AgentBackend, ClaudeCli, ScriptedBackend, SessionEvent, SessionOptions};
pub use types::{ConfigKind, Provider, RunResult, Scenario, SessionMode};
