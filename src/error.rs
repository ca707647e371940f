use thiserror::Error;

use crate::types::ConfigKind;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("missing required config: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    #[error("unknown scenario: {requested} (available: {})", .available.join(", "))]
    UnknownScenario {
        requested: String,
        available: Vec<String>,
        suggestion: Option<String>,
    },

    #[error("duplicate scenario id in catalog: {0}")]
    DuplicateScenario(String),

    #[error("No result for {config}/{scenario}")]
    NoResult { config: ConfigKind, scenario: String },

    #[error("session error: {0}")]
    Session(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid scenario catalog: {0}")]
    Catalog(#[from] serde_yaml::Error),

    #[error("failed to render scenario prompt: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("no results collected")]
    NoResults,
}
