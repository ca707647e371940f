use std::{collections::HashSet, fs, path::Path};

use handlebars::Handlebars;
use serde::Deserialize;
use serde_json::json;

use crate::{error::BenchError, types::Scenario};

const BUILTIN_CATALOG: &str = include_str!("../bench/scenarios.yaml");

const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    scenarios: Vec<ScenarioTemplate>,
}

#[derive(Debug, Deserialize)]
struct ScenarioTemplate {
    id: String,
    name: String,
    prompt: String,
}

/// Ordered benchmark tasks with the target channel rendered into every prompt.
#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    scenarios: Vec<Scenario>,
}

impl ScenarioCatalog {
    pub fn builtin(channel: &str) -> Result<Self, BenchError> {
        Self::from_yaml_str(BUILTIN_CATALOG, channel)
    }

    pub fn from_yaml_str(source: &str, channel: &str) -> Result<Self, BenchError> {
        let document: CatalogDocument = serde_yaml::from_str(source)?;
        Self::render(document, channel)
    }

    pub fn from_path(path: impl AsRef<Path>, channel: &str) -> Result<Self, BenchError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        let document: CatalogDocument = if ext == "json" {
            serde_json::from_slice(&bytes)?
        } else {
            serde_yaml::from_slice(&bytes)?
        };
        Self::render(document, channel)
    }

    fn render(document: CatalogDocument, channel: &str) -> Result<Self, BenchError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        let data = json!({ "channel": channel });

        let mut seen = HashSet::new();
        let mut scenarios = Vec::with_capacity(document.scenarios.len());
        for template in document.scenarios {
            if !seen.insert(template.id.clone()) {
                return Err(BenchError::DuplicateScenario(template.id));
            }
            let prompt = registry.render_template(&template.prompt, &data)?;
            scenarios.push(Scenario {
                id: template.id,
                name: template.name,
                prompt,
            });
        }

        Ok(Self { scenarios })
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn ids(&self) -> Vec<String> {
        self.scenarios.iter().map(|s| s.id.clone()).collect()
    }

    /// Returns the whole catalog, or the single scenario matching `filter`.
    pub fn select(&self, filter: Option<&str>) -> Result<Vec<Scenario>, BenchError> {
        let Some(id) = filter else {
            return Ok(self.scenarios.clone());
        };

        let selected: Vec<Scenario> = self
            .scenarios
            .iter()
            .filter(|s| s.id == id)
            .cloned()
            .collect();
        if !selected.is_empty() {
            return Ok(selected);
        }

        Err(BenchError::UnknownScenario {
            requested: id.to_string(),
            available: self.ids(),
            suggestion: self.closest_id(id),
        })
    }

    fn closest_id(&self, requested: &str) -> Option<String> {
        self.scenarios
            .iter()
            .map(|s| (strsim::jaro_winkler(requested, &s.id), &s.id))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, id)| id.clone())
    }
}
