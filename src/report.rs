use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    config::BenchConfig,
    error::BenchError,
    types::{ConfigKind, Provider, RunResult, SessionMode},
};

const PREVIEW_CHARS: usize = 120;

/// Percentage change of `a` relative to the baseline `b`; zero for a zero baseline.
pub fn pct_diff(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        0.0
    } else {
        (a - b) / b * 100.0
    }
}

pub fn delta_str(pct: f64) -> String {
    // Folds -0.0 into 0.0 so it prints as +0.0%.
    let pct = if pct == 0.0 { 0.0 } else { pct };
    let sign = if pct >= 0.0 { "+" } else { "" };
    format!("{sign}{pct:.1}%")
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let mut out: String = flat.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfigTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    pub total_cost_usd: f64,
    pub num_turns: u64,
    pub runs: usize,
}

impl ConfigTotals {
    pub fn of(results: &[RunResult], config: ConfigKind) -> Self {
        results
            .iter()
            .filter(|r| r.config == config)
            .fold(Self::default(), |mut acc, r| {
                acc.input_tokens += r.input_tokens;
                acc.output_tokens += r.output_tokens;
                acc.cache_read_tokens += r.cache_read_tokens;
                acc.cache_creation_tokens += r.cache_creation_tokens;
                acc.total_cost_usd += r.total_cost_usd;
                acc.num_turns += u64::from(r.num_turns);
                acc.runs += 1;
                acc
            })
    }
}

/// Relative cost and turn change of `mcp` against the `skill` baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delta {
    pub cost_pct: f64,
    pub turns_pct: f64,
}

impl Delta {
    pub fn between(mcp_cost: f64, mcp_turns: f64, skill_cost: f64, skill_turns: f64) -> Self {
        Self {
            cost_pct: pct_diff(mcp_cost, skill_cost),
            turns_pct: pct_diff(mcp_turns, skill_turns),
        }
    }

    pub fn for_group(group: &[&RunResult]) -> Option<Self> {
        let skill = group.iter().find(|r| r.config == ConfigKind::Skill)?;
        let mcp = group.iter().find(|r| r.config == ConfigKind::Mcp)?;
        Some(Self::between(
            mcp.total_cost_usd,
            f64::from(mcp.num_turns),
            skill.total_cost_usd,
            f64::from(skill.num_turns),
        ))
    }
}

/// Results grouped by scenario id, groups in first-seen order.
pub fn group_by_scenario(results: &[RunResult]) -> Vec<(&str, Vec<&RunResult>)> {
    let mut groups: Vec<(&str, Vec<&RunResult>)> = Vec::new();
    for result in results {
        match groups.iter_mut().find(|(id, _)| *id == result.scenario) {
            Some((_, group)) => group.push(result),
            None => groups.push((result.scenario.as_str(), vec![result])),
        }
    }
    groups
}

fn format_row(r: &RunResult) -> String {
    [
        format!("{:<22}", r.scenario_name),
        format!("{:<6}", r.config.as_str()),
        format!("{:>8}", r.input_tokens),
        format!("{:>8}", r.output_tokens),
        format!("{:>10}", r.cache_read_tokens),
        format!("{:>12}", r.cache_creation_tokens),
        format!("${:.6}", r.total_cost_usd),
        format!("{:>5}", r.num_turns),
        format!("{:>7}", format!("{:.1}s", r.duration_api_ms as f64 / 1000.0)),
        format!("{:>5}", word_count(&r.result_text)),
        if r.is_error { "ERR" } else { "OK" }.to_string(),
    ]
    .join(" | ")
}

fn header() -> String {
    [
        format!("{:<22}", "Scenario"),
        format!("{:<6}", "Config"),
        format!("{:>8}", "Input"),
        format!("{:>8}", "Output"),
        format!("{:>10}", "CacheRead"),
        format!("{:>12}", "CacheCreate"),
        "Cost (USD) ".to_string(),
        format!("{:>5}", "Turns"),
        format!("{:>7}", "API"),
        format!("{:>5}", "Words"),
        "Status".to_string(),
    ]
    .join(" | ")
}

/// Renders the comparison tables: per-run rows, deltas, totals and previews.
pub fn render_summary(results: &[RunResult], mode: SessionMode) -> String {
    let mut lines = Vec::new();
    let header = header();

    lines.push(format!("=== RESULTS (session: {mode}) ==="));
    lines.push(String::new());
    lines.push(header.clone());
    lines.push("-".repeat(header.chars().count()));

    let groups = group_by_scenario(results);
    for (_, group) in &groups {
        for r in group {
            lines.push(format_row(r));
        }
        if let Some(delta) = Delta::for_group(group) {
            lines.push(format!(
                "{:<33}| cost: {:>7} | turns: {:>7} |",
                "  Δ mcp vs skill",
                delta_str(delta.cost_pct),
                delta_str(delta.turns_pct),
            ));
        }
        lines.push(String::new());
    }

    let present: Vec<ConfigKind> = ConfigKind::ALL
        .into_iter()
        .filter(|c| results.iter().any(|r| r.config == *c))
        .collect();

    lines.push("=== TOTALS ===".to_string());
    lines.push(String::new());
    for config in &present {
        let totals = ConfigTotals::of(results, *config);
        lines.push(format!(
            "  {:<6}  {} input, {} output, {} cache read, {} cache create, {} turns, ${:.6}",
            config.as_str(),
            totals.input_tokens,
            totals.output_tokens,
            totals.cache_read_tokens,
            totals.cache_creation_tokens,
            totals.num_turns,
            totals.total_cost_usd,
        ));
    }
    if present.len() == ConfigKind::ALL.len() {
        let skill = ConfigTotals::of(results, ConfigKind::Skill);
        let mcp = ConfigTotals::of(results, ConfigKind::Mcp);
        let delta = Delta::between(
            mcp.total_cost_usd,
            mcp.num_turns as f64,
            skill.total_cost_usd,
            skill.num_turns as f64,
        );
        lines.push(format!(
            "  Δ mcp vs skill: {} cost, {} turns",
            delta_str(delta.cost_pct),
            delta_str(delta.turns_pct),
        ));
    }

    lines.push(String::new());
    lines.push("=== RESULT QUALITY ===".to_string());
    lines.push(String::new());
    for (id, group) in &groups {
        let name = group.first().map(|r| r.scenario_name.as_str()).unwrap_or(*id);
        lines.push(format!("  {name}:"));
        for r in group {
            lines.push(format!(
                "    [{:<6}] {} words | {}",
                r.config.as_str(),
                word_count(&r.result_text),
                preview(&r.result_text),
            ));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMeta {
    pub provider: Provider,
    pub model: String,
    pub channel: String,
    pub max_turns: u32,
    pub session_mode: SessionMode,
    pub timestamp: String,
}

impl ArtifactMeta {
    pub fn from_config(config: &BenchConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            provider: config.provider,
            model: config.model.clone(),
            channel: config.channel.clone(),
            max_turns: config.max_turns,
            session_mode: config.session_mode,
            timestamp: iso_timestamp(started_at),
        }
    }
}

/// Raw record set of one invocation, as persisted to the results directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchArtifact {
    pub meta: ArtifactMeta,
    pub results: Vec<RunResult>,
}

fn iso_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn artifact_file_name(ts: DateTime<Utc>) -> String {
    let stamp: String = iso_timestamp(ts)
        .chars()
        .map(|c| if c == ':' || c == '.' { '-' } else { c })
        .collect();
    format!("{stamp}.json")
}

pub fn write_artifact(
    dir: &Path,
    artifact: &BenchArtifact,
    ts: DateTime<Utc>,
) -> Result<PathBuf, BenchError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(artifact_file_name(ts));
    let json = serde_json::to_string_pretty(artifact)?;
    fs::write(&path, json)?;
    tracing::debug!(path = %path.display(), results = artifact.results.len(), "saved results");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn result(config: ConfigKind, scenario: &str, cost: f64, turns: u32, text: &str) -> RunResult {
        RunResult {
            config,
            scenario: scenario.to_string(),
            scenario_name: format!("Name {scenario}"),
            input_tokens: 100,
            output_tokens: 50,
            cache_read_tokens: 1000,
            cache_creation_tokens: 10,
            total_cost_usd: cost,
            num_turns: turns,
            duration_ms: 3000,
            duration_api_ms: 2500,
            result_text: text.to_string(),
            is_error: false,
            session_id: String::new(),
        }
    }

    #[test]
    fn pct_diff_handles_zero_baseline() {
        assert_eq!(pct_diff(5.0, 0.0), 0.0);
        assert_eq!(pct_diff(0.0, 0.0), 0.0);
        assert_eq!(pct_diff(150.0, 100.0), 50.0);
        assert_eq!(pct_diff(50.0, 100.0), -50.0);
    }

    #[test]
    fn delta_str_sign_and_precision() {
        assert_eq!(delta_str(0.0), "+0.0%");
        assert_eq!(delta_str(12.345), "+12.3%");
        assert_eq!(delta_str(-50.0), "-50.0%");
        assert_eq!(delta_str(100.0), "+100.0%");
    }

    #[test]
    fn delta_str_negative_zero_has_single_sign() {
        assert_eq!(delta_str(-0.0), "+0.0%");
        assert_eq!(delta_str(pct_diff(-2.0, -2.0)), "+0.0%");
    }

    #[test]
    fn word_count_counts_non_whitespace_runs() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  a   b "), 2);
        assert_eq!(word_count("one\ntwo\tthree"), 3);
    }

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("a\nb"), "a b");
        let long = "x".repeat(130);
        let shown = preview(&long);
        assert_eq!(shown.len(), 123);
        assert!(shown.ends_with("..."));
        assert_eq!(preview(&"y".repeat(120)), "y".repeat(120));
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let results = vec![
            result(ConfigKind::Skill, "s2", 0.1, 1, ""),
            result(ConfigKind::Skill, "s1", 0.1, 1, ""),
            result(ConfigKind::Mcp, "s2", 0.1, 1, ""),
        ];
        let groups = group_by_scenario(&results);
        let ids: Vec<_> = groups.iter().map(|(id, g)| (*id, g.len())).collect();
        assert_eq!(ids, vec![("s2", 2), ("s1", 1)]);
    }

    #[test]
    fn totals_sum_per_config() {
        let results = vec![
            result(ConfigKind::Skill, "s1", 0.10, 2, ""),
            result(ConfigKind::Mcp, "s1", 0.30, 3, ""),
            result(ConfigKind::Skill, "s2", 0.20, 4, ""),
        ];
        let skill = ConfigTotals::of(&results, ConfigKind::Skill);
        assert_eq!(skill.runs, 2);
        assert_eq!(skill.num_turns, 6);
        assert_eq!(skill.input_tokens, 200);
        assert!((skill.total_cost_usd - 0.30).abs() < 1e-12);
    }

    #[test]
    fn summary_shows_delta_only_for_complete_groups() {
        let results = vec![
            result(ConfigKind::Skill, "s1", 0.02, 4, "hello world"),
            result(ConfigKind::Mcp, "s1", 0.03, 2, "hi"),
            result(ConfigKind::Skill, "s2", 0.05, 1, ""),
        ];
        let summary = render_summary(&results, SessionMode::Single);

        assert!(summary.starts_with("=== RESULTS (session: single) ==="));
        assert_eq!(summary.matches("Δ mcp vs skill  ").count(), 1);
        assert!(summary.contains("| cost:  +50.0% | turns:  -50.0% |"));
        assert!(summary.contains("  skill   200 input, 100 output, 2000 cache read, 20 cache create, 5 turns, $0.070000"));
        assert!(summary.contains("  mcp     100 input, 50 output, 1000 cache read, 10 cache create, 2 turns, $0.030000"));
        assert!(summary.contains("    [skill ] 2 words | hello world"));
        assert!(summary.contains("Name s2:"));
    }

    #[test]
    fn summary_row_layout() {
        let results = vec![result(ConfigKind::Mcp, "s1", 0.0421, 4, "a b c")];
        let summary = render_summary(&results, SessionMode::Isolated);
        let row = summary
            .lines()
            .find(|l| l.starts_with("Name s1"))
            .unwrap();
        assert_eq!(
            row,
            "Name s1                | mcp    |      100 |       50 |       1000 |           10 | $0.042100 |     4 |    2.5s |     3 | OK"
        );
        assert!(!summary.contains("Δ mcp vs skill:"));
    }

    #[test]
    fn artifact_file_name_is_filesystem_safe() {
        let ts = Utc.with_ymd_and_hms(2026, 10, 19, 8, 5, 3).unwrap();
        assert_eq!(artifact_file_name(ts), "2026-10-19T08-05-03-000Z.json");
    }

    #[test]
    fn writes_artifact_with_meta() {
        let dir = tempfile::tempdir().unwrap();
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let artifact = BenchArtifact {
            meta: ArtifactMeta {
                provider: Provider::Bedrock,
                model: "m".to_string(),
                channel: "#c".to_string(),
                max_turns: 15,
                session_mode: SessionMode::Isolated,
                timestamp: "2026-01-02T03:04:05.000Z".to_string(),
            },
            results: vec![result(ConfigKind::Skill, "s1", 0.1, 1, "x")],
        };

        let path = write_artifact(&dir.path().join("results"), &artifact, ts).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(json["meta"]["provider"], "bedrock");
        assert_eq!(json["meta"]["maxTurns"], 15);
        assert_eq!(json["meta"]["sessionMode"], "isolated");
        assert_eq!(json["results"][0]["scenarioName"], "Name s1");
        assert_eq!(json["results"][0]["cacheReadTokens"], 1000);
        assert_eq!(json["results"][0]["config"], "skill");
    }
}
