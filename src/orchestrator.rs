use colored::Colorize;

use crate::{
    runner::ScenarioRunner,
    types::{ConfigKind, RunResult, Scenario, SessionMode},
};

#[derive(Debug, Clone)]
pub struct RunPlan {
    pub scenarios: Vec<Scenario>,
    pub configs: Vec<ConfigKind>,
    pub mode: SessionMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunFailure {
    pub config: ConfigKind,
    pub scenario: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub results: Vec<RunResult>,
    pub failures: Vec<RunFailure>,
    /// Runs never attempted because their configuration's chain broke.
    pub skipped: Vec<(ConfigKind, String)>,
}

/// Session continuity carried from one scenario to the next within a
/// configuration in single-session mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainState {
    handle: Option<String>,
    broken: bool,
}

impl ChainState {
    pub fn resume_handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn after_success(self, result: &RunResult) -> Self {
        Self {
            handle: result.resume_handle().map(str::to_string),
            broken: false,
        }
    }

    /// A failed session cannot be resumed, so the chain ends here.
    pub fn after_failure(self) -> Self {
        Self {
            handle: None,
            broken: true,
        }
    }
}

pub async fn execute(runner: &dyn ScenarioRunner, plan: &RunPlan) -> RunOutcome {
    match plan.mode {
        SessionMode::Isolated => run_isolated(runner, plan).await,
        SessionMode::Single => run_chained(runner, plan).await,
    }
}

async fn run_isolated(runner: &dyn ScenarioRunner, plan: &RunPlan) -> RunOutcome {
    let mut outcome = RunOutcome::default();

    for scenario in &plan.scenarios {
        println!("\n--- {} ({}) ---", scenario.name, scenario.id);

        for &config in &plan.configs {
            let label = run_label(config);
            println!("  {label} Running...");

            match runner.run(config, scenario, None).await {
                Ok(result) => {
                    println!("  {label} {}", progress_line(&result));
                    outcome.results.push(result);
                }
                Err(err) => {
                    report_failure(&label, config, scenario, &err.to_string());
                    outcome.failures.push(RunFailure {
                        config,
                        scenario: scenario.id.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }
    }

    outcome
}

async fn run_chained(runner: &dyn ScenarioRunner, plan: &RunPlan) -> RunOutcome {
    let mut outcome = RunOutcome::default();

    for &config in &plan.configs {
        println!("\n=== Config: {config} (single session) ===");
        let label = run_label(config);
        let mut chain = ChainState::default();

        for scenario in &plan.scenarios {
            if chain.is_broken() {
                outcome.skipped.push((config, scenario.id.clone()));
                continue;
            }

            println!("\n--- {} ({}) ---", scenario.name, scenario.id);
            match chain.resume_handle() {
                Some(handle) => {
                    let short: String = handle.chars().take(8).collect();
                    println!("  {label} Running... (resuming {short}...)");
                }
                None => println!("  {label} Running..."),
            }

            match runner.run(config, scenario, chain.resume_handle()).await {
                Ok(result) => {
                    println!("  {label} {}", progress_line(&result));
                    chain = chain.after_success(&result);
                    outcome.results.push(result);
                }
                Err(err) => {
                    report_failure(&label, config, scenario, &err.to_string());
                    outcome.failures.push(RunFailure {
                        config,
                        scenario: scenario.id.clone(),
                        message: err.to_string(),
                    });
                    chain = chain.after_failure();
                }
            }
        }

        if chain.is_broken() {
            let remaining = outcome.skipped.iter().filter(|(c, _)| *c == config).count();
            if remaining > 0 {
                tracing::warn!(%config, remaining, "session chain broken, skipping remaining scenarios");
            }
        }
    }

    outcome
}

fn run_label(config: ConfigKind) -> String {
    format!("{:<8}", format!("[{config}]"))
}

fn report_failure(label: &str, config: ConfigKind, scenario: &Scenario, message: &str) {
    tracing::error!(%config, scenario = %scenario.id, error = %message, "run failed");
    eprintln!("  {label} {} {message}", "FAILED:".red());
}

pub fn progress_line(result: &RunResult) -> String {
    let mut line = format!(
        "Input: {} | Output: {} | Cost: ${:.6} | Turns: {} | API: {:.1}s",
        result.input_tokens,
        result.output_tokens,
        result.total_cost_usd,
        result.num_turns,
        result.duration_api_ms as f64 / 1000.0,
    );
    if result.is_error {
        line.push_str(" | ERROR");
    }
    line
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tracing_subscriber::{
        layer::{Context, SubscriberExt},
        Layer,
    };

    use super::*;
    use crate::error::BenchError;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        config: ConfigKind,
        scenario: String,
        resume: Option<String>,
    }

    /// Hands out session ids `<config>-<n>` and fails the listed runs.
    struct RecordingRunner {
        fail: Vec<(ConfigKind, &'static str)>,
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingRunner {
        fn new(fail: Vec<(ConfigKind, &'static str)>) -> Self {
            Self {
                fail,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ScenarioRunner for RecordingRunner {
        async fn run(
            &self,
            config: ConfigKind,
            scenario: &Scenario,
            resume: Option<&str>,
        ) -> Result<RunResult, BenchError> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(Call {
                    config,
                    scenario: scenario.id.clone(),
                    resume: resume.map(str::to_string),
                });
                calls.len()
            };

            if self.fail.iter().any(|(c, s)| *c == config && *s == scenario.id) {
                return Err(BenchError::NoResult {
                    config,
                    scenario: scenario.id.clone(),
                });
            }

            Ok(RunResult {
                config,
                scenario: scenario.id.clone(),
                scenario_name: scenario.name.clone(),
                input_tokens: 1,
                output_tokens: 1,
                cache_read_tokens: 0,
                cache_creation_tokens: 0,
                total_cost_usd: 0.01,
                num_turns: 1,
                duration_ms: 10,
                duration_api_ms: 5,
                result_text: "ok".to_string(),
                is_error: false,
                session_id: format!("{config}-{n}"),
            })
        }
    }

    fn scenarios(n: usize) -> Vec<Scenario> {
        (1..=n)
            .map(|i| Scenario {
                id: format!("s{i}"),
                name: format!("Scenario {i}"),
                prompt: format!("prompt {i}"),
            })
            .collect()
    }

    fn plan(n: usize, mode: SessionMode) -> RunPlan {
        RunPlan {
            scenarios: scenarios(n),
            configs: ConfigKind::ALL.to_vec(),
            mode,
        }
    }

    #[tokio::test]
    async fn isolated_runs_full_cross_product_without_resume() {
        let runner = RecordingRunner::new(Vec::new());
        let outcome = execute(&runner, &plan(3, SessionMode::Isolated)).await;

        assert_eq!(outcome.results.len(), 6);
        assert!(outcome.failures.is_empty());
        let calls = runner.calls();
        assert!(calls.iter().all(|c| c.resume.is_none()));
        let order: Vec<_> = calls.iter().map(|c| (c.scenario.as_str(), c.config)).collect();
        assert_eq!(
            &order[..2],
            [("s1", ConfigKind::Skill), ("s1", ConfigKind::Mcp)]
        );
    }

    #[tokio::test]
    async fn isolated_failure_does_not_block_later_runs() {
        let runner = RecordingRunner::new(vec![(ConfigKind::Skill, "s1")]);
        let outcome = execute(&runner, &plan(2, SessionMode::Isolated)).await;

        assert_eq!(runner.calls().len(), 4);
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(
            outcome.failures,
            vec![RunFailure {
                config: ConfigKind::Skill,
                scenario: "s1".to_string(),
                message: "No result for skill/s1".to_string(),
            }]
        );
        assert!(outcome.skipped.is_empty());
    }

    #[tokio::test]
    async fn chained_runs_resume_previous_session() {
        let runner = RecordingRunner::new(Vec::new());
        let outcome = execute(&runner, &plan(3, SessionMode::Single)).await;

        assert_eq!(outcome.results.len(), 6);
        let resumes: Vec<_> = runner.calls().into_iter().map(|c| (c.config, c.resume)).collect();
        assert_eq!(
            resumes,
            vec![
                (ConfigKind::Skill, None),
                (ConfigKind::Skill, Some("skill-1".to_string())),
                (ConfigKind::Skill, Some("skill-2".to_string())),
                (ConfigKind::Mcp, None),
                (ConfigKind::Mcp, Some("mcp-4".to_string())),
                (ConfigKind::Mcp, Some("mcp-5".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn chained_failure_skips_rest_of_that_config_only() {
        let runner = RecordingRunner::new(vec![(ConfigKind::Skill, "s2")]);
        let outcome = execute(&runner, &plan(4, SessionMode::Single)).await;

        let calls = runner.calls();
        let skill_calls: Vec<_> = calls.iter().filter(|c| c.config == ConfigKind::Skill).collect();
        assert_eq!(skill_calls.len(), 2);
        assert_eq!(
            outcome.skipped,
            vec![
                (ConfigKind::Skill, "s3".to_string()),
                (ConfigKind::Skill, "s4".to_string()),
            ]
        );

        let mcp_calls: Vec<_> = calls.iter().filter(|c| c.config == ConfigKind::Mcp).collect();
        assert_eq!(mcp_calls.len(), 4);
        assert_eq!(mcp_calls[0].resume, None);
        assert_eq!(outcome.results.len(), 5);
    }

    #[test]
    fn chain_state_transitions() {
        let result = RunResult {
            config: ConfigKind::Skill,
            scenario: "s1".to_string(),
            scenario_name: "S1".to_string(),
            input_tokens: 0,
            output_tokens: 0,
            cache_read_tokens: 0,
            cache_creation_tokens: 0,
            total_cost_usd: 0.0,
            num_turns: 0,
            duration_ms: 0,
            duration_api_ms: 0,
            result_text: String::new(),
            is_error: true,
            session_id: "abc".to_string(),
        };

        let chain = ChainState::default();
        assert_eq!(chain.resume_handle(), None);

        let chain = chain.after_success(&result);
        assert_eq!(chain.resume_handle(), Some("abc"));
        assert!(!chain.is_broken());

        let empty = RunResult {
            session_id: String::new(),
            ..result
        };
        assert_eq!(chain.clone().after_success(&empty).resume_handle(), None);

        let broken = chain.after_failure();
        assert!(broken.is_broken());
        assert_eq!(broken.resume_handle(), None);
    }

    /// Collects the level and message of every event.
    struct EventLevels(Arc<Mutex<Vec<(tracing::Level, String)>>>);

    impl<S: tracing::Subscriber> Layer<S> for EventLevels {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut message = String::new();
            event.record(&mut |field: &tracing::field::Field, value: &dyn std::fmt::Debug| {
                if field.name() == "message" {
                    message = format!("{value:?}");
                }
            });
            self.0.lock().unwrap().push((*event.metadata().level(), message));
        }
    }

    #[test]
    fn failed_run_is_logged_at_error_level() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(EventLevels(events.clone()));
        let scenario = Scenario {
            id: "s1".to_string(),
            name: "One".to_string(),
            prompt: "p".to_string(),
        };

        tracing::subscriber::with_default(subscriber, || {
            report_failure("[mcp]", ConfigKind::Mcp, &scenario, "No result for mcp/s1");
        });

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, tracing::Level::ERROR);
        assert_eq!(events[0].1, "run failed");
    }

    #[test]
    fn progress_line_flags_errors() {
        let result = RunResult {
            config: ConfigKind::Mcp,
            scenario: "s1".to_string(),
            scenario_name: "S1".to_string(),
            input_tokens: 12,
            output_tokens: 340,
            cache_read_tokens: 0,
            cache_creation_tokens: 0,
            total_cost_usd: 0.0421,
            num_turns: 4,
            duration_ms: 5300,
            duration_api_ms: 4100,
            result_text: String::new(),
            is_error: true,
            session_id: String::new(),
        };
        assert_eq!(
            progress_line(&result),
            "Input: 12 | Output: 340 | Cost: $0.042100 | Turns: 4 | API: 4.1s | ERROR"
        );
    }
}
