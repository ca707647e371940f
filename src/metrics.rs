use crate::{
    session::ResultEvent,
    types::{ConfigKind, RunResult, Scenario},
};

/// Normalizes a terminal session event. Absent usage, cost and timing values
/// count as zero.
pub fn extract_result(event: &ResultEvent, config: ConfigKind, scenario: &Scenario) -> RunResult {
    let usage = event.usage.clone().unwrap_or_default();

    let result_text = if event.subtype == "success" {
        event.result.clone().unwrap_or_default()
    } else {
        event
            .errors
            .as_ref()
            .map(|errors| errors.join("\n"))
            .unwrap_or_default()
    };

    RunResult {
        config,
        scenario: scenario.id.clone(),
        scenario_name: scenario.name.clone(),
        input_tokens: usage.input_tokens.unwrap_or(0),
        output_tokens: usage.output_tokens.unwrap_or(0),
        cache_read_tokens: usage.cache_read_input_tokens.unwrap_or(0),
        cache_creation_tokens: usage.cache_creation_input_tokens.unwrap_or(0),
        total_cost_usd: event.total_cost_usd.unwrap_or(0.0),
        num_turns: event.num_turns.unwrap_or(0),
        duration_ms: event.duration_ms.unwrap_or(0),
        duration_api_ms: event.duration_api_ms.unwrap_or(0),
        result_text,
        is_error: event.is_error.unwrap_or(false),
        session_id: event.session_id.clone().unwrap_or_default(),
    }
}
