use std::{process, sync::Arc};

use clap::Parser;
use tokenbench::{
    ensure_daemon, execute, inherited_env, render_summary,
    report::{write_artifact, ArtifactMeta, BenchArtifact},
    session::SessionDefaults,
    BenchConfig, BenchError, ClaudeCli, DaemonCommand, DaemonStatus, RunPlan, ScenarioCatalog,
    SessionRunner, Settings,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "info,tokenbench=debug"
    } else {
        "info,tokenbench=info"
    }
}

fn init_tracing(verbose: bool) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_log_filter(verbose).into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_banner(config: &BenchConfig) {
    println!("=== Slack CLI vs MCP: Token Efficiency Benchmark ===\n");
    println!("  Provider:   {}", config.provider.display_name());
    println!("  Model:      {}", config.model);
    if let Some(small) = &config.small_model {
        println!("  Fast model: {small}");
    }
    println!("  Channel:    {}", config.channel);
    println!("  Max turns:  {}", config.max_turns);
    println!("  Verbose:    {}", config.verbose);
}

fn load_catalog(config: &BenchConfig) -> Result<ScenarioCatalog, BenchError> {
    match &config.catalog {
        Some(path) => ScenarioCatalog::from_path(path, &config.channel),
        None => ScenarioCatalog::builtin(&config.channel),
    }
}

#[tokio::main]
async fn main() {
    // Variables already set in the process take precedence over the file.
    let _ = dotenvy::dotenv();
    let settings = Settings::parse();
    init_tracing(settings.verbose);

    if let Err(err) = run(settings).await {
        eprintln!("Fatal: {err}");
        process::exit(1);
    }
}

async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let config = match settings.resolve() {
        Ok(config) => config,
        Err(BenchError::MissingConfig(missing)) => {
            eprintln!("Missing required config: {}", missing.join(", "));
            eprintln!("Hint: cp .env.example .env and fill in your values");
            process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    print_banner(&config);

    let catalog = load_catalog(&config)?;
    let scenarios = match catalog.select(config.scenario_filter.as_deref()) {
        Ok(scenarios) => scenarios,
        Err(BenchError::UnknownScenario {
            requested,
            available,
            suggestion,
        }) => {
            eprintln!("Unknown scenario: {requested}");
            eprintln!("Available: {}", available.join(", "));
            if let Some(suggestion) = suggestion {
                eprintln!("Did you mean {suggestion}?");
            }
            process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    let configs = config.configs();
    let ids: Vec<&str> = scenarios.iter().map(|s| s.id.as_str()).collect();
    let names: Vec<&str> = configs.iter().map(|c| c.as_str()).collect();
    println!("  Scenarios:  {}", ids.join(", "));
    println!("  Configs:    {}", names.join(", "));
    println!("  Session:    {}", config.session_mode);

    let env = config.session_env(inherited_env(std::env::vars_os()));

    if config.skip_daemon {
        println!("Skipping slack-cli daemon start.\n");
    } else {
        println!("Ensuring slack-cli daemon is running...");
        match ensure_daemon(&DaemonCommand::default(), &env).await {
            DaemonStatus::Started => println!("  Daemon ready.\n"),
            DaemonStatus::AssumedRunning => {
                println!("  Daemon may already be running, continuing.\n")
            }
        }
    }

    let backend = Arc::new(ClaudeCli::new(config.claude_bin.clone()));
    let runner = SessionRunner::new(backend, SessionDefaults::from_config(&config, env))
        .with_verbose(config.verbose);

    let plan = RunPlan {
        scenarios,
        configs,
        mode: config.session_mode,
    };
    let outcome = execute(&runner, &plan).await;

    if outcome.results.is_empty() {
        eprintln!("\nNo results collected. Check errors above.");
        process::exit(1);
    }
    if !outcome.failures.is_empty() || !outcome.skipped.is_empty() {
        eprintln!(
            "\n{} run(s) failed, {} skipped after a broken session chain.",
            outcome.failures.len(),
            outcome.skipped.len()
        );
    }

    println!("\n\n{}", render_summary(&outcome.results, config.session_mode));

    let finished_at = chrono::Utc::now();
    let artifact = BenchArtifact {
        meta: ArtifactMeta::from_config(&config, finished_at),
        results: outcome.results,
    };
    let path = write_artifact(&config.results_dir, &artifact, finished_at)?;
    println!("\nResults saved to {}", path.display());

    Ok(())
}
