//! ores - resolve a question to an org object and plan a query for it, offline.
//!
//! # Input (via stdin)
//! JSON with fields: question, orgProfile, preferences, snapshot
//! (`snapshot` holds `objects` and `describes`, see [`MetadataSnapshot`])
//!
//! # Output (via stdout)
//! JSON with the resolution, the validated plan and its query string
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`.

use clap::Parser;
use colored::Colorize;
use object_resolver::{
    InMemorySchemaCache, MatchType, MetadataSnapshot, OrgProfile, PlanOutcome, QueryPlanner,
    ResolveOptions, ResolverConfig, ResolverError, UserPreference,
};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::{debug, error, info};

/// Resolve a natural-language question against an org metadata snapshot
#[derive(Parser, Debug)]
#[command(name = "ores")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON config file (defaults to the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Question to resolve, overriding the one in the input
    #[arg(long, short)]
    question: Option<String>,

    /// Fuzzy similarity threshold
    #[arg(long)]
    threshold: Option<f64>,

    /// Maximum number of suggestions
    #[arg(long)]
    max_suggestions: Option<usize>,

    /// Keep system objects in the catalog
    #[arg(long)]
    include_system: bool,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanRequest {
    #[serde(default)]
    question: String,
    #[serde(default)]
    org_profile: OrgProfile,
    #[serde(default)]
    preferences: Vec<UserPreference>,
    #[serde(default)]
    snapshot: MetadataSnapshot,
}

#[derive(Debug, Serialize)]
struct ErrorOutput {
    success: bool,
    error: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        error!("Error: {}", e);
        let output = ErrorOutput {
            success: false,
            error: e.to_string(),
        };
        println!("{}", serde_json::to_string(&output).unwrap_or_default());
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<(), ResolverError> {
    let config = ResolverConfig::load(cli.config.as_deref())?;

    let mut input_json = String::new();
    io::stdin().read_to_string(&mut input_json)?;
    debug!("Received {} bytes of input", input_json.len());

    let request: PlanRequest = serde_json::from_str(&input_json)?;
    let question = cli.question.clone().unwrap_or(request.question);

    let mut options = ResolveOptions::from_config(&config);
    if let Some(threshold) = cli.threshold {
        options.threshold = threshold.clamp(0.0, 1.0);
    }
    if let Some(max) = cli.max_suggestions {
        options.max_suggestions = max;
    }
    options.include_system_objects = cli.include_system;
    options.session_preferences = request.preferences;

    let preview: String = question.chars().take(80).collect();
    info!("Resolving \"{}\" against {} objects", preview, request.snapshot.objects.len());

    let cache = InMemorySchemaCache::with_ttl_minutes(config.schema.cache_ttl_minutes);
    let planner = QueryPlanner::new(&config, &request.snapshot, &request.snapshot)
        .with_cache(&cache);
    let outcome = planner.plan(&question, &request.org_profile, &options).await;

    log_summary(&outcome, options.threshold);

    let output = if cli.pretty {
        serde_json::to_string_pretty(&outcome)?
    } else {
        serde_json::to_string(&outcome)?
    };
    println!("{}", output);

    Ok(())
}

/// Colored per-suggestion summary on stderr.
fn log_summary(outcome: &PlanOutcome, threshold: f64) {
    let resolution = &outcome.resolution;
    if !resolution.success {
        info!(
            "{} {}",
            "no match".red(),
            resolution.clarification_message.as_deref().unwrap_or_default()
        );
        return;
    }

    for candidate in &resolution.suggestions {
        let confidence = format!("{:.2}", candidate.confidence);
        let confidence = if candidate.confidence >= 0.9 {
            confidence.green()
        } else if candidate.confidence >= threshold {
            confidence.yellow()
        } else {
            confidence.red()
        };
        info!(
            "{} {} ({}) via \"{}\" confidence {}",
            match candidate.match_type {
                MatchType::Exact => "exact".green(),
                MatchType::Partial => "partial".blue(),
                MatchType::Fuzzy => "fuzzy".yellow(),
            },
            candidate.descriptor.display_label.bold(),
            candidate.canonical_name(),
            candidate.matched_keyword,
            confidence
        );
    }
    if resolution.needs_clarification {
        info!("{}", "clarification needed".yellow());
    }
    if let Some(query) = &outcome.query {
        info!("{} {}", "query".cyan(), query);
    }
}
