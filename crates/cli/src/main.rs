use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cxz_core::search::{LlmParserConfig, LlmRankerConfig};
use cxz_core::{
    create_llm_client, load_config, metrics, validate_config, CheckResult, Config, DiscogsClient,
    LlmIntentParser, LlmResultRanker, QueryBuilder, RankedResult, RankingMethod, RateLimiter,
    ReleaseDetails, SanitizedConfig, SearchOrchestrator, SearchOutcome, SearchPreview,
};

/// Natural-language vinyl record search against Discogs.
#[derive(Parser, Debug)]
#[clap(name = "cxz", version)]
struct CliArgs {
    /// Config file (default: $CXZ_CONFIG or ./config.toml).
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Print collected metrics to stderr when the command finishes.
    #[clap(long, global = true)]
    metrics: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search for a record and print ranked releases.
    Search {
        /// Free-text description, e.g. "pink floyd dark side red vinyl".
        text: Vec<String>,

        /// Print the full outcome as JSON.
        #[clap(long)]
        json: bool,

        /// Maximum results to print.
        #[clap(long, default_value_t = 10)]
        limit: usize,

        /// Fetch full release records for this many top results.
        #[clap(long, default_value_t = 0)]
        details: usize,
    },
    /// Show how a description would be parsed and searched, without searching.
    Preview {
        text: Vec<String>,
    },
    /// Print the effective configuration with secrets redacted.
    Config,
    /// Check that the catalog and reasoning service accept the credentials.
    Check,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Logs go to stderr so --json output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let config_path = args.config.clone().unwrap_or_else(|| {
        std::env::var("CXZ_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"))
    });

    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let result = run_command(args.command, &config).await;

    if args.metrics {
        let text = metrics::render().context("Failed to render metrics")?;
        eprint!("{}", text);
    }

    result
}

async fn run_command(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Config => {
            let sanitized = SanitizedConfig::from(config);
            println!("{}", serde_json::to_string_pretty(&sanitized)?);
        }
        Command::Search {
            text,
            json,
            limit,
            details,
        } => {
            let orchestrator = build_orchestrator(config)?;
            let outcome = orchestrator
                .search_with_details(&text.join(" "), details)
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome, limit);
            }
        }
        Command::Preview { text } => {
            let orchestrator = build_orchestrator(config)?;
            let preview = orchestrator.preview(&text.join(" ")).await?;
            print_preview(&preview);
        }
        Command::Check => {
            let orchestrator = build_orchestrator(config)?;
            let check = orchestrator.check_services().await;
            print_check("Discogs", &check.catalog);
            print_check("Reasoning service", &check.reasoning);
            if !check.all_ok() {
                anyhow::bail!("One or more services failed the check");
            }
        }
    }

    Ok(())
}

fn build_orchestrator(config: &Config) -> Result<SearchOrchestrator> {
    // One limiter for every catalog request in the process
    let limiter = Arc::new(RateLimiter::new(
        config.discogs.requests_per_minute,
        Duration::from_secs(config.discogs.max_wait_secs as u64),
    ));
    let catalog = DiscogsClient::new(config.discogs.clone(), limiter)
        .context("Failed to create Discogs client")?;

    let llm = create_llm_client(&config.llm);
    info!(provider = llm.provider(), model = llm.model(), "Using reasoning service");

    let parser = LlmIntentParser::new(Arc::clone(&llm))
        .with_config(LlmParserConfig {
            max_tokens: config.llm.max_tokens,
            ..LlmParserConfig::default()
        })
        .with_credential(config.llm.api_key.clone());
    let ranker = LlmResultRanker::new(llm)
        .with_config(LlmRankerConfig {
            max_candidates: config.search.max_ranked_candidates,
            max_tokens: config.llm.max_tokens.max(LlmRankerConfig::default().max_tokens),
            ..LlmRankerConfig::default()
        })
        .with_credential(config.llm.api_key.clone());

    let builder = QueryBuilder::new(config.search.format_filter.clone(), config.discogs.per_page);

    Ok(SearchOrchestrator::new(
        config.search.clone(),
        builder,
        Arc::new(parser),
        Arc::new(catalog),
        Arc::new(ranker),
    ))
}

/// Quality band for a relevance score.
fn quality_band(score: f32) -> &'static str {
    if score >= 0.8 {
        "strong match"
    } else if score >= 0.6 {
        "good match"
    } else if score >= 0.4 {
        "possible match"
    } else {
        "weak match"
    }
}

fn print_outcome(outcome: &SearchOutcome, limit: usize) {
    if let Some(query) = &outcome.query {
        println!(
            "Looking for: {} - {}{}",
            display_or_dash(&query.artist),
            display_or_dash(&query.album),
            if query.variant_descriptors.is_empty() {
                String::new()
            } else {
                format!(" [{}]", query.variant_descriptors.join(", "))
            }
        );
    }
    if outcome.low_confidence {
        println!("! Unsure what record you meant; try adding the artist or album.");
    }
    if let Some(degraded) = &outcome.ranking_degraded {
        println!("! Ranked without the reasoning service ({}).", degraded.reason);
    }

    if let Some(reason) = outcome.empty_reason {
        println!("No results ({:?}).", reason);
        return;
    }

    println!();
    for (i, result) in outcome.results.iter().take(limit).enumerate() {
        print_result(i + 1, result);
    }
    if outcome.results.len() > limit {
        println!("... and {} more", outcome.results.len() - limit);
    }

    for details in &outcome.details {
        println!();
        print_details(details);
    }
}

fn print_details(details: &ReleaseDetails) {
    println!("#{} {}", details.id, details.display_title());
    let mut facts = Vec::new();
    if let Some(year) = details.year {
        facts.push(year.to_string());
    }
    if let Some(country) = &details.country {
        facts.push(country.clone());
    }
    if !details.formats.is_empty() {
        facts.push(details.formats.join(", "));
    }
    if !facts.is_empty() {
        println!("    {}", facts.join(" | "));
    }
    for label in &details.labels {
        match &label.catalog_number {
            Some(catno) => println!("    Label: {} ({})", label.name, catno),
            None => println!("    Label: {}", label.name),
        }
    }
    for track in &details.tracklist {
        match &track.duration {
            Some(duration) => println!("    {:<4} {} [{}]", track.position, track.title, duration),
            None => println!("    {:<4} {}", track.position, track.title),
        }
    }
}

fn print_check(service: &str, result: &CheckResult) {
    match result {
        CheckResult::Ok => println!("{:<18} ok", service),
        CheckResult::Failed { reason } => println!("{:<18} FAILED: {}", service, reason),
    }
}

fn print_result(position: usize, result: &RankedResult) {
    let candidate = &result.candidate;
    let score = match result.method {
        RankingMethod::Unscored => "unscored".to_string(),
        _ => format!("{:.2} {}", result.relevance_score, quality_band(result.relevance_score)),
    };
    println!("{:>2}. {} [{}]", position, candidate.title, score);
    println!(
        "    #{}{}  {}",
        candidate.id,
        candidate.year().map(|y| format!(" ({})", y)).unwrap_or_default(),
        candidate.formats.join(", ")
    );
    if !result.explanation.is_empty() {
        println!("    {}", result.explanation);
    }
}

fn print_preview(preview: &SearchPreview) {
    let query = &preview.query;
    println!("Artist:      {}", display_or_dash(&query.artist));
    println!("Album:       {}", display_or_dash(&query.album));
    if let Some(track) = &query.track {
        println!("Track:       {}", track);
    }
    if let Some(year) = query.year {
        println!("Year:        {}", year);
    }
    if let Some(genre) = &query.genre {
        println!("Genre:       {}", genre);
    }
    println!("Descriptors: {}", query.variant_descriptors.join(", "));
    println!(
        "Confidence:  {:.2}{}",
        query.confidence,
        if preview.low_confidence { " (low)" } else { "" }
    );
    println!();
    if preview.searchable {
        println!("Catalog terms:   {}", preview.request.terms);
        for (key, value) in &preview.request.filters {
            println!("Catalog filter:  {}={}", key, value);
        }
        if !preview.will_rank_variants {
            println!("No variant descriptors; results will get a neutral ranking.");
        }
    } else {
        println!("Nothing to search for.");
    }
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_bands() {
        assert_eq!(quality_band(0.95), "strong match");
        assert_eq!(quality_band(0.8), "strong match");
        assert_eq!(quality_band(0.6), "good match");
        assert_eq!(quality_band(0.45), "possible match");
        assert_eq!(quality_band(0.1), "weak match");
    }

    #[test]
    fn test_cli_parses_search() {
        let args = CliArgs::parse_from([
            "cxz", "--config", "my.toml", "search", "pink", "floyd", "--json",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("my.toml")));
        match args.command {
            Command::Search {
                text,
                json,
                limit,
                details,
            } => {
                assert_eq!(text.join(" "), "pink floyd");
                assert!(json);
                assert_eq!(limit, 10);
                assert_eq!(details, 0);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(!args.metrics);
    }

    #[test]
    fn test_cli_parses_check_and_metrics() {
        let args = CliArgs::parse_from(["cxz", "check", "--metrics"]);
        assert!(args.metrics);
        assert!(matches!(args.command, Command::Check));

        let args = CliArgs::parse_from(["cxz", "search", "can", "--details", "3"]);
        assert!(matches!(args.command, Command::Search { details: 3, .. }));
    }
}
