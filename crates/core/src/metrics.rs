//! Prometheus metrics for the search pipeline.
//!
//! This module provides metrics for:
//! - Searches (outcomes, duration, candidate counts)
//! - Reasoning service calls (parse and rank, fallbacks)
//! - Catalog requests and rate limiter waits
//!
//! Collectors live in process-wide statics. An embedding host registers them
//! on its own registry with [`register_all`]; [`encode`] renders a registry
//! in the Prometheus text format.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

// =============================================================================
// Search Metrics
// =============================================================================

/// Searches total by outcome.
pub static SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cxz_searches_total", "Total searches"),
        &["outcome"], // "ranked", "degraded", "empty", "parse_error", "catalog_error"
    )
    .unwrap()
});

/// End-to-end search duration in seconds.
pub static SEARCH_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("cxz_search_duration_seconds", "Duration of searches")
            .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
    )
    .unwrap()
});

/// Candidates returned by the catalog per search.
pub static CANDIDATES_PER_SEARCH: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "cxz_candidates_per_search",
            "Number of catalog candidates per search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 20.0, 50.0, 100.0]),
    )
    .unwrap()
});

// =============================================================================
// Reasoning Service Metrics
// =============================================================================

/// Reasoning service calls by operation and result.
pub static LLM_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cxz_llm_calls_total", "Total reasoning service calls"),
        &["operation", "result"], // operation: "parse", "rank"; result: "success", "error", "invalid"
    )
    .unwrap()
});

/// Reasoning service call duration in seconds.
pub static LLM_CALL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "cxz_llm_call_duration_seconds",
            "Duration of reasoning service calls",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .unwrap()
});

/// LLM tokens used.
pub static LLM_TOKENS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cxz_llm_tokens_total", "Total LLM tokens used"),
        &["provider", "direction"], // direction: "input", "output"
    )
    .unwrap()
});

/// Rankings that fell back to the heuristic scorer.
pub static RANKING_DEGRADATIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "cxz_ranking_degradations_total",
        "Total rankings scored by the heuristic fallback",
    )
    .unwrap()
});

// =============================================================================
// Catalog Metrics
// =============================================================================

/// Catalog requests by status.
pub static CATALOG_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cxz_catalog_requests_total", "Total catalog requests"),
        &["status"], // "ok", "not_found", "unauthorized", "rate_limited", "throttled", "error"
    )
    .unwrap()
});

/// Time spent waiting for rate limiter admission.
pub static RATE_LIMIT_WAIT: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "cxz_rate_limit_wait_seconds",
            "Time spent waiting for catalog rate limiter admission",
        )
        .buckets(vec![0.0, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0]),
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Searches
        Box::new(SEARCHES.clone()),
        Box::new(SEARCH_DURATION.clone()),
        Box::new(CANDIDATES_PER_SEARCH.clone()),
        // Reasoning service
        Box::new(LLM_CALLS.clone()),
        Box::new(LLM_CALL_DURATION.clone()),
        Box::new(LLM_TOKENS.clone()),
        Box::new(RANKING_DEGRADATIONS.clone()),
        // Catalog
        Box::new(CATALOG_REQUESTS.clone()),
        Box::new(RATE_LIMIT_WAIT.clone()),
    ]
}

/// Register every core metric on `registry`.
pub fn register_all(registry: &Registry) -> prometheus::Result<()> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}

/// Render everything gathered from `registry` in the text exposition format.
pub fn encode(registry: &Registry) -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Snapshot of the core metrics on a fresh registry.
pub fn render() -> prometheus::Result<String> {
    let registry = Registry::new();
    register_all(&registry)?;
    encode(&registry)
}
