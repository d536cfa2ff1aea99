//! Natural-language record search.
//!
//! A search runs parse → build → catalog → rank:
//! - [`IntentParser`] turns free text into a [`StructuredQuery`]
//! - [`QueryBuilder`] keeps the catalog-searchable fields
//! - the catalog returns candidate releases
//! - [`ResultRanker`] scores them against the variant descriptors
//!
//! [`SearchOrchestrator`] owns the call budget and failure policy.

mod heuristic;
mod llm_parser;
mod llm_ranker;
mod orchestrator;
mod query_builder;
mod traits;
mod types;

pub use heuristic::{HeuristicScore, HeuristicScorer, NEUTRAL_SCORE};
pub use llm_parser::{LlmIntentParser, LlmParserConfig};
pub use llm_ranker::{LlmRankerConfig, LlmResultRanker, UNSCORED_SENTINEL};
pub use orchestrator::SearchOrchestrator;
pub use query_builder::QueryBuilder;
pub use traits::{IntentParser, ResultRanker};
pub use types::{
    CheckResult, EmptyReason, ParseError, RankedResult, Ranking, RankingDegraded, RankingMethod,
    SearchError, SearchOutcome, SearchPreview, ServiceCheck, StructuredQuery,
};

use std::time::Duration;

use crate::llm::LlmUsage;
use crate::metrics;

/// Record metrics for one reasoning service call.
pub(crate) fn observe_llm_call(
    operation: &str,
    provider: &str,
    result: &str,
    elapsed: Duration,
    usage: Option<&LlmUsage>,
) {
    metrics::LLM_CALLS
        .with_label_values(&[operation, result])
        .inc();
    metrics::LLM_CALL_DURATION
        .with_label_values(&[operation])
        .observe(elapsed.as_secs_f64());
    if let Some(usage) = usage {
        metrics::LLM_TOKENS
            .with_label_values(&[provider, "input"])
            .inc_by(usage.input_tokens as u64);
        metrics::LLM_TOKENS
            .with_label_values(&[provider, "output"])
            .inc_by(usage.output_tokens as u64);
    }
}
