//! Trait seams of the search pipeline.

use async_trait::async_trait;

use crate::catalog::Candidate;

use super::types::{ParseError, Ranking, StructuredQuery};

/// Turns free text into a structured query.
#[async_trait]
pub trait IntentParser: Send + Sync {
    /// Name of this implementation for logging.
    fn name(&self) -> &str;

    /// Parse a record search. One reasoning service call, no retry.
    async fn parse(&self, text: &str) -> Result<StructuredQuery, ParseError>;
}

/// Scores candidates against a query's variant descriptors.
#[async_trait]
pub trait ResultRanker: Send + Sync {
    /// Name of this implementation for logging.
    fn name(&self) -> &str;

    /// Rank every candidate. Never fails: problems surface as
    /// [`Ranking::degradation`].
    async fn rank(&self, variant_descriptors: &[String], candidates: &[Candidate]) -> Ranking;
}
