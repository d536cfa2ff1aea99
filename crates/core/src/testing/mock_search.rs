//! Mock intent parser and ranker for orchestrator tests.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::Candidate;
use crate::search::{
    IntentParser, ParseError, RankedResult, Ranking, RankingDegraded, RankingMethod,
    ResultRanker, StructuredQuery,
};

/// Mock implementation of the IntentParser trait.
///
/// Returns the configured result for every call.
#[derive(Debug, Clone)]
pub struct MockIntentParser {
    result: Arc<RwLock<Result<StructuredQuery, ParseError>>>,
    inputs: Arc<RwLock<Vec<String>>>,
}

impl Default for MockIntentParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIntentParser {
    pub fn new() -> Self {
        Self {
            result: Arc::new(RwLock::new(Err(ParseError::new("", "no result configured")))),
            inputs: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_result(&self, result: Result<StructuredQuery, ParseError>) {
        *self.result.write().await = result;
    }

    /// Texts parsed so far.
    pub async fn recorded_inputs(&self) -> Vec<String> {
        self.inputs.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.inputs.read().await.len()
    }
}

#[async_trait]
impl IntentParser for MockIntentParser {
    fn name(&self) -> &str {
        "mock"
    }

    async fn parse(&self, text: &str) -> Result<StructuredQuery, ParseError> {
        self.inputs.write().await.push(text.to_string());
        self.result.read().await.clone()
    }
}

/// Mock implementation of the ResultRanker trait.
///
/// Keeps catalog order and gives every candidate the same score. Can be
/// told to report a degraded ranking.
#[derive(Debug, Clone, Default)]
pub struct MockResultRanker {
    degraded: Arc<RwLock<Option<String>>>,
    calls: Arc<RwLock<Vec<(Vec<String>, Vec<u64>)>>>,
}

impl MockResultRanker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report subsequent rankings as heuristic fallbacks with this reason.
    pub async fn set_degraded(&self, reason: impl Into<String>) {
        *self.degraded.write().await = Some(reason.into());
    }

    /// Recorded calls as (variant descriptors, candidate ids).
    pub async fn recorded_calls(&self) -> Vec<(Vec<String>, Vec<u64>)> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl ResultRanker for MockResultRanker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn rank(&self, variant_descriptors: &[String], candidates: &[Candidate]) -> Ranking {
        self.calls.write().await.push((
            variant_descriptors.to_vec(),
            candidates.iter().map(|c| c.id).collect(),
        ));

        let degraded = self.degraded.read().await.clone();
        let method = if degraded.is_some() {
            RankingMethod::Heuristic
        } else {
            RankingMethod::Reasoned
        };

        Ranking {
            results: candidates
                .iter()
                .map(|candidate| RankedResult {
                    candidate: candidate.clone(),
                    relevance_score: 0.5,
                    explanation: "mock".to_string(),
                    method,
                })
                .collect(),
            degradation: degraded.map(|reason| RankingDegraded { reason }),
            usage: None,
        }
    }
}
