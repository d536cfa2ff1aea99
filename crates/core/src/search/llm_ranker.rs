//! Reasoning-service backed result ranker with heuristic fallback.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::catalog::Candidate;
use crate::llm::{extract_json_object, ApiKey, CompletionRequest, LlmClient};
use crate::metrics;

use super::heuristic::HeuristicScorer;
use super::observe_llm_call;
use super::traits::ResultRanker;
use super::types::{RankedResult, Ranking, RankingDegraded, RankingMethod};

/// Score given to candidates beyond the ranking cap.
pub const UNSCORED_SENTINEL: f32 = 0.0;

/// Configuration for the LLM ranker.
#[derive(Debug, Clone)]
pub struct LlmRankerConfig {
    /// Maximum candidates to send to the LLM in the single ranking call.
    pub max_candidates: usize,
    /// Maximum tokens for the LLM response.
    pub max_tokens: u32,
    /// Temperature for generation.
    pub temperature: f32,
}

impl Default for LlmRankerConfig {
    fn default() -> Self {
        Self {
            max_candidates: 20,
            max_tokens: 2048,
            temperature: 0.0, // Deterministic scoring
        }
    }
}

const SYSTEM_PROMPT: &str = r#"You are a vinyl record expert. A collector is looking for a specific pressing of an album. You get the variant descriptors they asked for and a list of catalog releases of that album. Score how well each release matches the descriptors.

SCORING GUIDELINES (0.0 to 1.0):
- 0.9-1.0: The release clearly has every requested attribute
- 0.7-0.89: Most attributes match, or a match is very likely from the format notes
- 0.4-0.69: Some attributes match, others are unknown
- 0.1-0.39: Right album, but the release contradicts the request (wrong color, wrong edition)
- 0.0-0.09: Not the requested album at all

Colors and editions usually appear in the format descriptions or free-text notes ("Red Translucent", "Limited Edition", "Reissue"). A release with no such notes is most likely a standard black pressing.

Respond with JSON only, one entry per release, using the release id exactly as given:
{
  "scores": [
    {"id": 249504, "score": 0.95, "explanation": "Red translucent vinyl as requested"},
    {"id": 367084, "score": 0.20, "explanation": "Standard black pressing"}
  ]
}"#;

/// Ranker that scores candidates in one batched reasoning call.
///
/// Generic over the LLM client type; `Arc<dyn LlmClient>` works too.
/// Falls back to [`HeuristicScorer`] when the call or its reply fails.
pub struct LlmResultRanker<C: LlmClient + ?Sized> {
    client: Arc<C>,
    config: LlmRankerConfig,
    credential: Option<ApiKey>,
    heuristic: HeuristicScorer,
}

impl<C: LlmClient + ?Sized> LlmResultRanker<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            config: LlmRankerConfig::default(),
            credential: None,
            heuristic: HeuristicScorer::new(),
        }
    }

    pub fn with_config(mut self, config: LlmRankerConfig) -> Self {
        self.config = config;
        self
    }

    /// Credential attached to every call.
    pub fn with_credential(mut self, credential: Option<ApiKey>) -> Self {
        self.credential = credential;
        self
    }

    /// Build the user prompt with descriptors and candidates.
    fn build_user_prompt(variant_descriptors: &[String], candidates: &[Candidate]) -> String {
        let mut prompt = String::new();

        prompt.push_str("LOOKING FOR:\n");
        if variant_descriptors.is_empty() {
            prompt.push_str("No specific variant; prefer standard original pressings.\n");
        } else {
            prompt.push_str(&format!(
                "Variant descriptors: {}\n",
                variant_descriptors.join(", ")
            ));
        }

        prompt.push_str("\nRELEASES TO SCORE:\n");
        for candidate in candidates {
            prompt.push_str(&format!("\n[id {}] {}\n", candidate.id, candidate.title));
            if !candidate.formats.is_empty() {
                prompt.push_str(&format!("    Formats: {}\n", candidate.formats.join(", ")));
            }

            let mut details = Vec::new();
            if let Some(year) = candidate.year() {
                details.push(format!("Year: {}", year));
            }
            if let Some(country) = candidate.country() {
                details.push(format!("Country: {}", country));
            }
            if let Some(label) = candidate.labels().first() {
                details.push(format!("Label: {}", label));
            }
            if let Some(catno) = candidate.catalog_number() {
                details.push(format!("Cat#: {}", catno));
            }
            if !details.is_empty() {
                prompt.push_str(&format!("    {}\n", details.join(", ")));
            }
        }

        prompt.push_str("\nScore each release from 0.0 to 1.0.");
        prompt
    }

    /// Parse the reply into `id -> (score, explanation)`.
    ///
    /// Unknown ids are dropped, the first entry for an id wins and
    /// non-finite scores count as missing.
    fn parse_scores(
        text: &str,
        candidates: &[Candidate],
    ) -> Result<HashMap<u64, (f32, String)>, String> {
        let json_str = extract_json_object(text);
        let parsed: LlmScoreResponse = serde_json::from_str(json_str)
            .map_err(|e| format!("invalid JSON in reply: {}", e))?;

        let mut scores = HashMap::new();
        for entry in parsed.scores {
            let item: LlmScoreItem = match serde_json::from_value(entry) {
                Ok(item) => item,
                Err(e) => {
                    debug!(error = %e, "Ignoring malformed score entry");
                    continue;
                }
            };
            let Some(id) = item.id.as_u64() else {
                continue;
            };
            if !candidates.iter().any(|c| c.id == id) {
                debug!(id, "Ignoring score for unknown release id");
                continue;
            }
            let Some(score) = item.score.filter(|s| s.is_finite()) else {
                continue;
            };
            scores
                .entry(id)
                .or_insert((score.clamp(0.0, 1.0) as f32, item.explanation.unwrap_or_default()));
        }

        if scores.is_empty() {
            return Err("reply scored none of the releases".to_string());
        }
        Ok(scores)
    }

    fn heuristic_result(&self, variant_descriptors: &[String], candidate: &Candidate) -> RankedResult {
        let scored = self.heuristic.score(variant_descriptors, candidate);
        RankedResult {
            candidate: candidate.clone(),
            relevance_score: scored.score,
            explanation: format!("[heuristic] {}", scored.explanation()),
            method: RankingMethod::Heuristic,
        }
    }

    /// Score every candidate heuristically after a failed call.
    fn fallback(&self, variant_descriptors: &[String], candidates: &[Candidate], reason: String) -> Ranking {
        warn!(reason = %reason, candidates = candidates.len(), "Ranking fell back to heuristic scoring");
        metrics::RANKING_DEGRADATIONS.inc();

        let mut results: Vec<RankedResult> = candidates
            .iter()
            .map(|c| self.heuristic_result(variant_descriptors, c))
            .collect();
        sort_by_score(&mut results);

        Ranking {
            results,
            degradation: Some(RankingDegraded { reason }),
            usage: None,
        }
    }
}

/// Stable sort, highest score first.
fn sort_by_score(results: &mut [RankedResult]) {
    results.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Expected JSON response from the LLM for scoring.
#[derive(Debug, Deserialize)]
struct LlmScoreResponse {
    #[serde(default)]
    scores: Vec<Value>,
}

/// Individual score item from LLM.
#[derive(Debug, Deserialize)]
struct LlmScoreItem {
    id: ScoreId,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    explanation: Option<String>,
}

/// Release ids come back as numbers or as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScoreId {
    Number(u64),
    Text(String),
}

impl ScoreId {
    fn as_u64(&self) -> Option<u64> {
        match self {
            ScoreId::Number(n) => Some(*n),
            ScoreId::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[async_trait]
impl<C: LlmClient + ?Sized + 'static> ResultRanker for LlmResultRanker<C> {
    fn name(&self) -> &str {
        "llm"
    }

    async fn rank(&self, variant_descriptors: &[String], candidates: &[Candidate]) -> Ranking {
        if candidates.is_empty() {
            return Ranking::empty();
        }

        let cap = self.config.max_candidates.min(candidates.len());
        let (to_score, overflow) = candidates.split_at(cap);

        let request = CompletionRequest::new(Self::build_user_prompt(variant_descriptors, to_score))
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_json_output()
            .with_credential(self.credential.clone());

        let start = Instant::now();
        let response = match self.client.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                observe_llm_call("rank", self.client.provider(), "error", start.elapsed(), None);
                return self.fallback(variant_descriptors, candidates, e.to_string());
            }
        };

        let scores = match Self::parse_scores(&response.text, to_score) {
            Ok(scores) => scores,
            Err(reason) => {
                observe_llm_call(
                    "rank",
                    self.client.provider(),
                    "invalid",
                    start.elapsed(),
                    Some(&response.usage),
                );
                return self.fallback(variant_descriptors, candidates, reason);
            }
        };
        observe_llm_call(
            "rank",
            self.client.provider(),
            "success",
            start.elapsed(),
            Some(&response.usage),
        );

        let mut results: Vec<RankedResult> = to_score
            .iter()
            .map(|candidate| match scores.get(&candidate.id) {
                Some((score, explanation)) => RankedResult {
                    candidate: candidate.clone(),
                    relevance_score: *score,
                    explanation: explanation.clone(),
                    method: RankingMethod::Reasoned,
                },
                None => self.heuristic_result(variant_descriptors, candidate),
            })
            .collect();

        results.extend(overflow.iter().map(|candidate| RankedResult {
            candidate: candidate.clone(),
            relevance_score: UNSCORED_SENTINEL,
            explanation: String::new(),
            method: RankingMethod::Unscored,
        }));

        sort_by_score(&mut results);

        debug!(
            scored = scores.len(),
            omitted = to_score.len() - scores.len(),
            overflow = overflow.len(),
            "Ranked candidates"
        );

        Ranking {
            results,
            degradation: None,
            usage: Some(response.usage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::testing::{fixtures, MockLlmClient};

    fn ranker(client: Arc<MockLlmClient>) -> LlmResultRanker<MockLlmClient> {
        LlmResultRanker::new(client)
    }

    fn red_request() -> Vec<String> {
        vec!["red vinyl".to_string()]
    }

    #[tokio::test]
    async fn test_scores_reassociated_by_id() {
        let candidates = vec![
            fixtures::candidate(10, "Pink Floyd - The Dark Side Of The Moon", &["Vinyl", "LP"]),
            fixtures::candidate(20, "Pink Floyd - The Dark Side Of The Moon", &["Vinyl", "LP", "Red"]),
        ];
        // Reply lists ids out of order, one as a string
        let client = Arc::new(MockLlmClient::with_responses(vec![Ok(r#"{"scores": [
            {"id": "20", "score": 0.95, "explanation": "Red pressing"},
            {"id": 10, "score": 0.2, "explanation": "Black"}
        ]}"#
            .to_string())]));

        let ranking = ranker(client).rank(&red_request(), &candidates).await;

        assert!(ranking.degradation.is_none());
        assert_eq!(ranking.results[0].candidate.id, 20);
        assert_eq!(ranking.results[0].relevance_score, 0.95);
        assert_eq!(ranking.results[0].explanation, "Red pressing");
        assert_eq!(ranking.results[0].method, RankingMethod::Reasoned);
        assert_eq!(ranking.results[1].candidate.id, 10);
        assert!(ranking.usage.is_some());
    }

    #[tokio::test]
    async fn test_unknown_duplicate_and_bad_scores() {
        let candidates = vec![
            fixtures::candidate(1, "A", &["Vinyl"]),
            fixtures::candidate(2, "B", &["Vinyl", "Red"]),
            fixtures::candidate(3, "C", &["Vinyl"]),
        ];
        let client = Arc::new(MockLlmClient::with_responses(vec![Ok(r#"{"scores": [
            {"id": 99, "score": 1.0, "explanation": "hallucinated"},
            {"id": 1, "score": 1.7, "explanation": "first"},
            {"id": 1, "score": 0.1, "explanation": "second"},
            {"id": 3, "score": "high"},
            {"id": 2, "score": null}
        ]}"#
            .to_string())]));

        let ranking = ranker(client).rank(&red_request(), &candidates).await;

        assert_eq!(ranking.results.len(), 3);
        let first = ranking.results.iter().find(|r| r.candidate.id == 1).unwrap();
        assert_eq!(first.relevance_score, 1.0);
        assert_eq!(first.explanation, "first");

        // Omitted (null score) and malformed entries are scored heuristically
        let second = ranking.results.iter().find(|r| r.candidate.id == 2).unwrap();
        assert_eq!(second.method, RankingMethod::Heuristic);
        assert!(second.explanation.starts_with("[heuristic]"));
        let third = ranking.results.iter().find(|r| r.candidate.id == 3).unwrap();
        assert_eq!(third.method, RankingMethod::Heuristic);
        assert!(ranking.degradation.is_none());
    }

    #[tokio::test]
    async fn test_overflow_gets_sentinel_and_one_call() {
        let candidates: Vec<Candidate> = (1..=25)
            .map(|id| fixtures::candidate(id, &format!("Release {}", id), &["Vinyl"]))
            .collect();
        let reply = fixtures::score_reply(
            &(1..=20).map(|id| (id, 0.5, "ok")).collect::<Vec<_>>(),
        );
        let client = Arc::new(MockLlmClient::with_responses(vec![Ok(reply)]));

        let ranking = ranker(Arc::clone(&client)).rank(&red_request(), &candidates).await;

        assert_eq!(client.call_count().await, 1);
        let prompt = &client.recorded_requests().await[0].prompt;
        assert!(prompt.contains("[id 20]"));
        assert!(!prompt.contains("[id 21]"));

        assert_eq!(ranking.results.len(), 25);
        let tail: Vec<u64> = ranking.results[20..].iter().map(|r| r.candidate.id).collect();
        assert_eq!(tail, vec![21, 22, 23, 24, 25]);
        for result in &ranking.results[20..] {
            assert_eq!(result.relevance_score, UNSCORED_SENTINEL);
            assert_eq!(result.method, RankingMethod::Unscored);
            assert!(result.explanation.is_empty());
        }
    }

    #[tokio::test]
    async fn test_ties_keep_catalog_order() {
        let candidates: Vec<Candidate> = [5, 3, 9, 1]
            .into_iter()
            .map(|id| fixtures::candidate(id, "Same", &["Vinyl"]))
            .collect();
        let reply = fixtures::score_reply(&[(5, 0.5, ""), (3, 0.9, ""), (9, 0.5, ""), (1, 0.5, "")]);
        let client = Arc::new(MockLlmClient::with_responses(vec![Ok(reply)]));

        let ranking = ranker(client).rank(&red_request(), &candidates).await;
        let ids: Vec<u64> = ranking.results.iter().map(|r| r.candidate.id).collect();
        assert_eq!(ids, vec![3, 5, 9, 1]);
    }

    #[tokio::test]
    async fn test_call_failure_falls_back_for_every_candidate() {
        let candidates: Vec<Candidate> = (1..=22)
            .map(|id| {
                let formats: &[&str] = if id == 7 { &["Vinyl", "Red"] } else { &["Vinyl"] };
                fixtures::candidate(id, "Pink Floyd - Animals", formats)
            })
            .collect();
        let client = Arc::new(MockLlmClient::with_responses(vec![Err(LlmError::Timeout(
            std::time::Duration::from_secs(30),
        ))]));

        let ranking = ranker(client).rank(&red_request(), &candidates).await;

        assert_eq!(ranking.results.len(), 22);
        assert!(ranking.results.iter().all(|r| r.method == RankingMethod::Heuristic));
        assert!(ranking.results.iter().all(|r| r.explanation.starts_with("[heuristic]")));
        assert_eq!(ranking.results[0].candidate.id, 7);
        let degradation = ranking.degradation.unwrap();
        assert!(degradation.reason.contains("Timeout"));
    }

    #[tokio::test]
    async fn test_reply_without_known_ids_falls_back() {
        let candidates = vec![fixtures::candidate(1, "A", &["Vinyl"])];
        let client = Arc::new(MockLlmClient::with_responses(vec![Ok(
            r#"{"scores": []}"#.to_string(),
        )]));

        let ranking = ranker(client).rank(&red_request(), &candidates).await;
        assert!(ranking.degradation.is_some());
        assert_eq!(ranking.results.len(), 1);
    }

    #[tokio::test]
    async fn test_no_candidates_no_call() {
        let client = Arc::new(MockLlmClient::new());
        let ranking = ranker(Arc::clone(&client)).rank(&red_request(), &[]).await;
        assert!(ranking.results.is_empty());
        assert_eq!(client.call_count().await, 0);
    }
}
