//! Search pipeline data types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Candidate, CatalogError, CatalogRequest, ReleaseDetails};
use crate::llm::LlmUsage;

/// Earliest and latest plausible release years.
const YEAR_RANGE: std::ops::RangeInclusive<u16> = 1900..=2100;

/// Structured form of a free-text record search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    /// Artist name; empty when the text named none.
    pub artist: String,
    /// Album title; empty when the text named none.
    pub album: String,
    /// A specific track the user named, searched alongside artist and album.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Attributes the catalog cannot filter on ("red vinyl", "2LP", "50th anniversary").
    #[serde(default)]
    pub variant_descriptors: Vec<String>,
    /// Parser's self-reported certainty in [0, 1].
    pub confidence: f32,
}

impl StructuredQuery {
    /// Whether artist or album is present.
    pub fn has_core_fields(&self) -> bool {
        !self.artist.trim().is_empty() || !self.album.trim().is_empty()
    }

    /// Trim text fields, drop blank and duplicate descriptors, discard an
    /// implausible year and clamp confidence.
    pub fn normalized(mut self) -> Self {
        self.artist = self.artist.trim().to_string();
        self.album = self.album.trim().to_string();
        self.track = non_blank(self.track);
        self.genre = non_blank(self.genre);
        self.label = non_blank(self.label);
        self.catalog_number = non_blank(self.catalog_number);
        self.country = non_blank(self.country);
        self.year = self.year.filter(|y| YEAR_RANGE.contains(y));

        let mut seen: Vec<String> = Vec::new();
        let mut descriptors = Vec::new();
        for descriptor in self.variant_descriptors {
            let descriptor = descriptor.trim().to_string();
            let key = descriptor.to_lowercase();
            if descriptor.is_empty() || seen.contains(&key) {
                continue;
            }
            seen.push(key);
            descriptors.push(descriptor);
        }
        self.variant_descriptors = descriptors;

        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// How a result's score was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMethod {
    /// Scored by the reasoning service.
    Reasoned,
    /// Scored by the token-overlap fallback.
    Heuristic,
    /// Beyond the ranking cap; carries the sentinel score.
    Unscored,
}

/// A candidate with its relevance to the variant descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub candidate: Candidate,
    /// Relevance in [0, 1].
    pub relevance_score: f32,
    /// Why it scored this way; empty for unscored overflow.
    pub explanation: String,
    pub method: RankingMethod,
}

/// Why a ranking fell back to the heuristic scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingDegraded {
    pub reason: String,
}

impl std::fmt::Display for RankingDegraded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ranking degraded: {}", self.reason)
    }
}

/// Output of a ranker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    /// Sorted by score, highest first; ties keep catalog order.
    pub results: Vec<RankedResult>,
    pub degradation: Option<RankingDegraded>,
    pub usage: Option<LlmUsage>,
}

impl Ranking {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Why a search produced no results without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// The input text was blank.
    BlankInput,
    /// The parse yielded neither artist nor album.
    NothingToSearch,
    /// The catalog returned no candidates.
    NoCandidates,
}

/// Result of one search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub search_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<StructuredQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<CatalogRequest>,
    pub results: Vec<RankedResult>,
    /// The parse was below the confidence threshold.
    pub low_confidence: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking_degraded: Option<RankingDegraded>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_reason: Option<EmptyReason>,
    /// Reasoning service calls made (at most two).
    pub llm_calls: u32,
    pub duration_ms: u64,
    /// Full records for the top results, filled by `search_with_details`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ReleaseDetails>,
}

impl SearchOutcome {
    /// Whether either quality signal is raised.
    pub fn is_degraded(&self) -> bool {
        self.low_confidence || self.ranking_degraded.is_some()
    }

    pub fn best(&self) -> Option<&RankedResult> {
        self.results.first()
    }
}

/// Dry run of a search: what would be sent to the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPreview {
    pub query: StructuredQuery,
    pub request: CatalogRequest,
    pub searchable: bool,
    /// The ranking step would have descriptors to score against.
    pub will_rank_variants: bool,
    pub low_confidence: bool,
}

/// Result of checking one external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckResult {
    Ok,
    Failed { reason: String },
}

impl CheckResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CheckResult::Ok)
    }
}

/// Reachability and credential state of both external services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceCheck {
    pub catalog: CheckResult,
    pub reasoning: CheckResult,
}

impl ServiceCheck {
    pub fn all_ok(&self) -> bool {
        self.catalog.is_ok() && self.reasoning.is_ok()
    }
}

/// Failure to turn text into a structured query.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Failed to parse {input:?}: {reason}")]
pub struct ParseError {
    /// The raw text that was being parsed.
    pub input: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that end a search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(#[from] CatalogError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_cleans_fields() {
        let query = StructuredQuery {
            artist: "  Pink Floyd ".to_string(),
            album: "The Dark Side of the Moon".to_string(),
            track: Some(" Money ".to_string()),
            year: Some(1850),
            genre: Some("".to_string()),
            label: Some("   ".to_string()),
            catalog_number: Some(" SHVL 804 ".to_string()),
            country: None,
            variant_descriptors: vec![
                "red vinyl".to_string(),
                " ".to_string(),
                "Red Vinyl".to_string(),
                "50th anniversary".to_string(),
            ],
            confidence: 1.7,
        }
        .normalized();

        assert_eq!(query.artist, "Pink Floyd");
        assert_eq!(query.track.as_deref(), Some("Money"));
        assert_eq!(query.genre, None);
        assert_eq!(query.year, None);
        assert_eq!(query.label, None);
        assert_eq!(query.catalog_number.as_deref(), Some("SHVL 804"));
        assert_eq!(query.variant_descriptors, vec!["red vinyl", "50th anniversary"]);
        assert_eq!(query.confidence, 1.0);
    }

    #[test]
    fn test_normalized_keeps_plausible_year_and_zeroes_nan() {
        let query = StructuredQuery {
            year: Some(1973),
            confidence: f32::NAN,
            ..Default::default()
        }
        .normalized();
        assert_eq!(query.year, Some(1973));
        assert_eq!(query.confidence, 0.0);
        assert!(!query.has_core_fields());
    }

    #[test]
    fn test_has_core_fields() {
        let mut query = StructuredQuery::default();
        assert!(!query.has_core_fields());
        query.album = "Blue".to_string();
        assert!(query.has_core_fields());
    }

    #[test]
    fn test_parse_error_message_carries_input() {
        let err = ParseError::new("pnik floid", "no JSON in reply");
        assert_eq!(err.to_string(), "Failed to parse \"pnik floid\": no JSON in reply");
    }
}
