//! End-to-end search: parse, build, catalog search, rank.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::catalog::{Candidate, CatalogClient, CatalogRequest, ReleaseDetails};
use crate::config::SearchConfig;
use crate::metrics;

use super::query_builder::QueryBuilder;
use super::traits::{IntentParser, ResultRanker};
use super::types::{
    CheckResult, EmptyReason, SearchError, SearchOutcome, SearchPreview, ServiceCheck,
    StructuredQuery,
};

/// Text parsed by the service check.
const SERVICE_CHECK_TEXT: &str = "Pink Floyd test";

/// Composes parser, catalog and ranker into a search.
///
/// A search makes at most two reasoning service calls: one parse and one
/// batched ranking. Only parse failures and catalog failures end a search
/// with an error; low confidence and heuristic rankings are flagged on the
/// outcome.
pub struct SearchOrchestrator {
    config: SearchConfig,
    builder: QueryBuilder,
    parser: Arc<dyn IntentParser>,
    catalog: Arc<dyn CatalogClient>,
    ranker: Arc<dyn ResultRanker>,
}

impl SearchOrchestrator {
    pub fn new(
        config: SearchConfig,
        builder: QueryBuilder,
        parser: Arc<dyn IntentParser>,
        catalog: Arc<dyn CatalogClient>,
        ranker: Arc<dyn ResultRanker>,
    ) -> Self {
        Self {
            config,
            builder,
            parser,
            catalog,
            ranker,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run a search for free-text `text`.
    pub async fn search(&self, text: &str) -> Result<SearchOutcome, SearchError> {
        let search_id = Uuid::new_v4();
        let span = info_span!("search", search_id = %search_id);
        let start = Instant::now();

        let result = self.run(search_id, text, start).instrument(span).await;

        metrics::SEARCH_DURATION.observe(start.elapsed().as_secs_f64());
        let label = match &result {
            Ok(outcome) if outcome.empty_reason.is_some() => "empty",
            Ok(outcome) if outcome.ranking_degraded.is_some() => "degraded",
            Ok(_) => "ranked",
            Err(SearchError::Parse(_)) => "parse_error",
            Err(SearchError::CatalogUnavailable(_)) => "catalog_error",
        };
        metrics::SEARCHES.with_label_values(&[label]).inc();

        result
    }

    async fn run(
        &self,
        search_id: Uuid,
        text: &str,
        start: Instant,
    ) -> Result<SearchOutcome, SearchError> {
        let mut outcome = SearchOutcome {
            search_id,
            query: None,
            request: None,
            results: Vec::new(),
            low_confidence: false,
            ranking_degraded: None,
            empty_reason: None,
            llm_calls: 0,
            duration_ms: 0,
            details: Vec::new(),
        };

        if text.trim().is_empty() {
            debug!("Blank search text, nothing to do");
            outcome.low_confidence = true;
            outcome.empty_reason = Some(EmptyReason::BlankInput);
            return Ok(finish(outcome, start));
        }

        info!(text = %text.trim(), parser = self.parser.name(), "Starting search");

        outcome.llm_calls += 1;
        let query = self.parser.parse(text).await?;
        outcome.low_confidence = self.is_low_confidence(&query);
        if outcome.low_confidence {
            warn!(
                confidence = query.confidence,
                threshold = self.config.confidence_threshold,
                "Low-confidence parse, results may be unreliable"
            );
        }

        let request = self.builder.build(&query);
        let descriptors = query.variant_descriptors.clone();
        outcome.query = Some(query);

        if !request.is_searchable() {
            info!("Parse found no artist or album, skipping catalog search");
            outcome.request = Some(request);
            outcome.empty_reason = Some(EmptyReason::NothingToSearch);
            return Ok(finish(outcome, start));
        }

        let (request, candidates) = self.search_catalog(request).await?;
        outcome.request = Some(request);
        metrics::CANDIDATES_PER_SEARCH.observe(candidates.len() as f64);

        if candidates.is_empty() {
            info!("Catalog returned no candidates");
            outcome.empty_reason = Some(EmptyReason::NoCandidates);
            return Ok(finish(outcome, start));
        }

        outcome.llm_calls += 1;
        let ranking = self.ranker.rank(&descriptors, &candidates).await;
        outcome.results = ranking.results;
        outcome.ranking_degraded = ranking.degradation;

        info!(
            candidates = candidates.len(),
            top_score = ?outcome.best().map(|r| r.relevance_score),
            degraded = outcome.ranking_degraded.is_some(),
            "Search complete"
        );

        Ok(finish(outcome, start))
    }

    /// Search the catalog, broadening once if a filtered search found nothing.
    async fn search_catalog(
        &self,
        request: CatalogRequest,
    ) -> Result<(CatalogRequest, Vec<Candidate>), SearchError> {
        let candidates = self.catalog.search(&request).await.map_err(|e| {
            warn!(catalog = self.catalog.name(), error = %e, "Catalog search failed");
            SearchError::CatalogUnavailable(e)
        })?;

        if !candidates.is_empty() || !self.config.broaden_on_empty {
            return Ok((request, candidates));
        }

        let Some(broadened) = request.broadened() else {
            return Ok((request, candidates));
        };

        info!(dropped_filters = request.filters.len(), "No results, retrying without filters");
        let candidates = self.catalog.search(&broadened).await.map_err(|e| {
            warn!(catalog = self.catalog.name(), error = %e, "Broadened catalog search failed");
            SearchError::CatalogUnavailable(e)
        })?;

        Ok((broadened, candidates))
    }

    /// Parse and build only: what a search would send to the catalog.
    pub async fn preview(&self, text: &str) -> Result<SearchPreview, SearchError> {
        let query = if text.trim().is_empty() {
            StructuredQuery::default()
        } else {
            self.parser.parse(text).await?
        };

        let request = self.builder.build(&query);
        Ok(SearchPreview {
            searchable: request.is_searchable(),
            will_rank_variants: !query.variant_descriptors.is_empty(),
            low_confidence: self.is_low_confidence(&query),
            query,
            request,
        })
    }

    /// Search, then fetch full records for the top `max_details` results.
    ///
    /// Details are fetched one at a time through the same catalog limiter.
    /// A failed or missing record is skipped; it never fails the search.
    pub async fn search_with_details(
        &self,
        text: &str,
        max_details: usize,
    ) -> Result<SearchOutcome, SearchError> {
        let start = Instant::now();
        let mut outcome = self.search(text).await?;
        if max_details == 0 || outcome.results.is_empty() {
            return Ok(outcome);
        }

        let span = info_span!("release_details", search_id = %outcome.search_id);
        let ids: Vec<u64> = outcome
            .results
            .iter()
            .take(max_details)
            .map(|r| r.candidate.id)
            .collect();
        outcome.details = self.fetch_details(&ids).instrument(span).await;
        outcome.duration_ms = start.elapsed().as_millis() as u64;

        Ok(outcome)
    }

    async fn fetch_details(&self, ids: &[u64]) -> Vec<ReleaseDetails> {
        let mut details = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.catalog.release_details(id).await {
                Ok(Some(release)) => details.push(release),
                Ok(None) => debug!(release_id = id, "Release not found, skipping details"),
                Err(e) => {
                    warn!(release_id = id, error = %e, "Failed to fetch release details");
                }
            }
        }
        debug!(requested = ids.len(), fetched = details.len(), "Release details fetched");
        details
    }

    /// Check that both external services accept our credentials.
    ///
    /// The reasoning check is a real parse of a known record, so it costs
    /// one reasoning call.
    pub async fn check_services(&self) -> ServiceCheck {
        let catalog = match self.catalog.check_credentials().await {
            Ok(()) => CheckResult::Ok,
            Err(e) => {
                warn!(catalog = self.catalog.name(), error = %e, "Catalog check failed");
                CheckResult::Failed {
                    reason: e.to_string(),
                }
            }
        };

        let reasoning = match self.parser.parse(SERVICE_CHECK_TEXT).await {
            Ok(_) => CheckResult::Ok,
            Err(e) => {
                warn!(parser = self.parser.name(), error = %e, "Reasoning check failed");
                CheckResult::Failed { reason: e.reason }
            }
        };

        info!(
            catalog_ok = catalog.is_ok(),
            reasoning_ok = reasoning.is_ok(),
            "Service check complete"
        );
        ServiceCheck { catalog, reasoning }
    }

    fn is_low_confidence(&self, query: &StructuredQuery) -> bool {
        query.confidence < self.config.confidence_threshold
    }
}

fn finish(mut outcome: SearchOutcome, start: Instant) -> SearchOutcome {
    outcome.duration_ms = start.elapsed().as_millis() as u64;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogError;
    use crate::search::types::ParseError;
    use crate::testing::{fixtures, MockCatalogClient, MockIntentParser, MockResultRanker};

    struct Harness {
        parser: Arc<MockIntentParser>,
        catalog: Arc<MockCatalogClient>,
        ranker: Arc<MockResultRanker>,
        orchestrator: SearchOrchestrator,
    }

    fn harness(config: SearchConfig) -> Harness {
        let parser = Arc::new(MockIntentParser::new());
        let catalog = Arc::new(MockCatalogClient::new());
        let ranker = Arc::new(MockResultRanker::new());
        let builder = QueryBuilder::new(config.format_filter.clone(), 50);
        let orchestrator = SearchOrchestrator::new(
            config,
            builder,
            parser.clone(),
            catalog.clone(),
            ranker.clone(),
        );
        Harness {
            parser,
            catalog,
            ranker,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn test_blank_input_makes_no_calls() {
        let h = harness(SearchConfig::default());

        let outcome = h.orchestrator.search("   ").await.unwrap();

        assert_eq!(outcome.empty_reason, Some(EmptyReason::BlankInput));
        assert!(outcome.low_confidence);
        assert_eq!(outcome.llm_calls, 0);
        assert_eq!(h.parser.call_count().await, 0);
        assert_eq!(h.catalog.search_count().await, 0);
        assert_eq!(h.ranker.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_nothing_to_search_skips_catalog() {
        let h = harness(SearchConfig::default());
        h.parser
            .set_result(Ok(fixtures::query("", "", &["red vinyl"], 0.2)))
            .await;

        let outcome = h.orchestrator.search("red vinyl please").await.unwrap();

        assert_eq!(outcome.empty_reason, Some(EmptyReason::NothingToSearch));
        assert!(outcome.low_confidence);
        assert_eq!(outcome.llm_calls, 1);
        assert_eq!(h.catalog.search_count().await, 0);
        assert_eq!(h.ranker.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_parse_error_propagates() {
        let h = harness(SearchConfig::default());
        h.parser
            .set_result(Err(ParseError::new("??", "service down")))
            .await;

        let err = h.orchestrator.search("??").await.unwrap_err();
        assert!(matches!(err, SearchError::Parse(e) if e.input == "??"));
        assert_eq!(h.catalog.search_count().await, 0);
    }

    #[tokio::test]
    async fn test_broadens_once_when_filtered_search_is_empty() {
        let h = harness(SearchConfig::default());
        h.parser
            .set_result(Ok(fixtures::query("Can", "Tago Mago", &[], 0.9)))
            .await;
        h.catalog.push_response(Ok(vec![])).await;
        h.catalog
            .push_response(Ok(vec![fixtures::candidate(1, "Can - Tago Mago", &["Vinyl"])]))
            .await;

        let outcome = h.orchestrator.search("can tago mago").await.unwrap();

        let requests = h.catalog.recorded_requests().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].filter("format"), Some("Vinyl"));
        assert!(requests[1].filters.is_empty());
        assert_eq!(outcome.request.unwrap().filters.len(), 0);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.llm_calls, 2);
    }

    #[tokio::test]
    async fn test_no_broadening_when_disabled() {
        let config = SearchConfig {
            broaden_on_empty: false,
            ..SearchConfig::default()
        };
        let h = harness(config);
        h.parser
            .set_result(Ok(fixtures::query("Can", "Tago Mago", &[], 0.9)))
            .await;

        let outcome = h.orchestrator.search("can tago mago").await.unwrap();

        assert_eq!(outcome.empty_reason, Some(EmptyReason::NoCandidates));
        assert_eq!(h.catalog.search_count().await, 1);
        assert_eq!(h.ranker.call_count().await, 0);
        assert_eq!(outcome.llm_calls, 1);
    }

    #[tokio::test]
    async fn test_degraded_ranking_is_flagged() {
        let h = harness(SearchConfig::default());
        h.parser
            .set_result(Ok(fixtures::query("Björk", "Homogenic", &["clear vinyl"], 0.95)))
            .await;
        h.catalog
            .set_results(vec![fixtures::candidate(3, "Björk - Homogenic", &["Vinyl"])])
            .await;
        h.ranker.set_degraded("reasoning service timed out").await;

        let outcome = h.orchestrator.search("bjork homogenic clear").await.unwrap();

        assert!(!outcome.low_confidence);
        assert!(outcome.is_degraded());
        assert_eq!(
            outcome.ranking_degraded.unwrap().reason,
            "reasoning service timed out"
        );
        let ranked = h.ranker.recorded_calls().await;
        assert_eq!(ranked[0].0, vec!["clear vinyl".to_string()]);
    }

    #[tokio::test]
    async fn test_preview_parses_without_searching() {
        let h = harness(SearchConfig::default());
        h.parser
            .set_result(Ok(fixtures::query("Pink Floyd", "Animals", &["2018 remaster"], 0.5)))
            .await;

        let preview = h.orchestrator.preview("floyd animals remaster").await.unwrap();

        assert!(preview.searchable);
        assert!(preview.will_rank_variants);
        assert!(preview.low_confidence);
        assert_eq!(preview.request.terms, "Pink Floyd Animals");
        assert_eq!(h.catalog.search_count().await, 0);

        let blank = h.orchestrator.preview("").await.unwrap();
        assert!(!blank.searchable);
        assert!(blank.low_confidence);
        assert_eq!(h.parser.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_details_for_top_results_skip_failures() {
        let h = harness(SearchConfig::default());
        h.parser
            .set_result(Ok(fixtures::query("Pink Floyd", "Animals", &[], 0.9)))
            .await;
        h.catalog
            .set_results(vec![
                fixtures::candidate(10, "Pink Floyd - Animals", &["Vinyl"]),
                fixtures::candidate(11, "Pink Floyd - Animals", &["Vinyl"]),
                fixtures::candidate(12, "Pink Floyd - Animals", &["Vinyl"]),
                fixtures::candidate(13, "Pink Floyd - Animals", &["Vinyl"]),
            ])
            .await;
        h.catalog.add_release(fixtures::release(10, "Pink Floyd", "Animals")).await;
        h.catalog.set_release_error(11, CatalogError::Timeout).await;
        h.catalog.add_release(fixtures::release(13, "Pink Floyd", "Animals")).await;

        let outcome = h
            .orchestrator
            .search_with_details("floyd animals", 3)
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 4);
        assert_eq!(h.catalog.recorded_release_requests().await, vec![10, 11, 12]);
        let ids: Vec<u64> = outcome.details.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![10]);
        assert_eq!(outcome.llm_calls, 2);
    }

    #[tokio::test]
    async fn test_zero_details_fetches_nothing() {
        let h = harness(SearchConfig::default());
        h.parser
            .set_result(Ok(fixtures::query("Can", "Ege Bamyasi", &[], 0.9)))
            .await;
        h.catalog
            .set_results(vec![fixtures::candidate(5, "Can - Ege Bamyasi", &["Vinyl"])])
            .await;

        let outcome = h.orchestrator.search_with_details("can ege", 0).await.unwrap();

        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.details.is_empty());
        assert!(h.catalog.recorded_release_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_check_services_reports_each_service() {
        let h = harness(SearchConfig::default());
        h.parser
            .set_result(Ok(fixtures::query("Pink Floyd", "", &[], 0.4)))
            .await;

        let check = h.orchestrator.check_services().await;
        assert!(check.all_ok());
        assert_eq!(h.parser.recorded_inputs().await, vec![SERVICE_CHECK_TEXT.to_string()]);

        h.catalog
            .set_credentials_error(CatalogError::Unauthorized(401))
            .await;
        h.parser
            .set_result(Err(ParseError::new(SERVICE_CHECK_TEXT, "missing API key")))
            .await;

        let check = h.orchestrator.check_services().await;
        assert!(!check.all_ok());
        assert!(matches!(&check.catalog, CheckResult::Failed { reason } if reason.contains("401")));
        assert_eq!(
            check.reasoning,
            CheckResult::Failed {
                reason: "missing API key".to_string()
            }
        );
    }
}
