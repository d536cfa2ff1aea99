//! Mock catalog for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::{Candidate, CatalogClient, CatalogError, CatalogRequest, ReleaseDetails};

/// Mock implementation of the CatalogClient trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable results, or a scripted result per call
/// - Track requests for assertions
/// - Simulate failures
#[derive(Debug, Clone, Default)]
pub struct MockCatalogClient {
    /// Results returned when no scripted response is queued.
    results: Arc<RwLock<Vec<Candidate>>>,
    /// Per-call responses, consumed first.
    responses: Arc<RwLock<VecDeque<Result<Vec<Candidate>, CatalogError>>>>,
    /// If set, the next search will fail with this error.
    next_error: Arc<RwLock<Option<CatalogError>>>,
    /// Recorded requests.
    requests: Arc<RwLock<Vec<CatalogRequest>>>,
    /// Release records by id; unknown ids are "not found".
    releases: Arc<RwLock<HashMap<u64, ReleaseDetails>>>,
    /// One-shot failures for release lookups, by id.
    release_errors: Arc<RwLock<HashMap<u64, CatalogError>>>,
    /// Recorded release lookups.
    release_requests: Arc<RwLock<Vec<u64>>>,
    /// If set, the next credential check fails with this error.
    credentials_error: Arc<RwLock<Option<CatalogError>>>,
}

impl MockCatalogClient {
    /// Create a new mock catalog with empty results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the results to return for subsequent searches.
    pub async fn set_results(&self, results: Vec<Candidate>) {
        *self.results.write().await = results;
    }

    /// Queue the response for one upcoming search.
    pub async fn push_response(&self, response: Result<Vec<Candidate>, CatalogError>) {
        self.responses.write().await.push_back(response);
    }

    /// Configure the next search to fail with the given error.
    pub async fn set_next_error(&self, error: CatalogError) {
        *self.next_error.write().await = Some(error);
    }

    /// Get recorded requests.
    pub async fn recorded_requests(&self) -> Vec<CatalogRequest> {
        self.requests.read().await.clone()
    }

    /// Get the number of searches performed.
    pub async fn search_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// Make a release available to `release_details`.
    pub async fn add_release(&self, details: ReleaseDetails) {
        self.releases.write().await.insert(details.id, details);
    }

    /// Fail the next lookup of `id` with the given error.
    pub async fn set_release_error(&self, id: u64, error: CatalogError) {
        self.release_errors.write().await.insert(id, error);
    }

    /// Release ids looked up, in call order.
    pub async fn recorded_release_requests(&self) -> Vec<u64> {
        self.release_requests.read().await.clone()
    }

    /// Configure the next credential check to fail.
    pub async fn set_credentials_error(&self, error: CatalogError) {
        *self.credentials_error.write().await = Some(error);
    }
}

#[async_trait]
impl CatalogClient for MockCatalogClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, request: &CatalogRequest) -> Result<Vec<Candidate>, CatalogError> {
        self.requests.write().await.push(request.clone());

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        if let Some(response) = self.responses.write().await.pop_front() {
            return response;
        }

        Ok(self.results.read().await.clone())
    }

    async fn release_details(&self, id: u64) -> Result<Option<ReleaseDetails>, CatalogError> {
        self.release_requests.write().await.push(id);

        if let Some(err) = self.release_errors.write().await.remove(&id) {
            return Err(err);
        }

        Ok(self.releases.read().await.get(&id).cloned())
    }

    async fn check_credentials(&self) -> Result<(), CatalogError> {
        match self.credentials_error.write().await.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
