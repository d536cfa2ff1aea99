//! Release catalog search.
//!
//! The catalog is pure transport: it turns a [`CatalogRequest`] into the
//! provider's candidates, fetches full release records by id, and knows
//! nothing about ranking. Every request is admitted through the
//! process-wide [`RateLimiter`].

mod discogs;
mod rate_limiter;
mod types;

pub use discogs::DiscogsClient;
pub use rate_limiter::{RateLimitStatus, RateLimiter, TokenBucket};
pub use types::{
    Candidate, CatalogError, CatalogRequest, ReleaseDetails, ReleaseLabel, SearchKind, Track,
};

use async_trait::async_trait;

/// Trait for release catalog backends.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Backend name for logs ("discogs").
    fn name(&self) -> &str;

    /// Search releases. A provider "not found" is an empty result, not an error.
    async fn search(&self, request: &CatalogRequest) -> Result<Vec<Candidate>, CatalogError>;

    /// Full record for one release; `None` when the provider has no such id.
    async fn release_details(&self, id: u64) -> Result<Option<ReleaseDetails>, CatalogError>;

    /// Cheap authenticated request proving the credentials are accepted.
    async fn check_credentials(&self) -> Result<(), CatalogError>;
}
