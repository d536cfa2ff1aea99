pub mod catalog;
pub mod collection;
pub mod config;
pub mod llm;
pub mod metrics;
pub mod search;
pub mod testing;

pub use catalog::{
    Candidate, CatalogClient, CatalogError, CatalogRequest, DiscogsClient, RateLimiter,
    ReleaseDetails,
};
pub use collection::{CollectionEntry, CollectionError, CollectionPublisher, MediaCondition};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DiscogsConfig,
    SanitizedConfig, SearchConfig,
};
pub use llm::{create_llm_client, ApiKey, LlmClient, LlmConfig, LlmError, LlmProvider};
pub use search::{
    CheckResult, EmptyReason, IntentParser, LlmIntentParser, LlmResultRanker, ParseError,
    QueryBuilder, RankedResult, RankingMethod, ResultRanker, SearchError, SearchOrchestrator,
    SearchOutcome, SearchPreview, ServiceCheck, StructuredQuery,
};
