use serde::{Deserialize, Serialize};

use crate::llm::{ApiKey, LlmConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub discogs: DiscogsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Discogs catalog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscogsConfig {
    /// Personal access token ("Discogs token=..." authorization)
    pub token: ApiKey,
    /// API base URL (default: https://api.discogs.com)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// User-Agent sent with every request (required by Discogs)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Process-wide request ceiling (default: 60, the authenticated Discogs quota)
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Longest a request may wait for rate limiter admission (default: 120)
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u32,
    /// Backoff before the single retry after a provider 429 (default: 2000)
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// Results requested per search page (default: 50, Discogs max is 100)
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_base_url() -> String {
    "https://api.discogs.com".to_string()
}

fn default_user_agent() -> String {
    format!("cXz/{} +https://github.com/cxz-app/cxz", env!("CARGO_PKG_VERSION"))
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_timeout() -> u32 {
    30
}

fn default_max_wait() -> u32 {
    120
}

fn default_retry_backoff() -> u64 {
    2000
}

fn default_per_page() -> u32 {
    50
}

impl DiscogsConfig {
    /// Configuration with defaults for everything except the token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: ApiKey::new(token),
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            requests_per_minute: default_requests_per_minute(),
            timeout_secs: default_timeout(),
            max_wait_secs: default_max_wait(),
            retry_backoff_ms: default_retry_backoff(),
            per_page: default_per_page(),
        }
    }
}

/// Search pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Parses below this confidence are flagged as low-confidence (default: 0.7)
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Candidates sent to the reasoning service for scoring (default: 20)
    #[serde(default = "default_max_ranked_candidates")]
    pub max_ranked_candidates: usize,
    /// Format filter applied to every catalog search (default: "Vinyl")
    #[serde(default = "default_format_filter")]
    pub format_filter: Option<String>,
    /// Retry once without filters when a filtered search finds nothing (default: true)
    #[serde(default = "default_broaden_on_empty")]
    pub broaden_on_empty: bool,
}

fn default_confidence_threshold() -> f32 {
    0.7
}

fn default_max_ranked_candidates() -> usize {
    20
}

fn default_format_filter() -> Option<String> {
    Some("Vinyl".to_string())
}

fn default_broaden_on_empty() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            max_ranked_candidates: default_max_ranked_candidates(),
            format_filter: default_format_filter(),
            broaden_on_empty: default_broaden_on_empty(),
        }
    }
}

/// Sanitized config for display (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub discogs: SanitizedDiscogsConfig,
    pub llm: SanitizedLlmConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDiscogsConfig {
    pub base_url: String,
    pub token_configured: bool,
    pub requests_per_minute: u32,
    pub timeout_secs: u32,
    pub max_wait_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            discogs: SanitizedDiscogsConfig {
                base_url: config.discogs.base_url.clone(),
                token_configured: !config.discogs.token.is_empty(),
                requests_per_minute: config.discogs.requests_per_minute,
                timeout_secs: config.discogs.timeout_secs,
                max_wait_secs: config.discogs.max_wait_secs,
            },
            llm: SanitizedLlmConfig {
                provider: config.llm.provider.as_str().to_string(),
                model: config.llm.model.clone(),
                api_key_configured: config.llm.api_key.as_ref().is_some_and(|k| !k.is_empty()),
                api_base: config.llm.api_base.clone(),
            },
            search: config.search.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_config_defaults() {
        let config = SearchConfig::default();
        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(config.max_ranked_candidates, 20);
        assert_eq!(config.format_filter.as_deref(), Some("Vinyl"));
        assert!(config.broaden_on_empty);
    }

    #[test]
    fn test_discogs_config_with_token() {
        let config = DiscogsConfig::with_token("abc");
        assert_eq!(config.token.expose(), "abc");
        assert_eq!(config.base_url, "https://api.discogs.com");
        assert_eq!(config.requests_per_minute, 60);
        assert!(config.user_agent.starts_with("cXz/"));
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let config: Config = toml::from_str(
            r#"
[discogs]
token = "super-secret-token"

[llm]
provider = "anthropic"
model = "claude-3-haiku-20240307"
api_key = "sk-secret"
"#,
        )
        .unwrap();

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.discogs.token_configured);
        assert!(sanitized.llm.api_key_configured);
        assert_eq!(sanitized.llm.provider, "anthropic");

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret-token"));
        assert!(!json.contains("sk-secret"));
    }
}
