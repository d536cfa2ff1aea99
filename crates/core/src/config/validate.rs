use super::{types::Config, ConfigError};
use crate::llm::LlmProvider;

/// Validate configuration
/// Currently validates:
/// - Discogs token is set and the rate/timeouts are non-zero
/// - LLM model is named and cloud providers have a credential
/// - Search thresholds are within 0.0-1.0 and the ranking cap is non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let discogs = &config.discogs;
    if discogs.token.is_empty() {
        return Err(ConfigError::ValidationError(
            "discogs.token cannot be empty".to_string(),
        ));
    }
    if discogs.requests_per_minute == 0 {
        return Err(ConfigError::ValidationError(
            "discogs.requests_per_minute cannot be 0".to_string(),
        ));
    }
    if discogs.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "discogs.timeout_secs cannot be 0".to_string(),
        ));
    }
    if !(1..=100).contains(&discogs.per_page) {
        return Err(ConfigError::ValidationError(format!(
            "discogs.per_page must be between 1 and 100, got {}",
            discogs.per_page
        )));
    }

    let llm = &config.llm;
    if llm.model.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "llm.model cannot be empty".to_string(),
        ));
    }
    // Ollama runs locally; a proxy behind api_base may hold the key itself
    let has_key = llm.api_key.as_ref().is_some_and(|k| !k.is_empty());
    if llm.provider != LlmProvider::Ollama && !has_key && llm.api_base.is_none() {
        return Err(ConfigError::ValidationError(format!(
            "llm provider {} requires api_key or api_base",
            llm.provider.as_str()
        )));
    }

    let search = &config.search;
    if !(0.0..=1.0).contains(&search.confidence_threshold) {
        return Err(ConfigError::ValidationError(format!(
            "search.confidence_threshold must be between 0.0 and 1.0, got {}",
            search.confidence_threshold
        )));
    }
    if search.max_ranked_candidates == 0 {
        return Err(ConfigError::ValidationError(
            "search.max_ranked_candidates cannot be 0".to_string(),
        ));
    }

    Ok(())
}
