use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment names understood for compatibility with earlier setups,
/// mapped onto their config keys.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("DISCOGS_USER_TOKEN", "discogs.token"),
    ("DISCOGS_REQUESTS_PER_MINUTE", "discogs.requests_per_minute"),
    ("LLM_MODEL", "llm.model"),
    ("LLM_API_KEY", "llm.api_key"),
];

/// Load configuration from file with environment variable overrides.
///
/// Precedence (lowest first): the TOML file, the legacy variables in
/// [`LEGACY_ENV_KEYS`], then `CXZ_`-prefixed variables where `__` separates
/// nesting levels (`CXZ_DISCOGS__REQUESTS_PER_MINUTE=30`).
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    figment_for(Figment::new().merge(Toml::file(path)))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn figment_for(base: Figment) -> Figment {
    let legacy_names: Vec<&str> = LEGACY_ENV_KEYS.iter().map(|(env, _)| *env).collect();

    base.merge(Env::raw().only(&legacy_names).map(|key| {
        LEGACY_ENV_KEYS
            .iter()
            .find(|(env, _)| key.as_str().eq_ignore_ascii_case(env))
            .map(|(_, config_key)| (*config_key).into())
            .unwrap_or_else(|| key.as_str().to_string().into())
    }))
    .merge(Env::prefixed("CXZ_").split("__"))
}
