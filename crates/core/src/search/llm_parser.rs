//! Reasoning-service backed intent parser.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::llm::{extract_json_object, ApiKey, CompletionRequest, LlmClient};

use super::observe_llm_call;
use super::traits::IntentParser;
use super::types::{ParseError, StructuredQuery};

/// Configuration for the LLM intent parser.
#[derive(Debug, Clone)]
pub struct LlmParserConfig {
    /// Maximum tokens for the LLM response.
    pub max_tokens: u32,
    /// Temperature for generation.
    pub temperature: f32,
}

impl Default for LlmParserConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.0,
        }
    }
}

const SYSTEM_PROMPT: &str = r#"You are a vinyl record expert. You turn a collector's free-text description of a record into a structured catalog search.

Split the description into:
1. CORE FIELDS that a release database can search on:
   - artist: the performing artist or band
   - album: the album title
   - track: a specific song, only when the description names one
   - year, genre, label, catalog_number, country: only when stated explicitly
2. VARIANT DESCRIPTORS: everything that distinguishes one pressing from another and that a database cannot filter on, such as vinyl color ("red vinyl", "splatter"), edition markers ("limited edition", "50th anniversary"), disc counts ("2LP"), weight ("180g") or packaging ("gatefold").

RULES:
- Artist and album are often run together with no delimiter and with descriptors mixed in ("pink floyd dark side red vinyl"). Use your knowledge of real artists and discographies to find the boundary.
- Expand well-known abbreviated titles to the full official title ("Dark Side" by Pink Floyd is "The Dark Side of the Moon").
- Never put variant descriptors into artist or album.
- Use null for anything not present. Do not guess years, labels or catalog numbers.
- confidence (0.0 to 1.0) reflects how ambiguous the description is: 0.9+ when artist and album are unambiguous, around 0.5 when you had to guess, below 0.3 when you could not tell what record is meant.

Respond with JSON only:
{
  "artist": "Pink Floyd",
  "album": "The Dark Side of the Moon",
  "track": null,
  "year": null,
  "genre": null,
  "label": null,
  "catalog_number": null,
  "country": null,
  "variant_descriptors": ["red vinyl"],
  "confidence": 0.9
}"#;

/// Intent parser that asks the reasoning service to structure the text.
///
/// Generic over the LLM client type; `Arc<dyn LlmClient>` works too.
pub struct LlmIntentParser<C: LlmClient + ?Sized> {
    client: Arc<C>,
    config: LlmParserConfig,
    credential: Option<ApiKey>,
}

impl<C: LlmClient + ?Sized> LlmIntentParser<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            config: LlmParserConfig::default(),
            credential: None,
        }
    }

    pub fn with_config(mut self, config: LlmParserConfig) -> Self {
        self.config = config;
        self
    }

    /// Credential attached to every call.
    pub fn with_credential(mut self, credential: Option<ApiKey>) -> Self {
        self.credential = credential;
        self
    }

    fn build_user_prompt(text: &str) -> String {
        format!("Record description: \"{}\"\n\nJSON Response:", text.trim())
    }

    /// Parse the LLM reply into a normalized query.
    fn parse_response(text: &str) -> Result<StructuredQuery, String> {
        let json_str = extract_json_object(text);
        let parsed: LlmParseResponse = serde_json::from_str(json_str)
            .map_err(|e| format!("invalid JSON in reply: {} - Response: {}", e, text))?;

        let artist = parsed.artist.unwrap_or_default();
        let album = parsed.album.unwrap_or_default();
        let confidence = parsed.confidence.unwrap_or_else(|| {
            // No self-reported certainty: estimate from what was extracted
            match (artist.trim().is_empty(), album.trim().is_empty()) {
                (false, false) => 0.6,
                (true, true) => 0.0,
                _ => 0.3,
            }
        });

        Ok(StructuredQuery {
            artist,
            album,
            track: parsed.track,
            year: parsed.year.as_ref().and_then(year_from_value),
            genre: parsed.genre,
            label: parsed.label,
            catalog_number: parsed.catalog_number,
            country: parsed.country,
            variant_descriptors: parsed.variant_descriptors.unwrap_or_default(),
            confidence,
        }
        .normalized())
    }
}

/// Years come back as numbers or strings ("1973").
fn year_from_value(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|y| u16::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Expected JSON response from the LLM for parsing.
#[derive(Debug, Deserialize)]
struct LlmParseResponse {
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    track: Option<String>,
    #[serde(default)]
    year: Option<Value>,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    catalog_number: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    variant_descriptors: Option<Vec<String>>,
    #[serde(default)]
    confidence: Option<f32>,
}

#[async_trait]
impl<C: LlmClient + ?Sized + 'static> IntentParser for LlmIntentParser<C> {
    fn name(&self) -> &str {
        "llm"
    }

    async fn parse(&self, text: &str) -> Result<StructuredQuery, ParseError> {
        let request = CompletionRequest::new(Self::build_user_prompt(text))
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_json_output()
            .with_credential(self.credential.clone());

        let start = Instant::now();
        let response = match self.client.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                observe_llm_call("parse", self.client.provider(), "error", start.elapsed(), None);
                warn!(error = %e, "Intent parse call failed");
                return Err(ParseError::new(text, e.to_string()));
            }
        };

        match Self::parse_response(&response.text) {
            Ok(query) => {
                observe_llm_call(
                    "parse",
                    self.client.provider(),
                    "success",
                    start.elapsed(),
                    Some(&response.usage),
                );
                debug!(
                    artist = %query.artist,
                    album = %query.album,
                    descriptors = ?query.variant_descriptors,
                    confidence = query.confidence,
                    "Parsed record search"
                );
                Ok(query)
            }
            Err(reason) => {
                observe_llm_call(
                    "parse",
                    self.client.provider(),
                    "invalid",
                    start.elapsed(),
                    Some(&response.usage),
                );
                warn!(reason = %reason, "Intent parse reply was unusable");
                Err(ParseError::new(text, reason))
            }
        }
    }
}
