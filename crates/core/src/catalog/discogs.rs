//! Discogs database client: release search and release lookup.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::DiscogsConfig;
use crate::metrics;

use super::{
    Candidate, CatalogClient, CatalogError, CatalogRequest, RateLimiter, ReleaseDetails,
    ReleaseLabel, Track,
};

/// Discogs backend (`/database/search` and `/releases/{id}`).
pub struct DiscogsClient {
    client: Client,
    config: DiscogsConfig,
    limiter: Arc<RateLimiter>,
}

impl DiscogsClient {
    /// Create a client sharing the process-wide `limiter`.
    pub fn new(config: DiscogsConfig, limiter: Arc<RateLimiter>) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CatalogError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            limiter,
        })
    }

    /// Build the search URL for a request.
    fn build_search_url(&self, request: &CatalogRequest) -> String {
        let mut url = format!(
            "{}/database/search?q={}&type={}&per_page={}&page=1",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(request.terms.trim()),
            request.kind.as_str(),
            request.per_page
        );

        for (key, value) in &request.filters {
            url.push_str(&format!(
                "&{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            ));
        }

        url
    }

    /// Send one GET after rate limiter admission.
    async fn send(&self, url: &str) -> Result<reqwest::Response, CatalogError> {
        self.limiter.acquire().await?;

        self.client
            .get(url)
            .header(
                header::AUTHORIZATION,
                format!("Discogs token={}", self.config.token.expose()),
            )
            .send()
            .await
            .map_err(|e| {
                metrics::CATALOG_REQUESTS
                    .with_label_values(&["error"])
                    .inc();
                if e.is_timeout() {
                    CatalogError::Timeout
                } else {
                    CatalogError::Http(e.to_string())
                }
            })
    }

    /// How long to back off after a 429: `Retry-After` if given, capped by
    /// the limiter's wait ceiling.
    fn retry_delay(&self, response: &reqwest::Response) -> Duration {
        let requested = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_millis(self.config.retry_backoff_ms));
        requested.min(self.limiter.max_wait())
    }

    fn release_url(&self, id: u64) -> String {
        format!("{}/releases/{}", self.config.base_url.trim_end_matches('/'), id)
    }

    /// GET a JSON document: one retry on 429, `None` on 404.
    async fn get_json(&self, url: &str) -> Result<Option<Value>, CatalogError> {
        let mut response = self.send(url).await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let delay = self.retry_delay(&response);
            warn!(delay_ms = delay.as_millis() as u64, "Discogs returned 429, retrying once");
            metrics::CATALOG_REQUESTS
                .with_label_values(&["rate_limited"])
                .inc();
            tokio::time::sleep(delay).await;

            response = self.send(url).await?;
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                metrics::CATALOG_REQUESTS
                    .with_label_values(&["rate_limited"])
                    .inc();
                return Err(CatalogError::RateLimited);
            }
        }

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                metrics::CATALOG_REQUESTS
                    .with_label_values(&["unauthorized"])
                    .inc();
                return Err(CatalogError::Unauthorized(status.as_u16()));
            }
            StatusCode::NOT_FOUND => {
                metrics::CATALOG_REQUESTS
                    .with_label_values(&["not_found"])
                    .inc();
                return Ok(None);
            }
            s if !s.is_success() => {
                metrics::CATALOG_REQUESTS
                    .with_label_values(&["error"])
                    .inc();
                let body = response.text().await.unwrap_or_default();
                return Err(CatalogError::Api {
                    status: s.as_u16(),
                    message: body.chars().take(200).collect(),
                });
            }
            _ => {}
        }

        let body: Value = response.json().await.map_err(|e| {
            metrics::CATALOG_REQUESTS
                .with_label_values(&["error"])
                .inc();
            CatalogError::Parse(e.to_string())
        })?;
        metrics::CATALOG_REQUESTS.with_label_values(&["ok"]).inc();
        Ok(Some(body))
    }
}

#[derive(Debug, Deserialize)]
struct DgSearchResponse {
    #[serde(default)]
    pagination: Option<DgPagination>,
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct DgPagination {
    #[serde(default)]
    items: u64,
}

#[derive(Debug, Deserialize)]
struct DgResult {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    formats: Vec<DgFormat>,
    #[serde(default)]
    format: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DgFormat {
    #[serde(default)]
    name: String,
    #[serde(default)]
    qty: Option<String>,
    #[serde(default)]
    descriptions: Vec<String>,
    #[serde(default)]
    text: Option<String>,
}

impl DgResult {
    /// Format descriptors: "2×Vinyl", then descriptions, then free text.
    fn format_descriptors(&self) -> Vec<String> {
        if self.formats.is_empty() {
            return self.format.clone();
        }

        let mut out = Vec::new();
        for fmt in &self.formats {
            let qty = fmt
                .qty
                .as_deref()
                .and_then(|q| q.trim().parse::<u32>().ok())
                .unwrap_or(1);
            if !fmt.name.is_empty() {
                if qty > 1 {
                    out.push(format!("{}×{}", qty, fmt.name));
                } else {
                    out.push(fmt.name.clone());
                }
            }
            out.extend(fmt.descriptions.iter().cloned());
            if let Some(text) = fmt.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                out.push(text.to_string());
            }
        }
        out
    }
}

#[derive(Debug, Deserialize)]
struct DgRelease {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    artists: Vec<DgArtist>,
    #[serde(default)]
    year: Option<Value>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    labels: Vec<DgLabel>,
    #[serde(default)]
    formats: Vec<DgFormat>,
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    styles: Vec<String>,
    #[serde(default)]
    tracklist: Vec<DgTrack>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DgArtist {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct DgLabel {
    #[serde(default)]
    name: String,
    #[serde(default)]
    catno: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DgTrack {
    #[serde(default)]
    position: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    duration: Option<String>,
}

impl DgRelease {
    fn into_details(self, requested_id: u64, payload: Value) -> ReleaseDetails {
        let formats = DgResult {
            id: self.id,
            title: String::new(),
            formats: self.formats,
            format: Vec::new(),
        }
        .format_descriptors();

        ReleaseDetails {
            id: self.id.unwrap_or(requested_id),
            title: self.title,
            artists: self
                .artists
                .into_iter()
                .map(|a| a.name)
                .filter(|n| !n.is_empty())
                .collect(),
            year: self.year.as_ref().and_then(year_from_value),
            country: non_empty(self.country),
            labels: self
                .labels
                .into_iter()
                .map(|l| ReleaseLabel {
                    name: l.name,
                    catalog_number: non_empty(l.catno)
                        .filter(|c| !c.eq_ignore_ascii_case("none")),
                })
                .collect(),
            formats,
            genres: self.genres,
            styles: self.styles,
            tracklist: self
                .tracklist
                .into_iter()
                .map(|t| Track {
                    position: t.position,
                    title: t.title,
                    duration: non_empty(t.duration),
                })
                .collect(),
            notes: non_empty(self.notes),
            payload,
        }
    }
}

fn year_from_value(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|y| u16::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|y| *y > 0)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Convert raw result entries, skipping any without a usable id.
fn into_candidates(results: Vec<Value>) -> Vec<Candidate> {
    results
        .into_iter()
        .filter_map(|payload| {
            let parsed: DgResult = match serde_json::from_value(payload.clone()) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed Discogs result");
                    return None;
                }
            };
            let Some(id) = parsed.id else {
                warn!(title = %parsed.title, "Skipping Discogs result without id");
                return None;
            };
            Some(Candidate {
                id,
                title: parsed.title.clone(),
                formats: parsed.format_descriptors(),
                payload,
            })
        })
        .collect()
}

#[async_trait]
impl CatalogClient for DiscogsClient {
    fn name(&self) -> &str {
        "discogs"
    }

    async fn search(&self, request: &CatalogRequest) -> Result<Vec<Candidate>, CatalogError> {
        let url = self.build_search_url(request);
        debug!(
            terms = %request.terms,
            filters = request.filters.len(),
            "Searching Discogs"
        );

        let Some(body) = self.get_json(&url).await? else {
            debug!("Discogs returned 404, treating as no results");
            return Ok(Vec::new());
        };
        let body: DgSearchResponse =
            serde_json::from_value(body).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let candidates = into_candidates(body.results);
        debug!(
            total_items = body.pagination.map(|p| p.items).unwrap_or(0),
            returned = candidates.len(),
            "Discogs search complete"
        );

        Ok(candidates)
    }

    async fn release_details(&self, id: u64) -> Result<Option<ReleaseDetails>, CatalogError> {
        debug!(release_id = id, "Fetching Discogs release");
        let Some(payload) = self.get_json(&self.release_url(id)).await? else {
            debug!(release_id = id, "Discogs release not found");
            return Ok(None);
        };
        let release: DgRelease = serde_json::from_value(payload.clone())
            .map_err(|e| CatalogError::Parse(e.to_string()))?;
        Ok(Some(release.into_details(id, payload)))
    }

    async fn check_credentials(&self) -> Result<(), CatalogError> {
        let url = self.build_search_url(&CatalogRequest::new("test", 1));
        self.get_json(&url).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> DiscogsClient {
        let mut config = DiscogsConfig::with_token("tok");
        config.base_url = "https://api.discogs.test/".to_string();
        DiscogsClient::new(config, Arc::new(RateLimiter::new(60, Duration::from_secs(5)))).unwrap()
    }

    #[test]
    fn test_build_search_url_encodes_terms_and_filters() {
        let request = CatalogRequest::new("Pink Floyd The Dark Side of the Moon", 50)
            .with_filter("format", "Vinyl")
            .with_filter("catno", "SHVL 804");

        assert_eq!(
            client().build_search_url(&request),
            "https://api.discogs.test/database/search?q=Pink%20Floyd%20The%20Dark%20Side%20of%20the%20Moon\
             &type=release&per_page=50&page=1&format=Vinyl&catno=SHVL%20804"
        );
    }

    #[test]
    fn test_format_descriptors_from_structured_formats() {
        let result: DgResult = serde_json::from_value(json!({
            "id": 1,
            "title": "Pink Floyd - The Wall",
            "formats": [
                {"name": "Vinyl", "qty": "2", "descriptions": ["LP", "Album"], "text": "Red Translucent"},
                {"name": "Poster", "qty": "1"}
            ],
            "format": ["Vinyl", "LP", "Album"]
        }))
        .unwrap();

        assert_eq!(
            result.format_descriptors(),
            vec!["2×Vinyl", "LP", "Album", "Red Translucent", "Poster"]
        );
    }

    #[test]
    fn test_format_descriptors_fall_back_to_flat_list() {
        let result: DgResult = serde_json::from_value(json!({
            "id": 2,
            "title": "x",
            "format": ["Vinyl", "LP", "Limited Edition"]
        }))
        .unwrap();
        assert_eq!(result.format_descriptors(), vec!["Vinyl", "LP", "Limited Edition"]);
    }

    #[test]
    fn test_release_url() {
        assert_eq!(
            client().release_url(249504),
            "https://api.discogs.test/releases/249504"
        );
    }

    #[test]
    fn test_release_details_from_payload() {
        let payload = json!({
            "id": 1873013,
            "title": "The Dark Side Of The Moon",
            "artists": [{"name": "Pink Floyd", "id": 45467}],
            "year": 1973,
            "country": "UK",
            "labels": [{"name": "Harvest", "catno": "SHVL 804"}, {"name": "EMI", "catno": "none"}],
            "formats": [{"name": "Vinyl", "qty": "1", "descriptions": ["LP", "Album"], "text": ""}],
            "genres": ["Rock"],
            "styles": ["Prog Rock"],
            "tracklist": [
                {"position": "A1", "title": "Speak To Me", "duration": "1:30"},
                {"position": "A2", "title": "Breathe", "duration": ""}
            ],
            "notes": "  "
        });
        let release: DgRelease = serde_json::from_value(payload.clone()).unwrap();
        let details = release.into_details(1873013, payload.clone());

        assert_eq!(details.display_title(), "Pink Floyd - The Dark Side Of The Moon");
        assert_eq!(details.year, Some(1973));
        assert_eq!(details.formats, vec!["Vinyl", "LP", "Album"]);
        assert_eq!(details.labels[0].catalog_number.as_deref(), Some("SHVL 804"));
        assert_eq!(details.labels[1].catalog_number, None);
        assert_eq!(details.tracklist.len(), 2);
        assert_eq!(details.tracklist[0].duration.as_deref(), Some("1:30"));
        assert_eq!(details.tracklist[1].duration, None);
        assert_eq!(details.notes, None);
        assert_eq!(details.payload, payload);
    }

    #[test]
    fn test_release_year_zero_is_unknown() {
        let release: DgRelease =
            serde_json::from_value(json!({"title": "Untitled", "year": 0})).unwrap();
        let details = release.into_details(5, Value::Null);
        assert_eq!(details.id, 5);
        assert_eq!(details.year, None);

        let release: DgRelease =
            serde_json::from_value(json!({"title": "Tago Mago", "year": "1971"})).unwrap();
        assert_eq!(release.into_details(6, Value::Null).year, Some(1971));
    }

    #[test]
    fn test_into_candidates_skips_entries_without_id() {
        let payload = json!({"id": 7, "title": "Can - Tago Mago", "year": "1971", "format": ["Vinyl"]});
        let candidates = into_candidates(vec![
            payload.clone(),
            json!({"title": "no id"}),
            json!({"id": "not-a-number", "title": "bad id"}),
        ]);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, 7);
        assert_eq!(candidates[0].title, "Can - Tago Mago");
        assert_eq!(candidates[0].payload, payload);
        assert_eq!(candidates[0].year(), Some(1971));
    }
}
