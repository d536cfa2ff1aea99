//! Catalog request and candidate types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// What kind of catalog entity a search returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    /// A specific pressing/issue of an album.
    #[default]
    Release,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Release => "release",
        }
    }
}

/// A provider-side search, built from a query's core fields only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRequest {
    /// Free-text search terms ("artist album").
    pub terms: String,
    /// Provider filters in insertion order, e.g. `("format", "Vinyl")`.
    pub filters: Vec<(String, String)>,
    pub kind: SearchKind,
    pub per_page: u32,
}

impl CatalogRequest {
    pub fn new(terms: impl Into<String>, per_page: u32) -> Self {
        Self {
            terms: terms.into(),
            filters: Vec::new(),
            kind: SearchKind::Release,
            per_page,
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    /// Whether the request has anything to search for.
    pub fn is_searchable(&self) -> bool {
        !self.terms.trim().is_empty()
    }

    /// Value of the first filter with this key.
    pub fn filter(&self, key: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Same request with every filter dropped, or `None` if it had none.
    pub fn broadened(&self) -> Option<CatalogRequest> {
        if self.filters.is_empty() {
            return None;
        }
        Some(CatalogRequest {
            filters: Vec::new(),
            ..self.clone()
        })
    }
}

/// One release returned by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Provider release id, preserved verbatim through ranking.
    pub id: u64,
    /// Display title ("Artist - Album").
    pub title: String,
    /// Format descriptors, e.g. `["2×Vinyl", "LP", "Album", "Red Translucent"]`.
    pub formats: Vec<String>,
    /// Raw provider record.
    pub payload: Value,
}

impl Candidate {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            formats: Vec::new(),
            payload: Value::Null,
        }
    }

    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.formats = formats.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Release year. Discogs sends it as a string, sometimes as a number.
    pub fn year(&self) -> Option<u16> {
        match self.payload.get("year")? {
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n.as_u64().and_then(|y| u16::try_from(y).ok()),
            _ => None,
        }
        .filter(|y| *y > 0)
    }

    pub fn country(&self) -> Option<&str> {
        self.payload_str("country")
    }

    pub fn catalog_number(&self) -> Option<&str> {
        self.payload_str("catno")
            .filter(|c| !c.eq_ignore_ascii_case("none"))
    }

    /// Labels, first one being the primary label.
    pub fn labels(&self) -> Vec<&str> {
        self.payload_strings("label")
    }

    pub fn genres(&self) -> Vec<&str> {
        self.payload_strings("genre")
    }

    pub fn styles(&self) -> Vec<&str> {
        self.payload_strings("style")
    }

    fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn payload_strings(&self, key: &str) -> Vec<&str> {
        match self.payload.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(s)) => vec![s.as_str()],
            _ => Vec::new(),
        }
    }
}

/// Full record of one release, fetched by id after ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseDetails {
    pub id: u64,
    pub title: String,
    pub artists: Vec<String>,
    pub year: Option<u16>,
    pub country: Option<String>,
    pub labels: Vec<ReleaseLabel>,
    /// Same descriptor layout as [`Candidate::formats`].
    pub formats: Vec<String>,
    pub genres: Vec<String>,
    pub styles: Vec<String>,
    pub tracklist: Vec<Track>,
    pub notes: Option<String>,
    /// Raw provider record.
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseLabel {
    pub name: String,
    pub catalog_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Side and number ("A1"), empty for headings.
    pub position: String,
    pub title: String,
    pub duration: Option<String>,
}

impl ReleaseDetails {
    /// Display title in the search result style ("Artist - Album").
    pub fn display_title(&self) -> String {
        if self.artists.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artists.join(", "), self.title)
        }
    }
}

/// Errors from the catalog provider.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog rejected the credentials (HTTP {0})")]
    Unauthorized(u16),

    #[error("Catalog rate limit still exceeded after retry")]
    RateLimited,

    #[error("Rate limiter admission took longer than {0:?}")]
    Throttled(Duration),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_release_display_title() {
        let mut details = ReleaseDetails {
            id: 1,
            title: "Animals".to_string(),
            artists: vec!["Pink Floyd".to_string()],
            year: Some(1977),
            country: None,
            labels: Vec::new(),
            formats: Vec::new(),
            genres: Vec::new(),
            styles: Vec::new(),
            tracklist: Vec::new(),
            notes: None,
            payload: Value::Null,
        };
        assert_eq!(details.display_title(), "Pink Floyd - Animals");

        details.artists.clear();
        assert_eq!(details.display_title(), "Animals");
    }

    #[test]
    fn test_request_searchable_and_broadened() {
        let request = CatalogRequest::new("Pink Floyd The Wall", 50)
            .with_filter("format", "Vinyl")
            .with_filter("year", "1979");
        assert!(request.is_searchable());
        assert_eq!(request.filter("year"), Some("1979"));

        let broad = request.broadened().unwrap();
        assert!(broad.filters.is_empty());
        assert_eq!(broad.terms, request.terms);
        assert_eq!(broad.per_page, 50);
        assert!(broad.broadened().is_none());

        assert!(!CatalogRequest::new("   ", 50).is_searchable());
    }

    #[test]
    fn test_candidate_payload_accessors() {
        let candidate = Candidate::new(249504, "Pink Floyd - The Dark Side Of The Moon")
            .with_payload(json!({
                "year": "1973",
                "country": "UK",
                "catno": "SHVL 804",
                "label": ["Harvest", "EMI"],
                "genre": ["Rock"],
                "style": ["Prog Rock", "Psychedelic Rock"]
            }));

        assert_eq!(candidate.year(), Some(1973));
        assert_eq!(candidate.country(), Some("UK"));
        assert_eq!(candidate.catalog_number(), Some("SHVL 804"));
        assert_eq!(candidate.labels(), vec!["Harvest", "EMI"]);
        assert_eq!(candidate.genres(), vec!["Rock"]);
        assert_eq!(candidate.styles().len(), 2);
    }

    #[test]
    fn test_candidate_accessors_tolerate_odd_payloads() {
        let candidate = Candidate::new(1, "x").with_payload(json!({
            "year": 0,
            "catno": "none",
            "country": "  ",
            "label": "Single Label"
        }));
        assert_eq!(candidate.year(), None);
        assert_eq!(candidate.catalog_number(), None);
        assert_eq!(candidate.country(), None);
        assert_eq!(candidate.labels(), vec!["Single Label"]);

        let bare = Candidate::new(2, "y");
        assert!(bare.genres().is_empty());
        assert_eq!(bare.year(), None);
    }
}
