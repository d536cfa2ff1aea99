//! Testing utilities and mock implementations.
//!
//! Mocks for every external seam (reasoning service, catalog) and for the
//! pipeline stages, so searches can be exercised without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use cxz_core::testing::{fixtures, MockCatalogClient, MockLlmClient};
//!
//! let llm = MockLlmClient::new();
//! llm.push_response(fixtures::parse_reply("Pink Floyd", "Animals", &[], 0.9)).await;
//!
//! let catalog = MockCatalogClient::new();
//! catalog.set_results(fixtures::dark_side_pressings()).await;
//! ```

mod mock_catalog;
mod mock_llm;
mod mock_search;

pub use mock_catalog::MockCatalogClient;
pub use mock_llm::MockLlmClient;
pub use mock_search::{MockIntentParser, MockResultRanker};

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::{json, Value};

    use crate::catalog::{Candidate, ReleaseDetails, ReleaseLabel, Track};
    use crate::search::StructuredQuery;

    /// Create a candidate with a minimal Discogs-like payload.
    pub fn candidate(id: u64, title: &str, formats: &[&str]) -> Candidate {
        Candidate::new(id, title)
            .with_formats(formats.iter().copied())
            .with_payload(json!({
                "id": id,
                "title": title,
                "format": formats,
            }))
    }

    /// Create a structured query.
    pub fn query(
        artist: &str,
        album: &str,
        descriptors: &[&str],
        confidence: f32,
    ) -> StructuredQuery {
        StructuredQuery {
            artist: artist.to_string(),
            album: album.to_string(),
            variant_descriptors: descriptors.iter().map(|d| d.to_string()).collect(),
            confidence,
            ..Default::default()
        }
    }

    /// A Discogs `/database/search` result entry.
    pub fn discogs_result(id: u64, title: &str, year: u16, format_text: Option<&str>) -> Value {
        let mut format = vec!["Vinyl", "LP", "Album"];
        if let Some(text) = format_text {
            format.push(text);
        }
        json!({
            "id": id,
            "type": "release",
            "title": title,
            "year": year.to_string(),
            "country": "UK",
            "label": ["Harvest"],
            "catno": format!("SHVL {}", 800 + id % 100),
            "genre": ["Rock"],
            "style": ["Prog Rock"],
            "format": format,
            "formats": [{
                "name": "Vinyl",
                "qty": "1",
                "descriptions": ["LP", "Album"],
                "text": format_text.unwrap_or(""),
            }],
            "resource_url": format!("https://api.discogs.com/releases/{}", id),
        })
    }

    /// Full release record with a two-track side A.
    pub fn release(id: u64, artist: &str, title: &str) -> ReleaseDetails {
        ReleaseDetails {
            id,
            title: title.to_string(),
            artists: vec![artist.to_string()],
            year: Some(1973),
            country: Some("UK".to_string()),
            labels: vec![ReleaseLabel {
                name: "Harvest".to_string(),
                catalog_number: Some(format!("SHVL {}", 800 + id % 100)),
            }],
            formats: vec!["Vinyl".to_string(), "LP".to_string(), "Album".to_string()],
            genres: vec!["Rock".to_string()],
            styles: vec!["Prog Rock".to_string()],
            tracklist: vec![
                Track {
                    position: "A1".to_string(),
                    title: "Speak To Me".to_string(),
                    duration: Some("1:30".to_string()),
                },
                Track {
                    position: "A2".to_string(),
                    title: "Breathe".to_string(),
                    duration: Some("2:43".to_string()),
                },
            ],
            notes: None,
            payload: json!({"id": id, "title": title}),
        }
    }

    /// A Discogs search response body wrapping `results`.
    pub fn discogs_page(results: Vec<Value>) -> Value {
        json!({
            "pagination": {"page": 1, "pages": 1, "per_page": 50, "items": results.len()},
            "results": results,
        })
    }

    /// Three pressings of The Dark Side of the Moon; only id 2 is red.
    pub fn dark_side_pressings() -> Vec<Candidate> {
        vec![
            candidate(
                1,
                "Pink Floyd - The Dark Side Of The Moon",
                &["Vinyl", "LP", "Album", "Gatefold"],
            ),
            candidate(
                2,
                "Pink Floyd - The Dark Side Of The Moon",
                &["Vinyl", "LP", "Album", "Limited Edition", "Red"],
            ),
            candidate(
                3,
                "Pink Floyd - The Dark Side Of The Moon",
                &["Vinyl", "LP", "Album", "Reissue", "Remastered", "180g"],
            ),
        ]
    }

    /// An intent parser reply.
    pub fn parse_reply(artist: &str, album: &str, descriptors: &[&str], confidence: f32) -> String {
        json!({
            "artist": artist,
            "album": album,
            "year": null,
            "label": null,
            "catalog_number": null,
            "country": null,
            "variant_descriptors": descriptors,
            "confidence": confidence,
        })
        .to_string()
    }

    /// A ranking reply scoring `(id, score, explanation)` entries.
    pub fn score_reply(scores: &[(u64, f64, &str)]) -> String {
        let scores: Vec<Value> = scores
            .iter()
            .map(|(id, score, explanation)| {
                json!({"id": id, "score": score, "explanation": explanation})
            })
            .collect();
        json!({ "scores": scores }).to_string()
    }
}
