//! Structured query to catalog request.

use crate::catalog::CatalogRequest;

use super::types::StructuredQuery;

/// Builds catalog requests from a query's core fields.
/// Variant descriptors never reach the catalog.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    format_filter: Option<String>,
    per_page: u32,
}

impl QueryBuilder {
    pub fn new(format_filter: Option<String>, per_page: u32) -> Self {
        Self {
            format_filter: format_filter
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty()),
            per_page,
        }
    }

    /// Build the request. Empty artist and album give empty terms; a track
    /// only narrows a search that already has one of them.
    pub fn build(&self, query: &StructuredQuery) -> CatalogRequest {
        let mut parts: Vec<&str> = [query.artist.trim(), query.album.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect();
        if !parts.is_empty() {
            if let Some(track) = query.track.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                parts.push(track);
            }
        }
        let terms = parts.join(" ");

        let mut request = CatalogRequest::new(terms, self.per_page);

        if let Some(format) = &self.format_filter {
            request = request.with_filter("format", format);
        }
        if let Some(year) = query.year {
            request = request.with_filter("year", year.to_string());
        }
        if let Some(genre) = &query.genre {
            request = request.with_filter("genre", genre);
        }
        if let Some(label) = &query.label {
            request = request.with_filter("label", label);
        }
        if let Some(catno) = &query.catalog_number {
            request = request.with_filter("catno", catno);
        }
        if let Some(country) = &query.country {
            request = request.with_filter("country", country);
        }

        request
    }
}
