//! Hand-off types for adding a chosen release to a user's collection.
//!
//! The core stops at the ranked result. Publishing to the provider's
//! collection is done by a [`CollectionPublisher`] implementation outside
//! the search pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::search::RankedResult;

/// Goldmine grading scale, as displayed by Discogs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaCondition {
    #[serde(rename = "Mint (M)")]
    Mint,
    #[serde(rename = "Near Mint (NM or M-)")]
    NearMint,
    #[default]
    #[serde(rename = "Very Good Plus (VG+)")]
    VeryGoodPlus,
    #[serde(rename = "Very Good (VG)")]
    VeryGood,
    #[serde(rename = "Good Plus (G+)")]
    GoodPlus,
    #[serde(rename = "Good (G)")]
    Good,
    #[serde(rename = "Fair (F)")]
    Fair,
    #[serde(rename = "Poor (P)")]
    Poor,
}

impl MediaCondition {
    pub const ALL: [MediaCondition; 8] = [
        MediaCondition::Mint,
        MediaCondition::NearMint,
        MediaCondition::VeryGoodPlus,
        MediaCondition::VeryGood,
        MediaCondition::GoodPlus,
        MediaCondition::Good,
        MediaCondition::Fair,
        MediaCondition::Poor,
    ];

    /// Discogs display string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCondition::Mint => "Mint (M)",
            MediaCondition::NearMint => "Near Mint (NM or M-)",
            MediaCondition::VeryGoodPlus => "Very Good Plus (VG+)",
            MediaCondition::VeryGood => "Very Good (VG)",
            MediaCondition::GoodPlus => "Good Plus (G+)",
            MediaCondition::Good => "Good (G)",
            MediaCondition::Fair => "Fair (F)",
            MediaCondition::Poor => "Poor (P)",
        }
    }

    /// Short grade ("VG+").
    pub fn abbreviation(&self) -> &'static str {
        match self {
            MediaCondition::Mint => "M",
            MediaCondition::NearMint => "NM",
            MediaCondition::VeryGoodPlus => "VG+",
            MediaCondition::VeryGood => "VG",
            MediaCondition::GoodPlus => "G+",
            MediaCondition::Good => "G",
            MediaCondition::Fair => "F",
            MediaCondition::Poor => "P",
        }
    }
}

impl fmt::Display for MediaCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaCondition {
    type Err = CollectionError;

    /// Accepts display strings and abbreviations, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        if wanted.eq_ignore_ascii_case("M-") || wanted.eq_ignore_ascii_case("Near Mint (NM)") {
            return Ok(MediaCondition::NearMint);
        }
        MediaCondition::ALL
            .into_iter()
            .find(|c| {
                c.as_str().eq_ignore_ascii_case(wanted) || c.abbreviation().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| CollectionError::UnknownCondition(s.to_string()))
    }
}

/// A release ready to be added to a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub release_id: u64,
    pub condition: MediaCondition,
    pub sleeve_condition: MediaCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CollectionEntry {
    /// Entry for a ranked result, graded VG+ until told otherwise.
    pub fn from_ranked(result: &RankedResult) -> Self {
        Self {
            release_id: result.candidate.id,
            condition: MediaCondition::default(),
            sleeve_condition: MediaCondition::default(),
            notes: None,
        }
    }

    pub fn with_condition(mut self, media: MediaCondition, sleeve: MediaCondition) -> Self {
        self.condition = media;
        self.sleeve_condition = sleeve;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        let notes = notes.into();
        self.notes = (!notes.trim().is_empty()).then_some(notes);
        self
    }
}

/// Errors from collection publishing.
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("Unknown condition grade: {0}")]
    UnknownCondition(String),

    #[error("Release {0} not found")]
    ReleaseNotFound(u64),

    #[error("Publish failed: {0}")]
    PublishFailed(String),
}

/// Adds entries to a user's collection.
#[async_trait]
pub trait CollectionPublisher: Send + Sync {
    /// Publisher name for logging.
    fn name(&self) -> &str;

    /// Add the entry. Returns the provider's instance id for it.
    async fn publish(&self, entry: &CollectionEntry) -> Result<u64, CollectionError>;
}
