//! Token-overlap scorer used when the reasoning service is unavailable.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::catalog::Candidate;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "be",
];

/// Words that appear on nearly every record and say little about a variant.
const GENERIC_WORDS: &[&str] = &["vinyl", "lp", "record", "edition", "pressing", "press"];

const GENERIC_WEIGHT: f32 = 0.25;
const EXACT_HIT: f32 = 1.0;
const FUZZY_HIT: f32 = 0.8;
const PARTIAL_HIT: f32 = 0.5;
const MIN_PREFIX_LEN: usize = 4;

/// "180 gram", "180 g" and "180gr" all mean "180g".
static WEIGHT_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\b(\d{2,3})\s*(?:grams?|gr|g)\b").ok());

/// Score with no descriptors to compare against.
pub const NEUTRAL_SCORE: f32 = 0.5;

/// Heuristic score for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicScore {
    pub score: f32,
    /// Descriptor tokens found in the candidate.
    pub matched: Vec<String>,
    /// Descriptor tokens that were compared.
    pub compared: usize,
}

impl HeuristicScore {
    pub fn explanation(&self) -> String {
        if self.compared == 0 {
            "no variant descriptors to compare".to_string()
        } else if self.matched.is_empty() {
            "no descriptor terms found in title or formats".to_string()
        } else {
            format!("matched {}", self.matched.join(", "))
        }
    }
}

/// Deterministic overlap between variant descriptors and a candidate's
/// title and format descriptors.
#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, variant_descriptors: &[String], candidate: &Candidate) -> HeuristicScore {
        let wanted = tokenize(variant_descriptors.iter().map(String::as_str));
        if wanted.is_empty() {
            return HeuristicScore {
                score: NEUTRAL_SCORE,
                matched: Vec::new(),
                compared: 0,
            };
        }

        let have = tokenize(
            std::iter::once(candidate.title.as_str())
                .chain(candidate.formats.iter().map(String::as_str)),
        );

        let mut total = 0.0;
        let mut max = 0.0;
        let mut matched = Vec::new();

        for token in &wanted {
            let weight = if GENERIC_WORDS.contains(&token.as_str()) {
                GENERIC_WEIGHT
            } else {
                1.0
            };
            max += weight;

            let hit = token_hit(token, &have);
            if hit > 0.0 {
                matched.push(token.clone());
            }
            total += weight * hit;
        }

        HeuristicScore {
            score: (total / max).clamp(0.0, 1.0),
            matched,
            compared: wanted.len(),
        }
    }
}

/// Best hit of `token` against the candidate tokens.
fn token_hit(token: &str, have: &[String]) -> f32 {
    if have.iter().any(|t| t == token) {
        EXACT_HIT
    } else if have
        .iter()
        .any(|t| is_fuzzy_match(token, t))
    {
        FUZZY_HIT
    } else if have.iter().any(|t| is_partial_match(token, t)) {
        PARTIAL_HIT
    } else {
        0.0
    }
}

/// Partial hits stay on word boundaries: a quantity joined to a unit
/// ("2lp" / "lp") or a prefix of at least four characters ("anniv" /
/// "anniversary"). Letters inside a word never count, so "red" does not
/// hit "remastered".
fn is_partial_match(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short == long {
        return true;
    }

    let after_qty = long.trim_start_matches(|c: char| c.is_ascii_digit());
    if after_qty.len() < long.len() && after_qty.trim_start_matches('x') == short {
        return true;
    }

    short.chars().count() >= MIN_PREFIX_LEN && long.starts_with(short)
}

/// Lower-cased alphanumeric words minus stop words, first occurrence kept.
fn tokenize<'a>(texts: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for text in texts {
        let text = normalize_weights(&text.to_lowercase());
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 1)
            .filter(|w| !STOP_WORDS.contains(w))
        {
            if !tokens.iter().any(|t| t == word) {
                tokens.push(word.to_string());
            }
        }
    }
    tokens
}

fn normalize_weights(text: &str) -> String {
    match WEIGHT_PATTERN.as_ref() {
        Some(re) => re.replace_all(text, "${1}g").into_owned(),
        None => text.to_string(),
    }
}

/// Small edit distance between words of 4+ characters (spelling variants
/// like "translucent"/"transluscent").
fn is_fuzzy_match(a: &str, b: &str) -> bool {
    let a_len = a.chars().count();
    let b_len = b.chars().count();

    if a_len.abs_diff(b_len) > 2 || a_len < 4 || b_len < 4 {
        return false;
    }

    let threshold = if a_len >= 8 { 2 } else { 1 };
    levenshtein_distance(a, b) <= threshold
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}
