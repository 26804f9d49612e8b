//! File-backed [`ListingSearch`]: a JSON array of listing payloads, filtered
//! per condition and ranked by token overlap with the query text.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use canho_core::{Condition, ListingFilter, ListingHit};
use canho_dialog::ListingSearch;
use serde_json::{Map, Value};
use tracing::debug;

pub struct DatasetListings {
    listings: Vec<Map<String, Value>>,
}

impl DatasetListings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading listing dataset `{}`", path.display()))?;
        let listings: Vec<Map<String, Value>> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing listing dataset `{}`", path.display()))?;
        debug!(count = listings.len(), path = %path.display(), "listing dataset loaded");
        Ok(Self { listings })
    }

    #[cfg(test)]
    fn from_values(listings: Vec<Map<String, Value>>) -> Self {
        Self { listings }
    }
}

#[async_trait]
impl ListingSearch for DatasetListings {
    async fn search(
        &self,
        filter: &ListingFilter,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ListingHit>> {
        let query_tokens = tokenize(query);
        let mut hits: Vec<ListingHit> = self
            .listings
            .iter()
            .filter(|listing| matches_filter(listing, filter))
            .map(|listing| ListingHit {
                score: overlap_score(listing, &query_tokens),
                fields: listing.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn find_by_unit_code(&self, unit_code: &str) -> Result<Option<ListingHit>> {
        let wanted = unit_code.trim();
        Ok(self
            .listings
            .iter()
            .find(|listing| {
                listing_unit_code(listing)
                    .map(|code| code.eq_ignore_ascii_case(wanted))
                    .unwrap_or(false)
            })
            .map(|listing| ListingHit { score: 1.0, fields: listing.clone() }))
    }
}

fn listing_unit_code(listing: &Map<String, Value>) -> Option<&str> {
    listing
        .get("ma_can_ho")
        .or_else(|| listing.get("ma_can"))
        .and_then(Value::as_str)
}

fn matches_filter(listing: &Map<String, Value>, filter: &ListingFilter) -> bool {
    filter.must.iter().all(|entry| {
        let Some(actual) = listing.get(&entry.field) else {
            return false;
        };
        match &entry.condition {
            Condition::Match { value } => values_match(actual, value),
            Condition::Range { gte, lte } => {
                let Some(number) = actual.as_f64() else {
                    return false;
                };
                gte.map_or(true, |bound| number >= bound)
                    && lte.map_or(true, |bound| number <= bound)
            }
        }
    })
}

fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(actual), Some(expected)) => (actual - expected).abs() < f64::EPSILON,
        _ => match (actual.as_str(), expected.as_str()) {
            (Some(actual), Some(expected)) => {
                normalize_token(actual) == normalize_token(expected)
            }
            _ => actual == expected,
        },
    }
}

fn overlap_score(listing: &Map<String, Value>, query_tokens: &HashSet<String>) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let mut listing_tokens = HashSet::new();
    for value in listing.values() {
        if let Some(text) = value.as_str() {
            listing_tokens.extend(tokenize(text));
        }
    }
    let overlap = query_tokens.intersection(&listing_tokens).count();
    overlap as f32 / query_tokens.len() as f32
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == '.')
        .map(normalize_token)
        .filter(|token| !token.is_empty())
        .collect()
}

fn normalize_token(token: &str) -> String {
    token.trim().to_lowercase()
}
