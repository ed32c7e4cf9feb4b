//! Ranked search contract: merging thread and post hits
//!
//! Relevance itself comes from the index (full-text ranking in the store);
//! this module only discriminates, orders and pages the merged result.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ValidationError;

const MAX_QUERY_LEN: usize = 200;

/// Which record types to search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    #[default]
    All,
    Threads,
    Posts,
}

impl SearchScope {
    pub fn includes_threads(&self) -> bool {
        matches!(self, Self::All | Self::Threads)
    }

    pub fn includes_posts(&self) -> bool {
        matches!(self, Self::All | Self::Posts)
    }
}

impl FromStr for SearchScope {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "threads" => Ok(Self::Threads),
            "posts" => Ok(Self::Posts),
            other => Err(ValidationError::InvalidVariant {
                field: "type",
                value: other.to_owned(),
            }),
        }
    }
}

/// Result entry discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Thread,
    Post,
}

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "type")]
    pub kind: SearchKind,
    pub id: Uuid,
    pub thread_id: Uuid,
    pub category_id: Uuid,
    /// Thread title (for posts, the title of the containing thread)
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
    pub relevance: f64,
    pub created_at: DateTime<Utc>,
}

/// Validated, trimmed search query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "query" });
        }
        if trimmed.chars().count() > MAX_QUERY_LEN {
            return Err(ValidationError::TooLong {
                field: "query",
                max: MAX_QUERY_LEN,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased whitespace-separated terms.
    pub fn terms(&self) -> Vec<String> {
        self.0.split_whitespace().map(str::to_lowercase).collect()
    }
}

/// Relevance desc, then recency desc, then id for a total order.
pub fn compare_results(a: &SearchResult, b: &SearchResult) -> Ordering {
    b.relevance
        .total_cmp(&a.relevance)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Merge per-type hits, order them, and cut the requested window.
pub fn merge_results(
    threads: Vec<SearchResult>,
    posts: Vec<SearchResult>,
    limit: usize,
    offset: usize,
) -> Vec<SearchResult> {
    let mut merged = threads;
    merged.extend(posts);
    merged.sort_by(compare_results);
    merged.into_iter().skip(offset).take(limit).collect()
}

/// Term-frequency relevance used by stores without a full-text index.
///
/// Each occurrence of a query term counts once; title matches count double.
pub fn term_relevance(terms: &[String], title: Option<&str>, content: &str) -> f64 {
    let content = content.to_lowercase();
    let title = title.map(str::to_lowercase);
    terms
        .iter()
        .map(|term| {
            let body = content.matches(term.as_str()).count() as f64;
            let head = title
                .as_deref()
                .map(|t| t.matches(term.as_str()).count() as f64 * 2.0)
                .unwrap_or(0.0);
            body + head
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn hit(kind: SearchKind, relevance: f64, age_mins: i64) -> SearchResult {
        SearchResult {
            kind,
            id: Uuid::new_v4(),
            thread_id: Uuid::nil(),
            category_id: Uuid::nil(),
            title: String::new(),
            content: String::new(),
            author_id: Uuid::nil(),
            relevance,
            created_at: Utc::now() - TimeDelta::minutes(age_mins),
        }
    }

    #[test]
    fn merges_by_relevance_then_recency() {
        let threads = vec![hit(SearchKind::Thread, 0.5, 10), hit(SearchKind::Thread, 0.9, 50)];
        let posts = vec![hit(SearchKind::Post, 0.5, 1)];
        let merged = merge_results(threads, posts, 10, 0);

        assert_eq!(merged[0].relevance, 0.9);
        // equal relevance: the newer post wins
        assert_eq!(merged[1].kind, SearchKind::Post);
        assert_eq!(merged[2].kind, SearchKind::Thread);
    }

    #[test]
    fn window_is_applied_after_merge() {
        let threads = (0..5).map(|i| hit(SearchKind::Thread, i as f64, 0)).collect();
        let merged = merge_results(threads, vec![], 2, 1);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].relevance, 3.0);
    }

    #[test]
    fn type_discriminator_on_the_wire() {
        let json = serde_json::to_value(hit(SearchKind::Post, 1.0, 0)).unwrap();
        assert_eq!(json["type"], "post");
        assert!(json.get("relevance").is_some());
    }

    #[test]
    fn term_relevance_weights_titles() {
        let terms = SearchQuery::new("Rust borrow").unwrap().terms();
        let plain = term_relevance(&terms, None, "rust and the borrow checker");
        let titled = term_relevance(&terms, Some("Rust"), "rust and the borrow checker");
        assert_eq!(plain, 2.0);
        assert_eq!(titled, 4.0);
    }

    #[test]
    fn rejects_blank_query() {
        assert!(SearchQuery::new("   ").is_err());
    }
}
