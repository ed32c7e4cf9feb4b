//! Thread ordering and the hot-score contract

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Thread, ValidationError};

/// Thread listing order. Pinned threads always come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadSort {
    #[default]
    Newest,
    Oldest,
    /// Hot score descending
    Popular,
}

impl ThreadSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Popular => "popular",
        }
    }

    /// Compare two threads under this order.
    ///
    /// Ties fall back to newest-first and then id so the order is total.
    pub fn compare(&self, a: &Thread, b: &Thread) -> Ordering {
        b.is_pinned
            .cmp(&a.is_pinned)
            .then_with(|| match self {
                Self::Newest => b.created_at.cmp(&a.created_at),
                Self::Oldest => a.created_at.cmp(&b.created_at),
                Self::Popular => b
                    .hot_score
                    .total_cmp(&a.hot_score)
                    .then_with(|| b.created_at.cmp(&a.created_at)),
            })
            .then_with(|| a.id.cmp(&b.id))
    }
}

impl FromStr for ThreadSort {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "popular" | "hot" => Ok(Self::Popular),
            other => Err(ValidationError::InvalidVariant {
                field: "sort",
                value: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for ThreadSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort threads in place.
pub fn sort_threads(threads: &mut [Thread], sort: ThreadSort) {
    threads.sort_by(|a, b| sort.compare(a, b));
}

/// Popularity sort-key provider.
///
/// The engine never interprets the value beyond ordering by it; stores call
/// the configured implementation whenever a thread's engagement counters
/// change and persist the result as `hot_score`.
pub trait HotScore: Send + Sync {
    fn score(&self, thread: &Thread, now: DateTime<Utc>) -> f64;
}

/// Engagement divided by a power of the thread's age in hours.
#[derive(Debug, Clone, Copy)]
pub struct DecayingEngagement {
    pub gravity: f64,
}

impl Default for DecayingEngagement {
    fn default() -> Self {
        Self { gravity: 1.5 }
    }
}

impl HotScore for DecayingEngagement {
    fn score(&self, thread: &Thread, now: DateTime<Utc>) -> f64 {
        let engagement = 1.0
            + 2.0 * thread.replies_count as f64
            + thread.likes_count as f64
            + thread.views_count as f64 / 10.0;
        let age_hours = (now - thread.created_at).num_seconds().max(0) as f64 / 3600.0;
        engagement / (age_hours + 2.0).powf(self.gravity)
    }
}
