// Result types shared by the cache, queue, coordinator and API layers.

use serde::{Deserialize, Serialize};

/// Outcome of one completed region lookup.
///
/// Exactly one variant holds per lookup; "in progress" is a queue state, not
/// a result, and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegionResult {
    /// The profile disclosed a concrete place name.
    Resolved { region: String },
    /// Automation completed but the profile does not disclose a region.
    Undisclosed,
    /// The target site refused the automated visit. Retryable later.
    RateLimited,
    /// The looked-up account belongs to the signed-in viewer, whose profile
    /// never exposes the region dialog.
    SelfAccount,
}

impl RegionResult {
    /// Transient outcomes must stay out of the cache so a later attempt can
    /// run again; everything else short-circuits repeat lookups.
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, RegionResult::RateLimited)
    }

    pub fn region(&self) -> Option<&str> {
        match self {
            RegionResult::Resolved { region } => Some(region),
            _ => None,
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            RegionResult::Resolved { .. } => "resolved",
            RegionResult::Undisclosed => "undisclosed",
            RegionResult::RateLimited => "rate_limited",
            RegionResult::SelfAccount => "self_account",
        }
    }
}

/// Posting-style profile produced by the external analyzer. The service only
/// caches it; producing one is somebody else's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileResult {
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Counters for one cache namespace. Expired entries stay on disk until
/// overwritten, so `total_count` can exceed `valid_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub valid_count: i64,
    pub total_count: i64,
    pub expired_count: i64,
}
