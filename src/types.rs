//! View-model types shared across stores, syncers, and insight generators.
//!
//! These mirror backend rows but are not identical to them: they carry only
//! the fields the client edits or displays, in camelCase on the wire so the
//! shell can pass them straight through to its rendering layer.

use chrono::{DateTime, Datelike, Local, Utc};
use serde::{Deserialize, Serialize};

/// Score range used for wheel scores and plan sub-scores.
pub const MAX_SCORE: u8 = 10;

/// Score assumed for a domain that has no score row yet.
pub const DEFAULT_SCORE: u8 = 5;

/// Maximum number of domains that may be marked as focus per wheel.
pub const MAX_FOCUS_DOMAINS: usize = 3;

/// A user-defined life area on the wheel (e.g. "Health", "Finance").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    /// Display order on the wheel, 1-based.
    pub order_position: u32,
}

/// One score per (wheel, domain) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub id: String,
    pub domain_id: String,
    #[serde(default = "default_score")]
    pub score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn default_score() -> u8 {
    DEFAULT_SCORE
}

/// A domain's position in the priority ordering, plus its focus marker.
///
/// Ranks form a contiguous permutation of 1..=N over the wheel's domains;
/// at most [`MAX_FOCUS_DOMAINS`] entries carry `is_focus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Priority {
    pub domain_id: String,
    pub rank: u32,
    #[serde(default)]
    pub is_focus: bool,
}

/// Recurrence cadence for goals and check-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Once,
}

/// A goal attached to a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub domain_id: String,
    pub title: String,
    pub frequency: Frequency,
}

/// Completion record for one goal in one recurrence bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalCheck {
    pub goal_id: String,
    /// Canonical bucket key from [`crate::period_key::period_key`].
    pub period_key: String,
    pub completed: bool,
}

/// One entry in the dashboard activity feed, ordered by recency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFeedItem {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
}

/// A milestone inside a five-year plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: String,
    pub title: String,
    /// Year offset within the plan, 1..=5.
    pub year: u8,
    #[serde(default)]
    pub completed: bool,
}

/// A five-year alternative life plan ("odyssey") with self-rated sub-scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub title: String,
    #[serde(default = "default_score")]
    pub energy: u8,
    #[serde(default = "default_score")]
    pub confidence: u8,
    #[serde(default = "default_score")]
    pub resources: u8,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
}

impl Plan {
    /// Average of the three sub-scores, used to rank plans against each other.
    pub fn average(&self) -> f64 {
        f64::from(u16::from(self.energy) + u16::from(self.confidence) + u16::from(self.resources))
            / 3.0
    }
}

/// A guided-wizard reflection answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflection {
    pub id: String,
    pub prompt: String,
    pub answer: String,
}

/// Active dashboard filter set. Derived into/from URL query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardFilters {
    pub year: i32,
    /// 1-based calendar month.
    pub month: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
}

impl Default for DashboardFilters {
    fn default() -> Self {
        let now = Local::now();
        Self {
            year: now.year(),
            month: now.month(),
            domain_id: None,
            goal_id: None,
        }
    }
}

/// Category of a derived insight. Order here is display priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Highest,
    Lowest,
    Gap,
    Focus,
    Strength,
    Concern,
    Suggestion,
}

/// A human-readable observation derived from current scores or plans.
///
/// Ephemeral: recomputed on every render, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub kind: InsightKind,
    pub text: String,
}

impl Insight {
    pub fn new(kind: InsightKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Generate a fresh client-side id for a new entity.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
