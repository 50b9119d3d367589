//! Dashboard store: the authoritative client view of one user's dashboard.
//!
//! Holds the reference collections the dashboard renders (domains, scores,
//! goals), the paginated activity feed, and the active filter set. Fetched
//! data arrives through `hydrate`/feed operations and never dirties the
//! store; only score edits made inline on the dashboard do.

use std::sync::Arc;

use crate::feed::FeedPage;
use crate::store::core::{replace_by_id, Callback, DirtyObservable, StoreCore, SubscriptionId};
use crate::types::{
    new_id, ActivityFeedItem, DashboardFilters, Domain, Goal, Score, MAX_SCORE,
};

/// Everything the dashboard renders from.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub wheel_id: Option<String>,
    pub domains: Vec<Domain>,
    pub scores: Vec<Score>,
    pub goals: Vec<Goal>,
    pub activity_feed: Vec<ActivityFeedItem>,
    pub activity_next_cursor: Option<String>,
    pub activity_has_more: bool,
    pub is_loading_more: bool,
    pub filters: DashboardFilters,
}

/// Partial hydrate payload: only provided fields are assigned.
#[derive(Debug, Clone, Default)]
pub struct DashboardHydrate {
    pub wheel_id: Option<String>,
    pub domains: Option<Vec<Domain>>,
    pub scores: Option<Vec<Score>>,
    pub goals: Option<Vec<Goal>>,
    pub activity: Option<FeedPage>,
}

pub struct DashboardStore {
    core: StoreCore<DashboardState>,
}

impl DashboardStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            core: StoreCore::new(DashboardState {
                filters: DashboardFilters::default(),
                ..DashboardState::default()
            }),
        })
    }

    /// Bulk-assign fetched data. One call per refresh: the feed page and
    /// its cursor land together with the other aggregates.
    pub fn hydrate(&self, parts: DashboardHydrate) {
        self.core.hydrate(|state| {
            if let Some(wheel_id) = parts.wheel_id {
                state.wheel_id = Some(wheel_id);
            }
            if let Some(domains) = parts.domains {
                state.domains = domains;
            }
            if let Some(scores) = parts.scores {
                state.scores = scores;
            }
            if let Some(goals) = parts.goals {
                state.goals = goals;
            }
            if let Some(page) = parts.activity {
                state.activity_feed = page.items;
                state.activity_next_cursor = page.next_cursor;
                state.activity_has_more = page.has_more;
                state.is_loading_more = false;
            }
        });
    }

    /// Read a view of the state under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&DashboardState) -> R) -> R {
        self.core.read(f)
    }

    pub fn snapshot(&self) -> DashboardState {
        self.core.read(|state| state.clone())
    }

    pub fn filters(&self) -> DashboardFilters {
        self.core.read(|state| state.filters.clone())
    }

    /// Replace the feed and its cursor in one operation (initial load or
    /// filter change). Fetched data: does not dirty.
    pub fn set_feed(&self, page: FeedPage) {
        self.core.hydrate(|state| {
            state.activity_feed = page.items;
            state.activity_next_cursor = page.next_cursor;
            state.activity_has_more = page.has_more;
            state.is_loading_more = false;
        });
    }

    /// Append a "load more" page, preserving the existing prefix order.
    /// No id dedupe: the fetch contract keeps pages disjoint.
    pub fn append_feed(&self, page: FeedPage) {
        self.core.hydrate(|state| {
            state.activity_feed.extend(page.items);
            state.activity_next_cursor = page.next_cursor;
            state.activity_has_more = page.has_more;
            state.is_loading_more = false;
        });
    }

    /// Claim the load-more guard. Returns false when a page fetch is
    /// already in flight (the caller should bail out).
    pub fn begin_load_more(&self) -> bool {
        let mut claimed = false;
        self.core.hydrate(|state| {
            if !state.is_loading_more && state.activity_has_more {
                state.is_loading_more = true;
                claimed = true;
            }
        });
        claimed
    }

    /// Release the load-more guard without appending (fetch failed).
    pub fn end_load_more(&self) {
        self.core.hydrate(|state| {
            state.is_loading_more = false;
        });
    }

    /// Replace the filter set and reset the feed triple with it, so the
    /// feed/cursor pair is never inconsistent with the active filters.
    /// View state, not an edit: does not dirty. The caller refetches.
    pub fn set_filters(&self, filters: DashboardFilters) {
        self.core.hydrate(|state| {
            state.filters = filters;
            state.activity_feed = Vec::new();
            state.activity_next_cursor = None;
            state.activity_has_more = false;
            state.is_loading_more = false;
        });
    }

    /// Inline score edit from the dashboard. Upserts when the domain has no
    /// score row yet; unknown domains are no-ops.
    pub fn update_score(&self, domain_id: &str, value: u8, notes: Option<String>) {
        let value = value.min(MAX_SCORE);
        self.core.mutate(|state| {
            if replace_by_id(
                &mut state.scores,
                |s| s.domain_id == domain_id,
                |s| {
                    s.score = value;
                    if notes.is_some() {
                        s.notes = notes.clone();
                    }
                },
            ) {
                return true;
            }
            if state.domains.iter().any(|d| d.id == domain_id) {
                state.scores.push(Score {
                    id: new_id(),
                    domain_id: domain_id.to_string(),
                    score: value,
                    notes,
                });
                return true;
            }
            false
        });
    }

    pub fn reset(&self) {
        self.core.reset(DashboardState {
            filters: DashboardFilters::default(),
            ..DashboardState::default()
        });
    }
}

impl DirtyObservable for DashboardStore {
    fn is_dirty(&self) -> bool {
        self.core.is_dirty()
    }

    fn generation(&self) -> u64 {
        self.core.generation()
    }

    fn mark_clean(&self) {
        self.core.mark_clean()
    }

    fn mark_clean_at(&self, generation: u64) -> bool {
        self.core.mark_clean_at(generation)
    }

    fn subscribe(&self, callback: Callback) -> SubscriptionId {
        self.core.subscribe(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.core.unsubscribe(id)
    }
}
