//! Refresh orchestration: parallel fetch, then one atomic hydrate.
//!
//! Each syncer issues its independent fetches concurrently, waits for all
//! of them, and hydrates its store exactly once with the combined result —
//! consumers never observe a state where some aggregates reflect the new
//! filters and others the old ones.
//!
//! Two guards bound what a resolved fetch may do:
//! - a monotonic request id: only the latest-issued `refresh` hydrates,
//!   stale resolutions are dropped (`SyncError::Stale`)
//! - a cancellation flag set by `teardown`: a late result after the
//!   consuming view is gone is dropped (`SyncError::Cancelled`)
//!
//! Fetch failures surface as a consumer-visible error string and a cleared
//! loading flag; the UI renders a retry affordance instead of crashing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::backend::{DataBackend, Filter, Table};
use crate::error::SyncError;
use crate::feed::FeedPage;
use crate::store::dashboard::{DashboardHydrate, DashboardStore};
use crate::store::odyssey::OdysseyStore;
use crate::store::wizard::{WizardHydrate, WizardStore};
use crate::types::{ActivityFeedItem, DashboardFilters, Domain, Plan, Priority, Score};

/// Activity feed page size.
pub const ACTIVITY_PAGE_SIZE: usize = 20;

/// Per-syncer refresh bookkeeping: request ids, cancellation, loading flag,
/// and the consumer-visible error string.
struct RefreshGuard {
    seq: AtomicU64,
    cancelled: AtomicBool,
    loading: AtomicBool,
    error: Mutex<Option<String>>,
}

impl RefreshGuard {
    fn new() -> Self {
        Self {
            seq: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
            loading: AtomicBool::new(false),
            error: Mutex::new(None),
        }
    }

    /// Claim a new request id and raise the loading flag.
    fn begin(&self) -> u64 {
        self.loading.store(true, Ordering::SeqCst);
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Check whether `request` may still apply its result. The loading
    /// flag and error slot belong to the latest-issued request, so a
    /// superseded request leaves both alone.
    fn finish(&self, request: u64, label: &str) -> Result<(), SyncError> {
        if request != self.seq.load(Ordering::SeqCst) {
            log::debug!("{label}: dropping stale refresh #{request}");
            return Err(SyncError::Stale);
        }
        self.loading.store(false, Ordering::SeqCst);
        if self.cancelled.load(Ordering::SeqCst) {
            log::debug!("{label}: dropping result after teardown");
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    fn fail(&self, request: u64, error: &SyncError) {
        if request != self.seq.load(Ordering::SeqCst) {
            return;
        }
        self.loading.store(false, Ordering::SeqCst);
        *self.error.lock() = Some(error.to_string());
    }

    fn succeed(&self) {
        *self.error.lock() = None;
    }
}

/// Deserialize fetched rows, skipping malformed ones with a warning.
/// Shape validation lives here at the fetch boundary, not in the stores.
fn rows_to<T: DeserializeOwned>(table: Table, rows: Vec<Value>) -> Vec<T> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::from_value::<T>(row) {
            Ok(item) => out.push(item),
            Err(e) => log::warn!("skipping malformed {table} row: {e}"),
        }
    }
    out
}

/// Build the activity filter for the current dashboard filter set.
fn activity_filter(filters: &DashboardFilters) -> Filter {
    let mut filter = Filter::new()
        .eq("year", filters.year)
        .eq("month", filters.month);
    if let Some(ref domain_id) = filters.domain_id {
        filter = filter.eq("domainId", domain_id.clone());
    }
    if let Some(ref goal_id) = filters.goal_id {
        filter = filter.eq("goalId", goal_id.clone());
    }
    filter
}

/// Fetch one feed page past `cursor`.
///
/// The cursor encodes the fetch offset and is opaque above this layer.
/// Requests one row beyond the page size to learn whether more exist.
async fn fetch_activity_page(
    backend: &dyn DataBackend,
    filters: &DashboardFilters,
    cursor: Option<String>,
) -> Result<FeedPage, SyncError> {
    let offset = cursor
        .as_deref()
        .and_then(|c| c.parse::<usize>().ok())
        .unwrap_or(0);
    let rows = backend
        .select(
            Table::Activities,
            activity_filter(filters)
                .after(cursor)
                .limit(ACTIVITY_PAGE_SIZE + 1),
        )
        .await?;

    let has_more = rows.len() > ACTIVITY_PAGE_SIZE;
    let mut items = rows_to::<ActivityFeedItem>(Table::Activities, rows);
    items.truncate(ACTIVITY_PAGE_SIZE);
    let next_cursor = has_more.then(|| (offset + ACTIVITY_PAGE_SIZE).to_string());

    Ok(FeedPage {
        items,
        next_cursor,
        has_more,
    })
}

/// Dashboard refresh orchestrator.
pub struct DashboardSyncer {
    backend: Arc<dyn DataBackend>,
    store: Arc<DashboardStore>,
    guard: RefreshGuard,
}

impl DashboardSyncer {
    pub fn new(backend: Arc<dyn DataBackend>, store: Arc<DashboardStore>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            store,
            guard: RefreshGuard::new(),
        })
    }

    /// Refetch every dashboard aggregate for the active filters and
    /// hydrate the store once. Safe to call repeatedly; overlapping calls
    /// race and only the latest-issued one lands.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let request = self.guard.begin();

        let user = match self.backend.current_user().await {
            Some(user) => user,
            None => {
                let err = SyncError::NotAuthenticated;
                self.guard.fail(request, &err);
                return Err(err);
            }
        };
        let filters = self.store.filters();
        let scope = Filter::new().eq("userId", user.id.clone());

        let (domains, scores, goals, activity) = tokio::join!(
            self.backend.select(Table::Domains, scope.clone()),
            self.backend.select(Table::Scores, scope.clone()),
            self.backend.select(Table::Goals, scope.clone()),
            fetch_activity_page(self.backend.as_ref(), &filters, None),
        );

        let parts = match (|| {
            Ok::<DashboardHydrate, SyncError>(DashboardHydrate {
                wheel_id: None,
                domains: Some(rows_to(Table::Domains, domains?)),
                scores: Some(rows_to(Table::Scores, scores?)),
                goals: Some(rows_to(Table::Goals, goals?)),
                activity: Some(activity?),
            })
        })() {
            Ok(parts) => parts,
            Err(e) => {
                log::warn!("dashboard refresh failed: {e}");
                self.guard.fail(request, &e);
                return Err(e);
            }
        };

        self.guard.finish(request, "dashboard")?;
        self.store.hydrate(parts);
        self.guard.succeed();
        Ok(())
    }

    /// Fetch the next feed page and append it. No-op when a page fetch is
    /// already in flight or the feed is exhausted.
    pub async fn load_more(&self) -> Result<(), SyncError> {
        if !self.store.begin_load_more() {
            return Ok(());
        }
        let filters = self.store.filters();
        let cursor = self.store.with(|s| s.activity_next_cursor.clone());

        match fetch_activity_page(self.backend.as_ref(), &filters, cursor).await {
            Ok(page) => {
                if self.guard.cancelled.load(Ordering::SeqCst) {
                    self.store.end_load_more();
                    return Err(SyncError::Cancelled);
                }
                self.store.append_feed(page);
                Ok(())
            }
            Err(e) => {
                log::warn!("activity load-more failed: {e}");
                self.store.end_load_more();
                *self.guard.error.lock() = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Apply a new filter set: the store resets the feed triple together
    /// with the filters, then everything refetches. Always a full replace,
    /// never an incremental patch.
    pub async fn set_filters(&self, filters: DashboardFilters) -> Result<(), SyncError> {
        self.store.set_filters(filters);
        self.refresh().await
    }

    /// Drop any in-flight results; called when the consuming view goes away.
    pub fn teardown(&self) {
        self.guard.cancelled.store(true, Ordering::SeqCst);
    }

    /// Consumer-visible error from the last refresh, if it failed.
    pub fn error(&self) -> Option<String> {
        self.guard.error.lock().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.guard.loading.load(Ordering::SeqCst)
    }
}

/// Wheel refresh orchestrator: loads one wheel's domains, scores, and
/// priorities into the wizard store. The wheel id parameter also covers
/// the partner view (a partner's shared wheel is just another wheel id).
pub struct WheelSyncer {
    backend: Arc<dyn DataBackend>,
    store: Arc<WizardStore>,
    guard: RefreshGuard,
}

impl WheelSyncer {
    pub fn new(backend: Arc<dyn DataBackend>, store: Arc<WizardStore>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            store,
            guard: RefreshGuard::new(),
        })
    }

    pub async fn refresh(&self, wheel_id: &str) -> Result<(), SyncError> {
        let request = self.guard.begin();
        let scope = Filter::new().eq("wheelId", wheel_id);

        let (domains, scores, priorities) = tokio::join!(
            self.backend.select(Table::Domains, scope.clone()),
            self.backend.select(Table::Scores, scope.clone()),
            self.backend.select(Table::Priorities, scope.clone()),
        );

        let parts = match (|| {
            Ok::<WizardHydrate, SyncError>(WizardHydrate {
                wheel_id: Some(wheel_id.to_string()),
                domains: Some(rows_to::<Domain>(Table::Domains, domains?)),
                scores: Some(rows_to::<Score>(Table::Scores, scores?)),
                priorities: Some(rows_to::<Priority>(Table::Priorities, priorities?)),
                ..WizardHydrate::default()
            })
        })() {
            Ok(parts) => parts,
            Err(e) => {
                log::warn!("wheel refresh failed: {e}");
                self.guard.fail(request, &e);
                return Err(e);
            }
        };

        self.guard.finish(request, "wheel")?;
        self.store.hydrate(parts);
        self.guard.succeed();
        Ok(())
    }

    pub fn teardown(&self) {
        self.guard.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn error(&self) -> Option<String> {
        self.guard.error.lock().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.guard.loading.load(Ordering::SeqCst)
    }
}

/// Odyssey refresh orchestrator: loads plans into the odyssey store and
/// returns the per-plan goal counts the insight generator consumes.
pub struct OdysseySyncer {
    backend: Arc<dyn DataBackend>,
    store: Arc<OdysseyStore>,
    guard: RefreshGuard,
}

impl OdysseySyncer {
    pub fn new(backend: Arc<dyn DataBackend>, store: Arc<OdysseyStore>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            store,
            guard: RefreshGuard::new(),
        })
    }

    pub async fn refresh(&self) -> Result<HashMap<String, usize>, SyncError> {
        let request = self.guard.begin();

        let user = match self.backend.current_user().await {
            Some(user) => user,
            None => {
                let err = SyncError::NotAuthenticated;
                self.guard.fail(request, &err);
                return Err(err);
            }
        };
        let scope = Filter::new().eq("userId", user.id);

        let (plans, goals) = tokio::join!(
            self.backend.select(Table::Plans, scope.clone()),
            self.backend.select(Table::Goals, scope.clone()),
        );

        let (plans, goals) = match (|| Ok::<_, SyncError>((plans?, goals?)))() {
            Ok(rows) => rows,
            Err(e) => {
                log::warn!("odyssey refresh failed: {e}");
                self.guard.fail(request, &e);
                return Err(e);
            }
        };

        let plans = rows_to::<Plan>(Table::Plans, plans);
        let mut goal_counts: HashMap<String, usize> = HashMap::new();
        for goal in goals {
            if let Some(plan_id) = goal.get("planId").and_then(Value::as_str) {
                *goal_counts.entry(plan_id.to_string()).or_insert(0) += 1;
            }
        }

        self.guard.finish(request, "odyssey")?;
        self.store.hydrate(plans);
        self.guard.succeed();
        Ok(goal_counts)
    }

    pub fn teardown(&self) {
        self.guard.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn error(&self) -> Option<String> {
        self.guard.error.lock().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.guard.loading.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::backend::MemoryBackend;
    use crate::store::DirtyObservable;

    fn seeded_backend() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            Table::Domains,
            vec![
                json!({"id": "d1", "userId": "user-1", "name": "Health", "orderPosition": 1}),
                json!({"id": "d2", "userId": "user-1", "name": "Finance", "orderPosition": 2}),
            ],
        );
        backend.seed(
            Table::Scores,
            vec![json!({"id": "s1", "userId": "user-1", "domainId": "d1", "score": 8})],
        );
        backend.seed(Table::Goals, vec![]);

        let filters = DashboardFilters::default();
        let activities: Vec<Value> = (0..30)
            .map(|i| {
                json!({
                    "id": format!("item-{i}"),
                    "kind": "score",
                    "title": format!("Activity {i}"),
                    "timestamp": "2025-06-18T12:00:00Z",
                    "year": filters.year,
                    "month": filters.month,
                })
            })
            .collect();
        backend.seed(Table::Activities, activities);
        backend
    }

    #[tokio::test]
    async fn test_refresh_hydrates_all_aggregates_at_once() {
        let backend = seeded_backend();
        let store = DashboardStore::new();
        let syncer = DashboardSyncer::new(backend.clone(), store.clone());

        syncer.refresh().await.unwrap();

        let state = store.snapshot();
        assert_eq!(state.domains.len(), 2);
        assert_eq!(state.scores.len(), 1);
        assert_eq!(state.activity_feed.len(), ACTIVITY_PAGE_SIZE);
        assert!(state.activity_has_more);
        assert_eq!(state.activity_next_cursor.as_deref(), Some("20"));
        assert_eq!(syncer.error(), None);
        assert!(!syncer.is_loading());
        assert!(!store.is_dirty(), "refresh never dirties the store");
    }

    #[tokio::test]
    async fn test_refresh_failure_surfaces_error_and_clears_loading() {
        let backend = seeded_backend();
        backend.fail_table(Table::Scores);
        let store = DashboardStore::new();
        let syncer = DashboardSyncer::new(backend.clone(), store.clone());

        let err = syncer.refresh().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(syncer.error().unwrap().contains("scores"));
        assert!(!syncer.is_loading());
        assert!(store.snapshot().domains.is_empty(), "no partial hydrate");
    }

    #[tokio::test]
    async fn test_refresh_requires_user() {
        let backend = seeded_backend();
        backend.set_user(None);
        let store = DashboardStore::new();
        let syncer = DashboardSyncer::new(backend, store);

        assert!(matches!(
            syncer.refresh().await,
            Err(SyncError::NotAuthenticated)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_refresh_is_dropped() {
        let backend = seeded_backend();
        let store = DashboardStore::new();
        let syncer = DashboardSyncer::new(backend.clone(), store.clone());

        // First refresh is slow; a second one issued later resolves first
        backend.set_select_delay(Some(Duration::from_millis(500)));
        let slow = {
            let syncer = syncer.clone();
            tokio::spawn(async move { syncer.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        backend.set_select_delay(None);
        syncer.refresh().await.unwrap();

        let slow_result = slow.await.unwrap();
        assert!(matches!(slow_result, Err(SyncError::Stale)));
        // The fast (latest-issued) refresh owns the final state
        assert_eq!(store.snapshot().domains.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_failure_leaves_latest_flags_alone() {
        let backend = seeded_backend();
        let store = DashboardStore::new();
        let syncer = DashboardSyncer::new(backend.clone(), store.clone());

        // Slow refresh that will fail once its delayed selects resolve
        backend.set_select_delay(Some(Duration::from_millis(500)));
        backend.fail_table(Table::Goals);
        let slow = {
            let syncer = syncer.clone();
            tokio::spawn(async move { syncer.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        // A newer refresh succeeds while the slow one is still in flight
        backend.set_select_delay(None);
        backend.clear_failures();
        syncer.refresh().await.unwrap();
        backend.fail_table(Table::Goals);

        let slow_result = slow.await.unwrap();
        assert!(matches!(slow_result, Err(SyncError::Backend(_))));
        // The superseded failure owns neither the flags nor the error slot
        assert_eq!(syncer.error(), None);
        assert!(!syncer.is_loading());
        assert_eq!(store.snapshot().domains.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_drops_late_result() {
        let backend = seeded_backend();
        backend.set_select_delay(Some(Duration::from_millis(500)));
        let store = DashboardStore::new();
        let syncer = DashboardSyncer::new(backend, store.clone());

        let pending = {
            let syncer = syncer.clone();
            tokio::spawn(async move { syncer.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        syncer.teardown();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(SyncError::Cancelled)));
        assert!(store.snapshot().domains.is_empty(), "late write dropped");
    }

    #[tokio::test]
    async fn test_load_more_appends_in_order() {
        let backend = seeded_backend();
        let store = DashboardStore::new();
        let syncer = DashboardSyncer::new(backend, store.clone());

        syncer.refresh().await.unwrap();
        syncer.load_more().await.unwrap();

        let state = store.snapshot();
        assert_eq!(state.activity_feed.len(), 30);
        for (i, item) in state.activity_feed.iter().enumerate() {
            assert_eq!(item.id, format!("item-{i}"));
        }
        assert!(!state.activity_has_more);
        assert_eq!(state.activity_next_cursor, None);
    }

    #[tokio::test]
    async fn test_load_more_when_exhausted_is_noop() {
        let backend = seeded_backend();
        let store = DashboardStore::new();
        let syncer = DashboardSyncer::new(backend.clone(), store.clone());

        syncer.refresh().await.unwrap();
        syncer.load_more().await.unwrap();
        let selects_before = backend.selects().len();

        syncer.load_more().await.unwrap();
        assert_eq!(backend.selects().len(), selects_before, "no extra fetch");
    }

    #[tokio::test]
    async fn test_filter_change_replaces_feed_and_cursor_together() {
        let backend = seeded_backend();
        let store = DashboardStore::new();
        let syncer = DashboardSyncer::new(backend.clone(), store.clone());
        syncer.refresh().await.unwrap();
        syncer.load_more().await.unwrap();
        assert_eq!(store.snapshot().activity_feed.len(), 30);

        // Narrowing to a domain with no activity rows fully replaces the
        // feed triple in one hydrate
        let mut filters = DashboardFilters::default();
        filters.domain_id = Some("d1".to_string());
        syncer.set_filters(filters.clone()).await.unwrap();

        let state = store.snapshot();
        assert_eq!(state.filters, filters);
        assert!(state.activity_feed.is_empty());
        assert_eq!(state.activity_next_cursor, None);
        assert!(!state.activity_has_more);
    }

    #[tokio::test]
    async fn test_malformed_rows_are_skipped_not_fatal() {
        let backend = seeded_backend();
        backend.seed(
            Table::Scores,
            vec![
                json!({"id": "s1", "userId": "user-1", "domainId": "d1", "score": 8}),
                json!({"userId": "user-1", "this is": "not a score"}),
            ],
        );
        let store = DashboardStore::new();
        let syncer = DashboardSyncer::new(backend, store.clone());

        syncer.refresh().await.unwrap();
        assert_eq!(store.snapshot().scores.len(), 1);
    }

    #[tokio::test]
    async fn test_wheel_refresh_hydrates_wizard_store() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            Table::Domains,
            vec![json!({"id": "d1", "wheelId": "w1", "name": "Health", "orderPosition": 1})],
        );
        backend.seed(
            Table::Scores,
            vec![json!({"id": "s1", "wheelId": "w1", "domainId": "d1", "score": 6})],
        );
        backend.seed(
            Table::Priorities,
            vec![json!({"wheelId": "w1", "domainId": "d1", "rank": 1, "isFocus": true})],
        );

        let store = WizardStore::new();
        let syncer = WheelSyncer::new(backend, store.clone());
        syncer.refresh("w1").await.unwrap();

        store.with(|s| {
            assert_eq!(s.wheel_id.as_deref(), Some("w1"));
            assert_eq!(s.domains.len(), 1);
            assert_eq!(s.scores[0].score, 6);
            assert!(s.priorities[0].is_focus);
        });
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn test_odyssey_refresh_returns_goal_counts() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            Table::Plans,
            vec![
                json!({"id": "p1", "userId": "user-1", "title": "Startup", "energy": 8, "confidence": 5, "resources": 4}),
                json!({"id": "p2", "userId": "user-1", "title": "Teach", "energy": 6, "confidence": 7, "resources": 6}),
            ],
        );
        backend.seed(
            Table::Goals,
            vec![
                json!({"id": "g1", "userId": "user-1", "domainId": "d1", "title": "Pitch deck", "frequency": "once", "planId": "p1"}),
                json!({"id": "g2", "userId": "user-1", "domainId": "d1", "title": "Call mentors", "frequency": "weekly", "planId": "p1"}),
            ],
        );

        let store = OdysseyStore::new();
        let syncer = OdysseySyncer::new(backend, store.clone());
        let counts = syncer.refresh().await.unwrap();

        assert_eq!(store.plans().len(), 2);
        assert_eq!(counts.get("p1"), Some(&2));
        assert_eq!(counts.get("p2"), None);
    }
}
