//! Backend collaborator seam.
//!
//! The hosted data service (auth, row storage, filtered queries) is
//! consumed as an opaque request/response API behind [`DataBackend`].
//! Rows travel as `serde_json::Value`; typed conversion happens at the
//! fetch boundary in the sync layer, never inside the stores.
//!
//! [`MemoryBackend`] is the in-process fake used by tests and demos: a
//! table of JSON rows with equality filtering, offset cursors, scriptable
//! failures, and a call log.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::SyncError;

/// Known backend tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Wheels,
    Domains,
    Scores,
    Priorities,
    Goals,
    GoalChecks,
    Activities,
    Plans,
    Reflections,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Wheels => "wheels",
            Table::Domains => "domains",
            Table::Scores => "scores",
            Table::Priorities => "priorities",
            Table::Goals => "goals",
            Table::GoalChecks => "goal_checks",
            Table::Activities => "activities",
            Table::Plans => "plans",
            Table::Reflections => "reflections",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query filter: equality predicates plus optional cursor/limit paging.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub eq: Vec<(String, Value)>,
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.eq.push((field.into(), value.into()));
        self
    }

    pub fn after(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Authenticated user reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: String,
}

/// The opaque backend API. Implementations must be cheap to clone behind
/// an `Arc`; the sync layer holds one for the application's lifetime.
#[async_trait]
pub trait DataBackend: Send + Sync {
    async fn select(&self, table: Table, filter: Filter) -> Result<Vec<Value>, SyncError>;

    async fn insert(&self, table: Table, row: Value) -> Result<Value, SyncError>;

    async fn update(&self, table: Table, id: &str, patch: Value) -> Result<Value, SyncError>;

    async fn delete(&self, table: Table, id: &str) -> Result<(), SyncError>;

    /// Current authenticated user, or `None` for guests.
    async fn current_user(&self) -> Option<UserRef>;
}

/// In-memory backend fake.
pub struct MemoryBackend {
    rows: Mutex<HashMap<Table, Vec<Value>>>,
    failing: Mutex<Vec<Table>>,
    select_log: Mutex<Vec<Table>>,
    user: Mutex<Option<UserRef>>,
    select_delay: Mutex<Option<std::time::Duration>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            failing: Mutex::new(Vec::new()),
            select_log: Mutex::new(Vec::new()),
            user: Mutex::new(Some(UserRef {
                id: "user-1".to_string(),
            })),
            select_delay: Mutex::new(None),
        }
    }

    /// Seed a table with rows.
    pub fn seed(&self, table: Table, rows: Vec<Value>) {
        self.rows.lock().insert(table, rows);
    }

    /// Make every operation on `table` fail until cleared.
    pub fn fail_table(&self, table: Table) {
        self.failing.lock().push(table);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn set_user(&self, user: Option<UserRef>) {
        *self.user.lock() = user;
    }

    /// Delay applied to each subsequent `select`, letting tests order the
    /// resolution of overlapping refreshes.
    pub fn set_select_delay(&self, delay: Option<std::time::Duration>) {
        *self.select_delay.lock() = delay;
    }

    /// Tables hit by `select`, in call order.
    pub fn selects(&self) -> Vec<Table> {
        self.select_log.lock().clone()
    }

    fn check_failure(&self, table: Table) -> Result<(), SyncError> {
        if self.failing.lock().contains(&table) {
            return Err(SyncError::Backend(format!("{table} unavailable")));
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_filter(row: &Value, filter: &Filter) -> bool {
    filter
        .eq
        .iter()
        .all(|(field, expected)| row.get(field) == Some(expected))
}

#[async_trait]
impl DataBackend for MemoryBackend {
    async fn select(&self, table: Table, filter: Filter) -> Result<Vec<Value>, SyncError> {
        self.select_log.lock().push(table);
        let delay = *self.select_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failure(table)?;

        let rows = self.rows.lock();
        let matched: Vec<Value> = rows
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_filter(row, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Offset cursor: good enough for a fake
        let offset = filter
            .cursor
            .as_deref()
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0);
        let mut page: Vec<Value> = matched.into_iter().skip(offset).collect();
        if let Some(limit) = filter.limit {
            page.truncate(limit);
        }
        Ok(page)
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, SyncError> {
        self.check_failure(table)?;
        self.rows.lock().entry(table).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: Table, id: &str, patch: Value) -> Result<Value, SyncError> {
        self.check_failure(table)?;
        let mut rows = self.rows.lock();
        let rows = rows.entry(table).or_default();
        let row = rows
            .iter_mut()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
            .ok_or_else(|| SyncError::RowNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;
        if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), SyncError> {
        self.check_failure(table)?;
        let mut rows = self.rows.lock();
        if let Some(rows) = rows.get_mut(&table) {
            rows.retain(|row| row.get("id").and_then(Value::as_str) != Some(id));
        }
        Ok(())
    }

    async fn current_user(&self) -> Option<UserRef> {
        self.user.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_select_with_eq_filter() {
        let backend = MemoryBackend::new();
        backend.seed(
            Table::Scores,
            vec![
                json!({"id": "s1", "domainId": "health", "score": 7}),
                json!({"id": "s2", "domainId": "finance", "score": 4}),
            ],
        );

        let rows = backend
            .select(Table::Scores, Filter::new().eq("domainId", "health"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "s1");
    }

    #[tokio::test]
    async fn test_cursor_and_limit_page_through() {
        let backend = MemoryBackend::new();
        let rows: Vec<Value> = (0..5).map(|i| json!({"id": format!("a{i}")})).collect();
        backend.seed(Table::Activities, rows);

        let first = backend
            .select(Table::Activities, Filter::new().limit(2))
            .await
            .unwrap();
        assert_eq!(first.len(), 2);

        let second = backend
            .select(
                Table::Activities,
                Filter::new().after(Some("2".to_string())).limit(2),
            )
            .await
            .unwrap();
        assert_eq!(second[0]["id"], "a2");
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let backend = MemoryBackend::new();
        backend.fail_table(Table::Domains);
        let err = backend
            .select(Table::Domains, Filter::new())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_update_merges_patch() {
        let backend = MemoryBackend::new();
        backend.seed(Table::Scores, vec![json!({"id": "s1", "score": 5})]);

        let updated = backend
            .update(Table::Scores, "s1", json!({"score": 9}))
            .await
            .unwrap();
        assert_eq!(updated["score"], 9);

        let missing = backend
            .update(Table::Scores, "nope", json!({"score": 1}))
            .await;
        assert!(matches!(missing, Err(SyncError::RowNotFound { .. })));
    }
}
