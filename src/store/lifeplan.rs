//! Lifeplan store: goals derived from the wheel plus their recurring
//! check-ins, keyed by canonical period keys.
//!
//! A check-in is an upsert on `(goal_id, period_key)`: checking the same
//! bucket twice flips the existing record instead of appending. Callers
//! compute the key with [`crate::period_key::period_key`].

use std::sync::Arc;

use crate::store::core::{replace_by_id, Callback, DirtyObservable, StoreCore, SubscriptionId};
use crate::types::{new_id, Frequency, Goal, GoalCheck};

#[derive(Debug, Clone, Default)]
pub struct LifeplanState {
    pub goals: Vec<Goal>,
    pub checks: Vec<GoalCheck>,
}

/// Partial hydrate payload.
#[derive(Debug, Clone, Default)]
pub struct LifeplanHydrate {
    pub goals: Option<Vec<Goal>>,
    pub checks: Option<Vec<GoalCheck>>,
}

pub struct LifeplanStore {
    core: StoreCore<LifeplanState>,
}

impl LifeplanStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            core: StoreCore::new(LifeplanState::default()),
        })
    }

    pub fn hydrate(&self, parts: LifeplanHydrate) {
        self.core.hydrate(|state| {
            if let Some(goals) = parts.goals {
                state.goals = goals;
            }
            if let Some(checks) = parts.checks {
                state.checks = checks;
            }
        });
    }

    pub fn with<R>(&self, f: impl FnOnce(&LifeplanState) -> R) -> R {
        self.core.read(f)
    }

    pub fn add_goal(
        &self,
        domain_id: impl Into<String>,
        title: impl Into<String>,
        frequency: Frequency,
    ) -> String {
        let id = new_id();
        let goal = Goal {
            id: id.clone(),
            domain_id: domain_id.into(),
            title: title.into(),
            frequency,
        };
        self.core.mutate(move |state| {
            state.goals.push(goal);
            true
        });
        id
    }

    pub fn rename_goal(&self, goal_id: &str, title: impl Into<String>) {
        let title = title.into();
        self.core.mutate(|state| {
            replace_by_id(&mut state.goals, |g| g.id == goal_id, |g| g.title = title.clone())
        });
    }

    /// Remove a goal and its check history. Unknown ids are no-ops.
    pub fn remove_goal(&self, goal_id: &str) {
        self.core.mutate(|state| {
            let before = state.goals.len();
            state.goals.retain(|g| g.id != goal_id);
            if state.goals.len() == before {
                return false;
            }
            state.checks.retain(|c| c.goal_id != goal_id);
            true
        });
    }

    /// Record a check-in for one recurrence bucket, upserting on
    /// `(goal_id, period_key)`. Unknown goals are no-ops.
    pub fn set_check(&self, goal_id: &str, period_key: &str, completed: bool) {
        self.core.mutate(|state| {
            if !state.goals.iter().any(|g| g.id == goal_id) {
                return false;
            }
            if replace_by_id(
                &mut state.checks,
                |c| c.goal_id == goal_id && c.period_key == period_key,
                |c| c.completed = completed,
            ) {
                return true;
            }
            state.checks.push(GoalCheck {
                goal_id: goal_id.to_string(),
                period_key: period_key.to_string(),
                completed,
            });
            true
        });
    }

    /// Whether a goal is completed in the given bucket. Missing records
    /// read as not completed.
    pub fn is_checked(&self, goal_id: &str, period_key: &str) -> bool {
        self.core.read(|state| {
            state
                .checks
                .iter()
                .find(|c| c.goal_id == goal_id && c.period_key == period_key)
                .map(|c| c.completed)
                .unwrap_or(false)
        })
    }

    pub fn reset(&self) {
        self.core.reset(LifeplanState::default());
    }
}

impl DirtyObservable for LifeplanStore {
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
