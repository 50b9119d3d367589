//! Odyssey store: edit buffer for the five-year alternative-plan exercise.
//!
//! The user sketches up to a handful of plans, rates each on energy,
//! confidence, and resources, and attaches milestones. Edits dirty the
//! store for the auto-saver; fetched plans arrive via `hydrate`.

use std::sync::Arc;

use crate::store::core::{replace_by_id, Callback, DirtyObservable, StoreCore, SubscriptionId};
use crate::types::{new_id, Milestone, Plan, MAX_SCORE};

#[derive(Debug, Clone, Default)]
pub struct OdysseyState {
    pub plans: Vec<Plan>,
}

pub struct OdysseyStore {
    core: StoreCore<OdysseyState>,
}

impl OdysseyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            core: StoreCore::new(OdysseyState::default()),
        })
    }

    pub fn hydrate(&self, plans: Vec<Plan>) {
        self.core.hydrate(|state| state.plans = plans);
    }

    pub fn with<R>(&self, f: impl FnOnce(&OdysseyState) -> R) -> R {
        self.core.read(f)
    }

    pub fn plans(&self) -> Vec<Plan> {
        self.core.read(|state| state.plans.clone())
    }

    /// Create a new plan with default mid-range sub-scores.
    pub fn add_plan(&self, title: impl Into<String>) -> String {
        let id = new_id();
        let plan = Plan {
            id: id.clone(),
            title: title.into(),
            energy: crate::types::DEFAULT_SCORE,
            confidence: crate::types::DEFAULT_SCORE,
            resources: crate::types::DEFAULT_SCORE,
            milestones: Vec::new(),
        };
        self.core.mutate(move |state| {
            state.plans.push(plan);
            true
        });
        id
    }

    pub fn remove_plan(&self, plan_id: &str) {
        self.core.mutate(|state| {
            let before = state.plans.len();
            state.plans.retain(|p| p.id != plan_id);
            state.plans.len() != before
        });
    }

    pub fn set_plan_title(&self, plan_id: &str, title: impl Into<String>) {
        let title = title.into();
        self.core.mutate(|state| {
            replace_by_id(&mut state.plans, |p| p.id == plan_id, |p| p.title = title.clone())
        });
    }

    /// Update a plan's sub-scores. Values clamp to 0..=10.
    pub fn rate_plan(&self, plan_id: &str, energy: u8, confidence: u8, resources: u8) {
        self.core.mutate(|state| {
            replace_by_id(
                &mut state.plans,
                |p| p.id == plan_id,
                |p| {
                    p.energy = energy.min(MAX_SCORE);
                    p.confidence = confidence.min(MAX_SCORE);
                    p.resources = resources.min(MAX_SCORE);
                },
            )
        });
    }

    /// Append a milestone to a plan. Year offsets clamp to 1..=5.
    pub fn add_milestone(&self, plan_id: &str, title: impl Into<String>, year: u8) -> Option<String> {
        let id = new_id();
        let milestone = Milestone {
            id: id.clone(),
            title: title.into(),
            year: year.clamp(1, 5),
            completed: false,
        };
        let mut added = false;
        self.core.mutate(|state| {
            added = replace_by_id(
                &mut state.plans,
                |p| p.id == plan_id,
                |p| p.milestones.push(milestone.clone()),
            );
            added
        });
        added.then_some(id)
    }

    pub fn set_milestone_completed(&self, plan_id: &str, milestone_id: &str, completed: bool) {
        self.core.mutate(|state| {
            let Some(plan) = state.plans.iter_mut().find(|p| p.id == plan_id) else {
                return false;
            };
            replace_by_id(
                &mut plan.milestones,
                |m| m.id == milestone_id,
                |m| m.completed = completed,
            )
        });
    }

    pub fn remove_milestone(&self, plan_id: &str, milestone_id: &str) {
        self.core.mutate(|state| {
            let Some(plan) = state.plans.iter_mut().find(|p| p.id == plan_id) else {
                return false;
            };
            let before = plan.milestones.len();
            plan.milestones.retain(|m| m.id != milestone_id);
            plan.milestones.len() != before
        });
    }

    pub fn reset(&self) {
        self.core.reset(OdysseyState::default());
    }
}

impl DirtyObservable for OdysseyStore {
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
