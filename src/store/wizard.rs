//! Wizard store: the edit buffer for the guided wheel-creation flow.
//!
//! Holds the draft wheel while the user walks the steps: title, domains,
//! scores, priorities, reflections. Every edit dirties the store and the
//! auto-saver flushes it; `hydrate` restores a previously saved draft.
//!
//! Structural invariants enforced here rather than at the call sites:
//! priority ranks stay a contiguous permutation of 1..=N across add,
//! remove, and reorder, and at most three domains carry the focus marker.

use std::sync::Arc;

use crate::store::core::{replace_by_id, Callback, DirtyObservable, StoreCore, SubscriptionId};
use crate::types::{
    new_id, Domain, Priority, Reflection, Score, MAX_FOCUS_DOMAINS, MAX_SCORE,
};

/// Draft wheel being assembled by the wizard.
#[derive(Debug, Clone, Default)]
pub struct WizardState {
    pub wheel_id: Option<String>,
    pub title: String,
    /// Current wizard step, 0-based.
    pub step: u32,
    pub domains: Vec<Domain>,
    pub scores: Vec<Score>,
    pub priorities: Vec<Priority>,
    pub reflections: Vec<Reflection>,
}

/// Partial hydrate payload for restoring a saved draft.
#[derive(Debug, Clone, Default)]
pub struct WizardHydrate {
    pub wheel_id: Option<String>,
    pub title: Option<String>,
    pub step: Option<u32>,
    pub domains: Option<Vec<Domain>>,
    pub scores: Option<Vec<Score>>,
    pub priorities: Option<Vec<Priority>>,
    pub reflections: Option<Vec<Reflection>>,
}

pub struct WizardStore {
    core: StoreCore<WizardState>,
}

impl WizardStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            core: StoreCore::new(WizardState::default()),
        })
    }

    pub fn hydrate(&self, parts: WizardHydrate) {
        self.core.hydrate(|state| {
            if let Some(wheel_id) = parts.wheel_id {
                state.wheel_id = Some(wheel_id);
            }
            if let Some(title) = parts.title {
                state.title = title;
            }
            if let Some(step) = parts.step {
                state.step = step;
            }
            if let Some(domains) = parts.domains {
                state.domains = domains;
            }
            if let Some(scores) = parts.scores {
                state.scores = scores;
            }
            if let Some(priorities) = parts.priorities {
                state.priorities = priorities;
            }
            if let Some(reflections) = parts.reflections {
                state.reflections = reflections;
            }
        });
    }

    pub fn with<R>(&self, f: impl FnOnce(&WizardState) -> R) -> R {
        self.core.read(f)
    }

    pub fn snapshot(&self) -> WizardState {
        self.core.read(|state| state.clone())
    }

    pub fn set_title(&self, title: impl Into<String>) {
        let title = title.into();
        self.core.mutate(|state| {
            if state.title == title {
                return false;
            }
            state.title = title;
            true
        });
    }

    pub fn set_step(&self, step: u32) {
        self.core.mutate(|state| {
            if state.step == step {
                return false;
            }
            state.step = step;
            true
        });
    }

    /// Add a domain at the end of the wheel. Also appends a priority at the
    /// lowest rank so the rank permutation stays contiguous. Returns the
    /// new domain's id.
    pub fn add_domain(&self, name: impl Into<String>, icon: impl Into<String>) -> String {
        let id = new_id();
        let (name, icon) = (name.into(), icon.into());
        let domain_id = id.clone();
        self.core.mutate(move |state| {
            let position = state.domains.len() as u32 + 1;
            state.domains.push(Domain {
                id: domain_id.clone(),
                name,
                icon,
                order_position: position,
            });
            state.priorities.push(Priority {
                domain_id,
                rank: position,
                is_focus: false,
            });
            true
        });
        id
    }

    /// Remove a domain and its score/priority rows, then renumber order
    /// positions and ranks back to contiguous 1..=N. Unknown ids are no-ops.
    pub fn remove_domain(&self, domain_id: &str) {
        self.core.mutate(|state| {
            let before = state.domains.len();
            state.domains.retain(|d| d.id != domain_id);
            if state.domains.len() == before {
                return false;
            }
            state.scores.retain(|s| s.domain_id != domain_id);
            state.priorities.retain(|p| p.domain_id != domain_id);
            renumber(state);
            true
        });
    }

    pub fn rename_domain(&self, domain_id: &str, name: impl Into<String>) {
        let name = name.into();
        self.core.mutate(|state| {
            replace_by_id(&mut state.domains, |d| d.id == domain_id, |d| d.name = name.clone())
        });
    }

    /// Score a domain, upserting the score row. Values clamp to 0..=10.
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

    /// Move a domain to a new 1-based rank, shifting the others. Ranks
    /// outside 1..=N clamp to the nearest end.
    pub fn move_domain(&self, domain_id: &str, new_rank: u32) {
        self.core.mutate(|state| {
            let count = state.priorities.len() as u32;
            if count == 0 {
                return false;
            }
            let new_rank = new_rank.clamp(1, count);
            let Some(current) = state
                .priorities
                .iter()
                .find(|p| p.domain_id == domain_id)
                .map(|p| p.rank)
            else {
                return false;
            };
            if current == new_rank {
                return false;
            }
            for priority in state.priorities.iter_mut() {
                if priority.domain_id == domain_id {
                    priority.rank = new_rank;
                } else if current < new_rank
                    && priority.rank > current
                    && priority.rank <= new_rank
                {
                    priority.rank -= 1;
                } else if current > new_rank
                    && priority.rank >= new_rank
                    && priority.rank < current
                {
                    priority.rank += 1;
                }
            }
            true
        });
    }

    /// Toggle a domain's focus marker. Marking a fourth focus domain is a
    /// no-op: the focus set is capped at three.
    pub fn toggle_focus(&self, domain_id: &str) {
        self.core.mutate(|state| {
            let focus_count = state.priorities.iter().filter(|p| p.is_focus).count();
            let Some(priority) = state
                .priorities
                .iter_mut()
                .find(|p| p.domain_id == domain_id)
            else {
                return false;
            };
            if !priority.is_focus && focus_count >= MAX_FOCUS_DOMAINS {
                log::debug!("focus cap reached, ignoring toggle for {domain_id}");
                return false;
            }
            priority.is_focus = !priority.is_focus;
            true
        });
    }

    /// Record a reflection answer, upserting by prompt.
    pub fn set_reflection(&self, prompt: impl Into<String>, answer: impl Into<String>) {
        let (prompt, answer) = (prompt.into(), answer.into());
        self.core.mutate(|state| {
            if replace_by_id(
                &mut state.reflections,
                |r| r.prompt == prompt,
                |r| r.answer = answer.clone(),
            ) {
                return true;
            }
            state.reflections.push(Reflection {
                id: new_id(),
                prompt,
                answer,
            });
            true
        });
    }

    pub fn reset(&self) {
        self.core.reset(WizardState::default());
    }
}

/// Renumber order positions (wheel order) and ranks (priority order) back
/// to contiguous 1..=N after a removal.
fn renumber(state: &mut WizardState) {
    for (index, domain) in state.domains.iter_mut().enumerate() {
        domain.order_position = index as u32 + 1;
    }
    state.priorities.sort_by_key(|p| p.rank);
    for (index, priority) in state.priorities.iter_mut().enumerate() {
        priority.rank = index as u32 + 1;
    }
}

impl DirtyObservable for WizardStore {
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
