//! Guest store: the try-before-signup edit buffer.
//!
//! Shaped like the wizard draft, plus a guest token so the backend can
//! claim the data after signup. Unlike every other store this one persists
//! its full state to a local JSON snapshot (`~/.lifewheel/guest_session.json`)
//! so a guest's wheel survives a restart.
//!
//! The snapshot carries an explicit `version` field. Loads accept the
//! current version only and fall back to a fresh session otherwise; guest
//! data is low-stakes enough that a migration ladder waits until a second
//! version exists.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::store::core::{replace_by_id, Callback, DirtyObservable, StoreCore, SubscriptionId};
use crate::types::{new_id, Domain, Priority, Reflection, Score, MAX_FOCUS_DOMAINS, MAX_SCORE};

/// Current snapshot schema version.
const SNAPSHOT_VERSION: u32 = 1;

/// Snapshot file name inside the state directory.
const SNAPSHOT_FILE: &str = "guest_session.json";

#[derive(Debug, Clone)]
pub struct GuestState {
    pub guest_token: String,
    pub wheel_id: Option<String>,
    pub title: String,
    pub domains: Vec<Domain>,
    pub scores: Vec<Score>,
    pub priorities: Vec<Priority>,
    pub reflections: Vec<Reflection>,
}

impl Default for GuestState {
    fn default() -> Self {
        Self {
            guest_token: new_id(),
            wheel_id: None,
            title: String::new(),
            domains: Vec::new(),
            scores: Vec::new(),
            priorities: Vec::new(),
            reflections: Vec::new(),
        }
    }
}

/// On-disk shape of the persisted guest session.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuestSnapshot {
    version: u32,
    guest_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wheel_id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    domains: Vec<Domain>,
    #[serde(default)]
    scores: Vec<Score>,
    #[serde(default)]
    priorities: Vec<Priority>,
    #[serde(default)]
    reflections: Vec<Reflection>,
}

pub struct GuestStore {
    core: StoreCore<GuestState>,
    snapshot_path: PathBuf,
}

impl GuestStore {
    /// Create a guest store backed by the default snapshot location
    /// (`~/.lifewheel/guest_session.json`), restoring any prior session.
    pub fn new() -> Arc<Self> {
        Self::with_snapshot_path(default_snapshot_path())
    }

    /// Create a guest store with an explicit snapshot path (tests point
    /// this at a temp directory).
    pub fn with_snapshot_path(path: PathBuf) -> Arc<Self> {
        let state = match load_snapshot(&path) {
            Some(snapshot) => snapshot,
            None => GuestState::default(),
        };
        Arc::new(Self {
            core: StoreCore::new(state),
            snapshot_path: path,
        })
    }

    pub fn with<R>(&self, f: impl FnOnce(&GuestState) -> R) -> R {
        self.core.read(f)
    }

    pub fn guest_token(&self) -> String {
        self.core.read(|state| state.guest_token.clone())
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

    /// Write the current state to the snapshot file.
    ///
    /// This is the persistence callback the auto-saver drives; it does not
    /// clear the dirty flag itself (the scheduler does, on success).
    pub fn persist(&self) -> Result<(), SyncError> {
        let snapshot = self.core.read(|state| GuestSnapshot {
            version: SNAPSHOT_VERSION,
            guest_token: state.guest_token.clone(),
            wheel_id: state.wheel_id.clone(),
            title: state.title.clone(),
            domains: state.domains.clone(),
            scores: state.scores.clone(),
            priorities: state.priorities.clone(),
            reflections: state.reflections.clone(),
        });

        if let Some(parent) = self.snapshot_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| SyncError::Snapshot(format!("serialize: {e}")))?;
        fs::write(&self.snapshot_path, content)?;

        log::debug!("guest session persisted to {}", self.snapshot_path.display());
        Ok(())
    }

    /// Discard the session: reset state (minting a fresh guest token) and
    /// remove the snapshot file.
    pub fn clear(&self) -> Result<(), SyncError> {
        self.core.reset(GuestState::default());
        if self.snapshot_path.exists() {
            fs::remove_file(&self.snapshot_path)?;
        }
        Ok(())
    }
}

impl DirtyObservable for GuestStore {
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

/// Renumber order positions and priority ranks back to contiguous 1..=N
/// after a removal.
fn renumber(state: &mut GuestState) {
    for (index, domain) in state.domains.iter_mut().enumerate() {
        domain.order_position = index as u32 + 1;
    }
    state.priorities.sort_by_key(|p| p.rank);
    for (index, priority) in state.priorities.iter_mut().enumerate() {
        priority.rank = index as u32 + 1;
    }
}

fn default_snapshot_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".lifewheel")
        .join(SNAPSHOT_FILE)
}

/// Load a snapshot, tolerating absence and rejecting unknown versions.
fn load_snapshot(path: &PathBuf) -> Option<GuestState> {
    if !path.exists() {
        return None;
    }
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("failed to read guest snapshot: {e}");
            return None;
        }
    };
    let snapshot: GuestSnapshot = match serde_json::from_str(&content) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::warn!("failed to parse guest snapshot, starting fresh: {e}");
            return None;
        }
    };
    if snapshot.version != SNAPSHOT_VERSION {
        log::warn!(
            "guest snapshot version {} unsupported (current {}), starting fresh",
            snapshot.version,
            SNAPSHOT_VERSION
        );
        return None;
    }
    Some(GuestState {
        guest_token: snapshot.guest_token,
        wheel_id: snapshot.wheel_id,
        title: snapshot.title,
        domains: snapshot.domains,
        scores: snapshot.scores,
        priorities: snapshot.priorities,
        reflections: snapshot.reflections,
    })
}
