//! Client-side core for the life wheel journal: observable state stores,
//! debounced auto-save, refresh orchestration, and the pure derivations
//! (period keys, insights, feed controls) the rendering shell consumes.

pub mod autosave;
pub mod backend;
pub mod error;
pub mod feed;
pub mod filters;
pub mod insights;
pub mod period_key;
pub mod store;
pub mod sync;
pub mod types;
