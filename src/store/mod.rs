//! Observable edit-buffer stores, one per feature area.
//!
//! Each store owns its slice of client state exclusively; backend rows are
//! the source of truth and a store is a working copy that may run
//! transiently ahead of them (dirty) until the auto-saver flushes.

mod core;
pub mod dashboard;
pub mod guest;
pub mod lifeplan;
pub mod odyssey;
pub mod wizard;

pub use self::core::{Callback, DirtyObservable, SubscriptionId};
