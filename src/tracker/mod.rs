//! New code detection and its persisted state.
//!
//! # Modules
//!
//! - `code_tracker` - Owner of subscriptions, cursors and pending codes
//! - `reconcile` - Pure detection of new, held and stale codes
//! - `state` - Persisted data structures
//! - `store` - Crash-safe JSON persistence

mod code_tracker;
mod reconcile;
mod state;
mod store;

pub use crate::tracker::code_tracker::CodeTracker;
pub use crate::tracker::reconcile::{PendingPolicy, PublishDecision, Published};
pub use crate::tracker::store::StateStore;
