//! Client-side synchronization with the record service.
//!
//! - Version-checked pushes; the server rejects writes that skip a version
//! - Pull never overwrites unpushed local changes
//! - Divergent edits are flagged as conflicts, never merged
//! - Tombstone-based deletes, removed only once the server confirms

pub mod conflict;
pub mod engine;
pub mod scheduler;
#[cfg(test)]
pub(crate) mod testing;

pub use conflict::{ConflictResolver, PullAction, Resolution};
pub use engine::{SyncEngine, SyncReport, MAX_ID_ATTEMPTS};
pub use scheduler::{Notice, SchedulerOptions, SyncHealth, SyncScheduler};
