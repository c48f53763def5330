//! # beadview-live
//!
//! Runs the live view: decides when the `bd` store changed, fetches, and
//! streams presentation mutations.
//!
//! [`SyncScheduler`] owns all state on one tokio task. Control it through a
//! [`SchedulerHandle`] and consume [`SyncEvent`]s from the receiver returned
//! by [`SyncScheduler::new`].

pub mod debounce;
mod error;
pub mod executor;
pub mod logging;
pub mod scheduler;

pub use debounce::Debouncer;
pub use error::{FetchError, FetchErrorKind, LiveError};
pub use executor::{
    discover_bd, parse_issues, BdExecutor, CommandExecutor, IssueUpdate, MutationIntent, NewIssue,
};
pub use scheduler::{
    join_scheduler, DetectionMode, SchedulerHandle, SchedulerOptions, SchedulerState,
    StatusNotice, SyncEvent, SyncScheduler,
};
