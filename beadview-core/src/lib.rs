//! beadview core library: record model, snapshots, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: `Record`, `RecordId`, `Revision`, `Column`, `ChangeSet`
//! - [`snapshot`]: [`Snapshot`]
//! - [`config`]: `ViewerConfig` load / save, path classification table
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod snapshot;
pub mod types;

pub use config::{Classification, PathClass, PathRule, ViewerConfig};
pub use error::ConfigError;
pub use snapshot::Snapshot;
pub use types::{ChangeSet, Column, Record, RecordId, Revision};
