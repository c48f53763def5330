//! # beadview-sync
//!
//! The pure half of the live view: snapshot diffing, filter/sort projection,
//! reconciliation into presentation mutations, and the status line.
//!
//! [`LiveView::apply_fetch`] ties these together for one fetched record set.
//! Nothing here does I/O or spawns tasks; scheduling lives in `beadview-live`.

pub mod diff;
pub mod engine;
pub mod error;
pub mod reconcile;
pub mod status;
pub mod table;
pub mod view;

pub use diff::diff;
pub use engine::{LiveView, Refresh};
pub use error::ReconcileError;
pub use reconcile::{reconcile, ReconcileInput, Reconciled, RenderedRow, Selection, ViewMutation};
pub use status::{format_age, format_seconds, RefreshStatus};
pub use table::RowTable;
pub use view::{
    apply, FilterSpec, Predicate, SortDirection, SortSpec, SortValue, ViewPipeline,
    DEFAULT_STATUSES,
};
