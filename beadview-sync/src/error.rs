//! Error types for beadview-sync.

use thiserror::Error;

use beadview_core::RecordId;

/// A mutation that does not fit the row table it is applied to.
///
/// The presentation side is not transactional: a stale mutation is skipped
/// and the next refresh rebuilds or re-updates whatever it missed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("no row for '{id}'")]
    UnknownRow { id: RecordId },

    #[error("insert of '{id}' at index {index} is past the end ({len} rows)")]
    IndexOutOfRange {
        id: RecordId,
        index: usize,
        len: usize,
    },

    #[error("row '{id}' is already present")]
    DuplicateRow { id: RecordId },

    #[error("column '{column}' is not displayed")]
    UnknownColumn { column: String },
}
