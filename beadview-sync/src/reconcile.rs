//! Turn a data delta plus the old and new view orders into presentation
//! mutations.
//!
//! Emission order is fixed: removals, then either a single rebuild or
//! inserts/cell updates, then at most one selection event.

use std::collections::HashSet;

use serde::Serialize;

use beadview_core::{ChangeSet, Column, Record, RecordId, Snapshot};

/// One row as the presentation layer draws it: an id and one string per
/// displayed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedRow {
    pub id: RecordId,
    pub cells: Vec<String>,
}

impl RenderedRow {
    pub fn render(record: &Record, columns: &[Column]) -> Self {
        Self {
            id: record.id.clone(),
            cells: columns.iter().map(|c| c.render(record)).collect(),
        }
    }
}

/// Instruction for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewMutation {
    InsertRow {
        id: RecordId,
        index: usize,
        cells: Vec<String>,
    },
    UpdateCell {
        id: RecordId,
        column: Column,
        value: String,
    },
    RemoveRow {
        id: RecordId,
    },
    RebuildAll {
        rows: Vec<RenderedRow>,
    },
    SelectionMoved {
        id: RecordId,
        index: usize,
    },
    SelectionCleared,
}

impl ViewMutation {
    pub fn is_rebuild(&self) -> bool {
        matches!(self, ViewMutation::RebuildAll { .. })
    }
}

/// The focused row, tracked by identity with its last known position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub id: RecordId,
    pub index: usize,
}

impl Selection {
    pub fn new(id: impl Into<RecordId>, index: usize) -> Self {
        Self {
            id: id.into(),
            index,
        }
    }

    /// Find this selection in `order`: by id when still present, otherwise
    /// at the same index clamped to the new length. `None` for an empty view.
    pub fn relocate(&self, order: &[RecordId]) -> Option<Selection> {
        if let Some(index) = order.iter().position(|id| *id == self.id) {
            return Some(Selection::new(self.id.clone(), index));
        }
        let last = order.len().checked_sub(1)?;
        let index = self.index.min(last);
        Some(Selection::new(order[index].clone(), index))
    }
}

/// Everything one reconciliation pass looks at.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileInput<'a> {
    pub previous_order: &'a [RecordId],
    pub new_order: &'a [RecordId],
    pub changes: &'a ChangeSet,
    pub old: &'a Snapshot,
    pub new: &'a Snapshot,
    pub columns: &'a [Column],
    pub selection: Option<&'a Selection>,
    /// Emit `InsertRow` for a pure tail append instead of rebuilding.
    pub append_inserts: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub mutations: Vec<ViewMutation>,
    pub selection: Option<Selection>,
}

pub fn reconcile(input: ReconcileInput<'_>) -> Reconciled {
    let mut mutations = Vec::new();

    // Removals, visible rows first in view order, then the rest by id.
    let removed: HashSet<&RecordId> = input.changes.removed.iter().collect();
    let previous: HashSet<&RecordId> = input.previous_order.iter().collect();
    for id in input.previous_order.iter().filter(|id| removed.contains(id)) {
        mutations.push(ViewMutation::RemoveRow { id: id.clone() });
    }
    for id in input.changes.removed.iter().filter(|id| !previous.contains(id)) {
        mutations.push(ViewMutation::RemoveRow { id: id.clone() });
    }

    let surviving: Vec<&RecordId> = input
        .previous_order
        .iter()
        .filter(|id| !removed.contains(id))
        .collect();

    let same_order = surviving.len() == input.new_order.len()
        && surviving.iter().zip(input.new_order).all(|(a, b)| *a == b);
    let tail_append = !same_order
        && input.append_inserts
        && input.new_order.len() > surviving.len()
        && surviving.iter().zip(input.new_order).all(|(a, b)| *a == b);

    let mut rebuilt = false;
    let mut appended: HashSet<&RecordId> = HashSet::new();
    if !same_order && !tail_append {
        let rows = input
            .new_order
            .iter()
            .filter_map(|id| input.new.get(id))
            .map(|record| RenderedRow::render(record, input.columns))
            .collect();
        mutations.push(ViewMutation::RebuildAll { rows });
        rebuilt = true;
    } else {
        if tail_append {
            for (index, id) in input.new_order.iter().enumerate().skip(surviving.len()) {
                let Some(record) = input.new.get(id) else {
                    continue;
                };
                mutations.push(ViewMutation::InsertRow {
                    id: id.clone(),
                    index,
                    cells: RenderedRow::render(record, input.columns).cells,
                });
                appended.insert(id);
            }
        }

        let changed: HashSet<&RecordId> = input.changes.changed.iter().collect();
        for id in input
            .new_order
            .iter()
            .filter(|id| changed.contains(id) && !appended.contains(id))
        {
            let (Some(before), Some(after)) = (input.old.get(id), input.new.get(id)) else {
                continue;
            };
            for column in input.columns {
                let value = column.render(after);
                if column.render(before) != value {
                    mutations.push(ViewMutation::UpdateCell {
                        id: id.clone(),
                        column: *column,
                        value,
                    });
                }
            }
        }
    }

    let selection = input
        .selection
        .and_then(|sel| sel.relocate(input.new_order));
    let moved = selection.as_ref() != input.selection;
    match &selection {
        Some(sel) if moved || rebuilt => mutations.push(ViewMutation::SelectionMoved {
            id: sel.id.clone(),
            index: sel.index,
        }),
        None if input.selection.is_some() => mutations.push(ViewMutation::SelectionCleared),
        _ => {}
    }

    if !mutations.is_empty() {
        tracing::debug!(
            "reconciled {} change(s) into {} mutation(s){}",
            input.changes.len(),
            mutations.len(),
            if rebuilt { " (rebuild)" } else { "" }
        );
    }

    Reconciled {
        mutations,
        selection,
    }
}
