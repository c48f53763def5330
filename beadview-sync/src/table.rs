//! In-memory row table that applies [`ViewMutation`]s the way a presentation
//! layer would. Used by the CLI watcher and by tests to check that a mutation
//! stream lands on the same rows as a full re-render.

use beadview_core::{Column, RecordId};

use crate::error::ReconcileError;
use crate::reconcile::{RenderedRow, Selection, ViewMutation};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowTable {
    columns: Vec<Column>,
    rows: Vec<RenderedRow>,
    selection: Option<Selection>,
}

impl RowTable {
    pub fn new(columns: &[Column]) -> Self {
        Self {
            columns: columns.to_vec(),
            ..Self::default()
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[RenderedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.rows.iter().map(|r| r.id.clone()).collect()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn cell(&self, id: &RecordId, column: Column) -> Option<&str> {
        let col = self.columns.iter().position(|c| *c == column)?;
        self.row(id)
            .and_then(|row| row.cells.get(col))
            .map(String::as_str)
    }

    fn row(&self, id: &RecordId) -> Option<&RenderedRow> {
        self.rows.iter().find(|r| r.id == *id)
    }

    fn position(&self, id: &RecordId) -> Result<usize, ReconcileError> {
        self.rows
            .iter()
            .position(|r| r.id == *id)
            .ok_or_else(|| ReconcileError::UnknownRow { id: id.clone() })
    }

    /// Apply one mutation. On error the table is left untouched.
    pub fn apply(&mut self, mutation: &ViewMutation) -> Result<(), ReconcileError> {
        match mutation {
            ViewMutation::InsertRow { id, index, cells } => {
                if self.row(id).is_some() {
                    return Err(ReconcileError::DuplicateRow { id: id.clone() });
                }
                if *index > self.rows.len() {
                    return Err(ReconcileError::IndexOutOfRange {
                        id: id.clone(),
                        index: *index,
                        len: self.rows.len(),
                    });
                }
                self.rows.insert(
                    *index,
                    RenderedRow {
                        id: id.clone(),
                        cells: cells.clone(),
                    },
                );
            }
            ViewMutation::UpdateCell { id, column, value } => {
                let col = self.columns.iter().position(|c| c == column).ok_or_else(|| {
                    ReconcileError::UnknownColumn {
                        column: column.to_string(),
                    }
                })?;
                let pos = self.position(id)?;
                if let Some(cell) = self.rows[pos].cells.get_mut(col) {
                    *cell = value.clone();
                }
            }
            ViewMutation::RemoveRow { id } => {
                let pos = self.position(id)?;
                self.rows.remove(pos);
            }
            ViewMutation::RebuildAll { rows } => {
                self.rows = rows.clone();
            }
            ViewMutation::SelectionMoved { id, .. } => {
                let index = self.position(id)?;
                self.selection = Some(Selection::new(id.clone(), index));
            }
            ViewMutation::SelectionCleared => {
                self.selection = None;
            }
        }
        Ok(())
    }

    /// Apply a batch, skipping mutations that do not fit. Returns the number
    /// skipped.
    pub fn apply_all<'a, I>(&mut self, mutations: I) -> usize
    where
        I: IntoIterator<Item = &'a ViewMutation>,
    {
        let mut skipped = 0;
        for mutation in mutations {
            if let Err(err) = self.apply(mutation) {
                // Removals of rows that were never visible land here.
                tracing::debug!("skipped mutation: {err}");
                skipped += 1;
            }
        }
        skipped
    }
}
