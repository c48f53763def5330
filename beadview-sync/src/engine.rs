//! [`LiveView`]: the snapshot, view settings and selection of one viewer
//! session, advanced one fetch at a time.

use beadview_core::{ChangeSet, Column, Record, RecordId, Snapshot, ViewerConfig};

use crate::diff::diff;
use crate::error::ReconcileError;
use crate::reconcile::{reconcile, ReconcileInput, RenderedRow, Selection, ViewMutation};
use crate::view::{FilterSpec, SortSpec, ViewPipeline};

/// Outcome of folding one fetch into the view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Refresh {
    pub changes: ChangeSet,
    pub mutations: Vec<ViewMutation>,
    pub shown: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct LiveView {
    snapshot: Snapshot,
    pipeline: ViewPipeline,
    order: Vec<RecordId>,
    selection: Option<Selection>,
    columns: Vec<Column>,
    append_inserts: bool,
    loaded: bool,
}

impl LiveView {
    pub fn new(pipeline: ViewPipeline, columns: &[Column]) -> Self {
        Self {
            snapshot: Snapshot::empty(),
            pipeline,
            order: Vec::new(),
            selection: None,
            columns: columns.to_vec(),
            append_inserts: false,
            loaded: false,
        }
    }

    /// Columns, starting filter and insert policy taken from the viewer config.
    pub fn from_config(config: &ViewerConfig) -> Self {
        let filter = if config.show_all {
            FilterSpec::all()
        } else {
            FilterSpec::open_work()
        };
        Self::new(ViewPipeline::new(filter, SortSpec::default()), &config.columns)
            .with_append_inserts(config.append_inserts)
    }

    pub fn with_append_inserts(mut self, enabled: bool) -> Self {
        self.append_inserts = enabled;
        self
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn order(&self) -> &[RecordId] {
        &self.order
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn pipeline(&self) -> &ViewPipeline {
        &self.pipeline
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Whether at least one fetch has been applied.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// The visible rows, fully rendered, in view order.
    pub fn rendered_rows(&self) -> Vec<RenderedRow> {
        self.order
            .iter()
            .filter_map(|id| self.snapshot.get(id))
            .map(|record| RenderedRow::render(record, &self.columns))
            .collect()
    }

    /// Replace the snapshot with freshly fetched records and emit the
    /// mutations that carry the previous view to the new one.
    ///
    /// The first fetch always rebuilds so the presentation starts from a
    /// known state.
    pub fn apply_fetch(&mut self, records: Vec<Record>) -> Refresh {
        let next = Snapshot::from_records(records);
        let changes = diff(&self.snapshot, &next);
        let new_order = self.pipeline.apply(&next);

        let mut mutations = Vec::new();
        if self.loaded {
            let reconciled = reconcile(ReconcileInput {
                previous_order: &self.order,
                new_order: &new_order,
                changes: &changes,
                old: &self.snapshot,
                new: &next,
                columns: &self.columns,
                selection: self.selection.as_ref(),
                append_inserts: self.append_inserts,
            });
            self.selection = reconciled.selection;
            mutations = reconciled.mutations;
        }

        self.snapshot = next;
        self.order = new_order;
        if !self.loaded {
            self.loaded = true;
            mutations = self.rebuild();
        }
        Refresh {
            changes,
            mutations,
            shown: self.order.len(),
            total: self.snapshot.len(),
        }
    }

    pub fn set_filter(&mut self, filter: FilterSpec) -> Vec<ViewMutation> {
        self.pipeline.filter = filter;
        self.reproject()
    }

    pub fn set_sort(&mut self, sort: SortSpec) -> Vec<ViewMutation> {
        self.pipeline.sort = sort;
        self.reproject()
    }

    pub fn toggle_sort(&mut self, key: Column) -> Vec<ViewMutation> {
        self.pipeline.sort = self.pipeline.sort.toggle(key);
        self.reproject()
    }

    /// Focus the row for `id`.
    pub fn select(&mut self, id: &RecordId) -> Result<Vec<ViewMutation>, ReconcileError> {
        let index = self
            .order
            .iter()
            .position(|candidate| candidate == id)
            .ok_or_else(|| ReconcileError::UnknownRow { id: id.clone() })?;
        let selection = Selection::new(id.clone(), index);
        if self.selection.as_ref() == Some(&selection) {
            return Ok(Vec::new());
        }
        self.selection = Some(selection);
        Ok(vec![ViewMutation::SelectionMoved {
            id: id.clone(),
            index,
        }])
    }

    /// Re-run the pipeline over the current snapshot without fetching. A
    /// view-settings change always rebuilds, even when the order survives.
    fn reproject(&mut self) -> Vec<ViewMutation> {
        self.order = self.pipeline.apply(&self.snapshot);
        self.rebuild()
    }

    fn rebuild(&mut self) -> Vec<ViewMutation> {
        let mut mutations = vec![ViewMutation::RebuildAll {
            rows: self.rendered_rows(),
        }];
        if let Some(previous) = self.selection.take() {
            match previous.relocate(&self.order) {
                Some(sel) => {
                    mutations.push(ViewMutation::SelectionMoved {
                        id: sel.id.clone(),
                        index: sel.index,
                    });
                    self.selection = Some(sel);
                }
                None => mutations.push(ViewMutation::SelectionCleared),
            }
        }
        mutations
    }
}
