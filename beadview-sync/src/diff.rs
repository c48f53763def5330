//! Snapshot differ.

use std::collections::HashMap;

use beadview_core::{ChangeSet, RecordId, Revision, Snapshot};

/// Classify every id in `old ∪ new` as added, changed, removed, or unchanged.
///
/// Runs in O(|old| + |new|). Only revision equality is consulted. Output
/// lists are sorted by id.
pub fn diff(old: &Snapshot, new: &Snapshot) -> ChangeSet {
    let old_revisions: HashMap<&RecordId, &Revision> =
        old.iter().map(|r| (&r.id, &r.revision)).collect();
    let new_revisions: HashMap<&RecordId, &Revision> =
        new.iter().map(|r| (&r.id, &r.revision)).collect();

    let mut added = Vec::new();
    let mut changed = Vec::new();
    for (id, revision) in &new_revisions {
        match old_revisions.get(id) {
            None => added.push((*id).clone()),
            Some(previous) if previous != revision => changed.push((*id).clone()),
            Some(_) => {}
        }
    }

    let mut removed: Vec<RecordId> = old_revisions
        .keys()
        .filter(|id| !new_revisions.contains_key(*id))
        .map(|id| (*id).clone())
        .collect();

    added.sort();
    changed.sort();
    removed.sort();

    ChangeSet {
        added,
        changed,
        removed,
    }
}
