//! Point-in-time copy of the external record set.

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{Record, RecordId, Revision};

/// The external store as of one fetch.
///
/// Iteration follows fetch order. A snapshot is never mutated after
/// construction; the next fetch builds a new one.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: Vec<Arc<Record>>,
    index: HashMap<RecordId, usize>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from fetched records.
    ///
    /// A repeated id keeps the position of its first occurrence and the value
    /// of its last.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        let mut snapshot = Self::default();
        for record in records {
            match snapshot.index.get(&record.id) {
                Some(&pos) => snapshot.records[pos] = Arc::new(record),
                None => {
                    snapshot
                        .index
                        .insert(record.id.clone(), snapshot.records.len());
                    snapshot.records.push(Arc::new(record));
                }
            }
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.index.get(id).map(|&pos| self.records[pos].as_ref())
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.index.contains_key(id)
    }

    pub fn revision(&self, id: &RecordId) -> Option<&Revision> {
        self.get(id).map(|r| &r.revision)
    }

    /// Records in fetch order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> + '_ {
        self.records.iter().map(Arc::as_ref)
    }

    /// Ids in fetch order.
    pub fn ids(&self) -> impl Iterator<Item = &RecordId> + '_ {
        self.records.iter().map(|r| &r.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_fetch_order() {
        let snap = Snapshot::from_records(vec![
            Record::new("c", "1"),
            Record::new("a", "1"),
            Record::new("b", "1"),
        ]);
        let ids: Vec<&str> = snap.ids().map(|id| id.0.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn duplicate_id_keeps_first_position_last_value() {
        let snap = Snapshot::from_records(vec![
            Record::new("a", "1"),
            Record::new("b", "1"),
            Record::new("a", "2"),
        ]);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.ids().next(), Some(&RecordId::from("a")));
        assert_eq!(
            snap.revision(&RecordId::from("a")),
            Some(&Revision::from("2"))
        );
    }

    #[test]
    fn lookup_missing_id() {
        let snap = Snapshot::empty();
        assert!(snap.is_empty());
        assert!(snap.get(&RecordId::from("nope")).is_none());
        assert!(!snap.contains(&RecordId::from("nope")));
    }
}
