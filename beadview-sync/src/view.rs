//! Filter + sort projection of a snapshot into the ordered rows the user sees.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use beadview_core::{Column, Record, RecordId, Snapshot};

/// Statuses shown when the viewer is not asked to show everything.
pub const DEFAULT_STATUSES: &[&str] = &["open", "in_progress"];

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// A single pure condition over a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    StatusIn(BTreeSet<String>),
    PriorityIn(BTreeSet<i64>),
    TypeIn(BTreeSet<String>),
    AssigneeIs(String),
    HasLabel(String),
    /// Case-insensitive substring over id, title, description, people and labels.
    Search(String),
}

impl Predicate {
    pub fn status_in<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::StatusIn(statuses.into_iter().map(Into::into).collect())
    }

    pub fn priority_in<I: IntoIterator<Item = i64>>(priorities: I) -> Self {
        Predicate::PriorityIn(priorities.into_iter().collect())
    }

    pub fn type_in<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::TypeIn(types.into_iter().map(Into::into).collect())
    }

    pub fn search(text: &str) -> Self {
        Predicate::Search(text.trim().to_lowercase())
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::StatusIn(set) => set.contains(&record.status),
            Predicate::PriorityIn(set) => set.contains(&record.priority),
            Predicate::TypeIn(set) => set.contains(&record.issue_type),
            Predicate::AssigneeIs(who) => record.owner == *who || record.assignee == *who,
            Predicate::HasLabel(label) => record.labels.iter().any(|l| l == label),
            Predicate::Search(needle) => search_matches(record, needle),
        }
    }
}

fn search_matches(record: &Record, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let needle = needle.to_lowercase();
    [
        record.id.0.as_str(),
        record.title.as_str(),
        record.description.as_str(),
        record.owner.as_str(),
        record.assignee.as_str(),
    ]
    .iter()
    .chain(record.labels.iter().map(String::as_str).collect::<Vec<_>>().iter())
    .any(|field| field.to_lowercase().contains(&needle))
}

/// Conjunction of predicates. Empty means "show everything".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterSpec {
    predicates: Vec<Predicate>,
}

impl FilterSpec {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    /// The viewer's starting filter: open and in-progress records only.
    pub fn open_work() -> Self {
        Self::all().with(Predicate::status_in(DEFAULT_STATUSES.iter().copied()))
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Sort column plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: Column,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::ascending(Column::Priority)
    }
}

impl SortSpec {
    pub fn ascending(key: Column) -> Self {
        Self {
            key,
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(key: Column) -> Self {
        Self {
            key,
            direction: SortDirection::Descending,
        }
    }

    /// Re-selecting the current key flips direction; a new key starts ascending.
    pub fn toggle(self, key: Column) -> Self {
        if key == self.key {
            Self {
                key,
                direction: self.direction.reversed(),
            }
        } else {
            Self::ascending(key)
        }
    }
}

/// Total-order surrogate for one record's sort column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Int(i64),
    Text(String),
    /// Absent or empty value. Sorts after every present value in either
    /// direction.
    Missing,
}

impl SortValue {
    pub fn of(column: Column, record: &Record) -> Self {
        match column {
            Column::Priority => SortValue::Int(record.priority),
            Column::Id => text(&record.id.0),
            Column::Status => text(&record.status),
            Column::Type => text(&record.issue_type),
            Column::Title => text(&record.title),
            Column::Assignee => text(record.responsible()),
            Column::Updated => text(&record.updated_at),
            Column::Created => text(&record.created_at),
            Column::Labels => text(&record.labels.join(",")),
        }
    }

    fn compare(&self, other: &Self, direction: SortDirection) -> Ordering {
        match (self, other) {
            (SortValue::Missing, SortValue::Missing) => Ordering::Equal,
            (SortValue::Missing, _) => Ordering::Greater,
            (_, SortValue::Missing) => Ordering::Less,
            (a, b) => match direction {
                SortDirection::Ascending => a.cmp(b),
                SortDirection::Descending => b.cmp(a),
            },
        }
    }
}

fn text(value: &str) -> SortValue {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        SortValue::Missing
    } else {
        SortValue::Text(trimmed.to_lowercase())
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Current filter and sort settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewPipeline {
    pub filter: FilterSpec,
    pub sort: SortSpec,
}

impl ViewPipeline {
    pub fn new(filter: FilterSpec, sort: SortSpec) -> Self {
        Self { filter, sort }
    }

    pub fn apply(&self, snapshot: &Snapshot) -> Vec<RecordId> {
        apply(snapshot, &self.filter, &self.sort)
    }
}

/// Filter then stable-sort `snapshot`. Ties keep snapshot iteration order.
pub fn apply(snapshot: &Snapshot, filter: &FilterSpec, sort: &SortSpec) -> Vec<RecordId> {
    let mut rows: Vec<(SortValue, &RecordId)> = snapshot
        .iter()
        .filter(|record| filter.matches(record))
        .map(|record| (SortValue::of(sort.key, record), &record.id))
        .collect();
    rows.sort_by(|a, b| a.0.compare(&b.0, sort.direction));
    rows.into_iter().map(|(_, id)| id.clone()).collect()
}
