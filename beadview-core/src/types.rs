//! Domain types for the viewer's record set.
//!
//! Records are immutable once constructed: a write in the external store shows
//! up as a new [`Record`] value with the same [`RecordId`] and a different
//! [`Revision`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable identity of a record, unique within a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque per-record write marker. Only equality is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Revision(pub String);

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Revision {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Revision {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Priority used when the store omits one.
pub const DEFAULT_PRIORITY: i64 = 2;

/// One issue as last observed in the external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub revision: Revision,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: i64,
    pub issue_type: String,
    pub owner: String,
    pub assignee: String,
    pub labels: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Record {
    /// A record with empty attributes and the default priority.
    pub fn new(id: impl Into<RecordId>, revision: impl Into<Revision>) -> Self {
        Self {
            id: id.into(),
            revision: revision.into(),
            title: String::new(),
            description: String::new(),
            status: String::new(),
            priority: DEFAULT_PRIORITY,
            issue_type: String::new(),
            owner: String::new(),
            assignee: String::new(),
            labels: Vec::new(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_issue_type(mut self, issue_type: impl Into<String>) -> Self {
        self.issue_type = issue_type.into();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = assignee.into();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = created_at.into();
        self
    }

    pub fn with_updated_at(mut self, updated_at: impl Into<String>) -> Self {
        self.updated_at = updated_at.into();
        self
    }

    /// Who the record is attributed to: the owner, falling back to the assignee.
    pub fn responsible(&self) -> &str {
        if self.owner.is_empty() {
            &self.assignee
        } else {
            &self.owner
        }
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// A displayable attribute of a record. Doubles as a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Id,
    Priority,
    Status,
    Type,
    Title,
    Assignee,
    Updated,
    Created,
    Labels,
}

impl Column {
    pub const ALL: &'static [Column] = &[
        Column::Id,
        Column::Priority,
        Column::Status,
        Column::Type,
        Column::Title,
        Column::Assignee,
        Column::Updated,
        Column::Created,
        Column::Labels,
    ];

    pub const DEFAULT: &'static [Column] = &[
        Column::Id,
        Column::Priority,
        Column::Status,
        Column::Type,
        Column::Title,
        Column::Assignee,
        Column::Updated,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Priority => "priority",
            Column::Status => "status",
            Column::Type => "type",
            Column::Title => "title",
            Column::Assignee => "assignee",
            Column::Updated => "updated",
            Column::Created => "created",
            Column::Labels => "labels",
        }
    }

    /// Short table header.
    pub fn header(self) -> &'static str {
        match self {
            Column::Id => "ID",
            Column::Priority => "P",
            Column::Status => "Status",
            Column::Type => "Type",
            Column::Title => "Title",
            Column::Assignee => "Assignee",
            Column::Updated => "Updated",
            Column::Created => "Created",
            Column::Labels => "Labels",
        }
    }

    /// Render the cell text shown for `record` in this column.
    pub fn render(self, record: &Record) -> String {
        match self {
            Column::Id => record.id.0.clone(),
            Column::Priority => format!("P{}", record.priority),
            Column::Status => record.status.clone(),
            Column::Type => record.issue_type.clone(),
            Column::Title => record.title.clone(),
            Column::Assignee => record.responsible().to_string(),
            Column::Updated => short_date(&record.updated_at).to_string(),
            Column::Created => short_date(&record.created_at).to_string(),
            Column::Labels => record.labels.join(","),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        match needle.as_str() {
            "p" | "pri" => return Ok(Column::Priority),
            "issue_type" => return Ok(Column::Type),
            "owner" => return Ok(Column::Assignee),
            _ => {}
        }
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.name() == needle)
            .ok_or_else(|| {
                let known: Vec<&str> = Column::ALL.iter().map(|c| c.name()).collect();
                format!("unknown column '{s}'; expected one of: {}", known.join(", "))
            })
    }
}

/// `YYYY-MM-DD` prefix of an ISO-8601 timestamp; shorter inputs pass through.
fn short_date(timestamp: &str) -> &str {
    timestamp.get(..10).unwrap_or(timestamp)
}

// ---------------------------------------------------------------------------
// ChangeSet
// ---------------------------------------------------------------------------

/// Delta between two snapshots. The three lists are pairwise disjoint and
/// sorted by id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ChangeSet {
    /// Present in the new snapshot only.
    pub added: Vec<RecordId>,
    /// Present in both with a different revision.
    pub changed: Vec<RecordId>,
    /// Present in the old snapshot only.
    pub removed: Vec<RecordId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.changed.len() + self.removed.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
