//! The external command boundary: fetching the full record set and applying
//! user mutations through the `bd` binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use beadview_core::types::DEFAULT_PRIORITY;
use beadview_core::{Record, RecordId, ViewerConfig};

use crate::error::FetchError;

/// Blocking, stateless access to the external store. Called from
/// `spawn_blocking`, never concurrently with itself by the scheduler.
pub trait CommandExecutor: Send + Sync + 'static {
    fn fetch_all(&self) -> Result<Vec<Record>, FetchError>;

    /// Apply `intent` and return the command's trimmed stdout (the new id for
    /// a create).
    fn mutate(&self, intent: &MutationIntent) -> Result<String, FetchError>;
}

// ---------------------------------------------------------------------------
// Mutation intents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<i64>,
    pub issue_type: Option<String>,
    pub assignee: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Fields to overwrite; `None` leaves a field alone and `Some("")` clears it.
/// `labels` replaces the whole label set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueUpdate {
    pub title: Option<String>,
    pub status: Option<String>,
    pub priority: Option<i64>,
    pub assignee: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub issue_type: Option<String>,
    pub due: Option<String>,
    pub defer: Option<String>,
    /// Minutes.
    pub estimate: Option<i64>,
    pub acceptance: Option<String>,
    pub design: Option<String>,
    pub external_ref: Option<String>,
    pub labels: Option<Vec<String>>,
}

impl IssueUpdate {
    pub fn is_empty(&self) -> bool {
        *self == IssueUpdate::default()
    }
}

/// A user-initiated write, run by the scheduler inside its exclusivity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MutationIntent {
    Create(NewIssue),
    Update { id: RecordId, fields: IssueUpdate },
    Close { id: RecordId, reason: Option<String> },
    Reopen { id: RecordId },
    AddComment { id: RecordId, text: String },
    AddLabel { id: RecordId, label: String },
    RemoveLabel { id: RecordId, label: String },
}

impl MutationIntent {
    /// `bd` arguments for this intent, without the binary or `--db`.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        match self {
            MutationIntent::Create(issue) => {
                args.extend(["create".into(), "--title".into(), issue.title.clone()]);
                args.push("--silent".into());
                push_non_empty(&mut args, "--description", issue.description.as_deref());
                push_opt(&mut args, "--priority", issue.priority.map(|p| p.to_string()).as_deref());
                push_non_empty(&mut args, "--type", issue.issue_type.as_deref());
                push_non_empty(&mut args, "--assignee", issue.assignee.as_deref());
                if !issue.labels.is_empty() {
                    args.extend(["--labels".into(), issue.labels.join(",")]);
                }
            }
            MutationIntent::Update { id, fields } => {
                args.extend(["update".into(), id.0.clone()]);
                push_opt(&mut args, "--title", fields.title.as_deref());
                push_opt(&mut args, "--status", fields.status.as_deref());
                push_opt(&mut args, "--priority", fields.priority.map(|p| p.to_string()).as_deref());
                push_opt(&mut args, "--assignee", fields.assignee.as_deref());
                push_opt(&mut args, "--description", fields.description.as_deref());
                push_opt(&mut args, "--notes", fields.notes.as_deref());
                push_opt(&mut args, "--type", fields.issue_type.as_deref());
                push_opt(&mut args, "--due", fields.due.as_deref());
                push_opt(&mut args, "--defer", fields.defer.as_deref());
                push_opt(&mut args, "--estimate", fields.estimate.map(|m| m.to_string()).as_deref());
                push_opt(&mut args, "--acceptance", fields.acceptance.as_deref());
                push_opt(&mut args, "--design", fields.design.as_deref());
                push_opt(&mut args, "--external-ref", fields.external_ref.as_deref());
                if let Some(labels) = &fields.labels {
                    args.extend(["--set-labels".into(), labels.join(",")]);
                }
            }
            MutationIntent::Close { id, reason } => {
                args.extend(["close".into(), id.0.clone()]);
                push_non_empty(&mut args, "--reason", reason.as_deref());
            }
            MutationIntent::Reopen { id } => {
                args.extend(["reopen".into(), id.0.clone()]);
            }
            MutationIntent::AddComment { id, text } => {
                args.extend(["comments".into(), "add".into(), id.0.clone(), text.clone()]);
            }
            MutationIntent::AddLabel { id, label } => {
                args.extend(["label".into(), "add".into(), id.0.clone(), label.clone()]);
            }
            MutationIntent::RemoveLabel { id, label } => {
                args.extend(["label".into(), "remove".into(), id.0.clone(), label.clone()]);
            }
        }
        args
    }

    /// The record this intent touches, if it already exists.
    pub fn target(&self) -> Option<&RecordId> {
        match self {
            MutationIntent::Create(_) => None,
            MutationIntent::Update { id, .. }
            | MutationIntent::Close { id, .. }
            | MutationIntent::Reopen { id }
            | MutationIntent::AddComment { id, .. }
            | MutationIntent::AddLabel { id, .. }
            | MutationIntent::RemoveLabel { id, .. } => Some(id),
        }
    }
}

fn push_opt(args: &mut Vec<String>, flag: &str, value: Option<&str>) {
    if let Some(value) = value {
        args.push(flag.to_string());
        args.push(value.to_string());
    }
}

/// Like [`push_opt`], but an empty value means "not given".
fn push_non_empty(args: &mut Vec<String>, flag: &str, value: Option<&str>) {
    push_opt(args, flag, value.filter(|v| !v.is_empty()));
}

// ---------------------------------------------------------------------------
// bd JSON decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Labels {
    List(Vec<String>),
    Joined(String),
}

impl Default for Labels {
    fn default() -> Self {
        Labels::List(Vec::new())
    }
}

impl Labels {
    fn into_vec(self) -> Vec<String> {
        match self {
            Labels::List(list) => list,
            Labels::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// One element of `bd list --json`. Unknown fields are ignored; absent or
/// null fields fall back to empty values.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IssueWire {
    id: String,
    title: Option<String>,
    description: Option<String>,
    status: Option<String>,
    priority: Option<i64>,
    issue_type: Option<String>,
    owner: Option<String>,
    assignee: Option<String>,
    labels: Option<Labels>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl IssueWire {
    fn into_record(self) -> Record {
        let updated_at = self.updated_at.unwrap_or_default();
        Record {
            id: RecordId(self.id),
            revision: updated_at.clone().into(),
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            priority: self.priority.unwrap_or(DEFAULT_PRIORITY),
            issue_type: self.issue_type.unwrap_or_default(),
            owner: self.owner.unwrap_or_default(),
            assignee: self.assignee.unwrap_or_default(),
            labels: self.labels.unwrap_or_default().into_vec(),
            created_at: self.created_at.unwrap_or_default(),
            updated_at,
        }
    }
}

/// Decode `bd list --json` stdout. Blank output means no records.
pub fn parse_issues(stdout: &str) -> Result<Vec<Record>, FetchError> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let wire: Option<Vec<IssueWire>> =
        serde_json::from_str(stdout).map_err(|err| FetchError::ParseFailed {
            detail: err.to_string(),
        })?;
    Ok(wire
        .unwrap_or_default()
        .into_iter()
        .filter(|issue| !issue.id.is_empty())
        .map(IssueWire::into_record)
        .collect())
}

// ---------------------------------------------------------------------------
// BdExecutor
// ---------------------------------------------------------------------------

/// Runs the real `bd` binary.
#[derive(Debug, Clone)]
pub struct BdExecutor {
    bd_path: PathBuf,
    db_path: Option<PathBuf>,
    include_closed: bool,
    limit: Option<u32>,
}

impl BdExecutor {
    pub fn new(bd_path: impl Into<PathBuf>) -> Self {
        Self {
            bd_path: bd_path.into(),
            db_path: None,
            include_closed: true,
            limit: None,
        }
    }

    /// Binary discovery plus `--db` and `--limit` from the config.
    pub fn from_config(config: &ViewerConfig) -> Result<Self, FetchError> {
        let bd_path = discover_bd(config.bd_path.as_deref())?;
        Ok(Self::new(bd_path)
            .with_db(config.db_path.clone())
            .with_limit(config.fetch_limit))
    }

    pub fn with_db(mut self, db_path: Option<PathBuf>) -> Self {
        self.db_path = db_path;
        self
    }

    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    /// Pass `--all` so closed issues are fetched too. On by default; the
    /// viewer filters client-side.
    pub fn with_closed(mut self, include_closed: bool) -> Self {
        self.include_closed = include_closed;
        self
    }

    pub fn bd_path(&self) -> &Path {
        &self.bd_path
    }

    /// Arguments for the full-list fetch, without the binary.
    pub fn list_args(&self) -> Vec<String> {
        let mut args = self.base_args();
        args.push("list".into());
        if self.include_closed {
            args.push("--all".into());
        }
        if let Some(limit) = self.limit {
            args.extend(["--limit".into(), limit.to_string()]);
        }
        args.push("--json".into());
        args
    }

    fn base_args(&self) -> Vec<String> {
        match &self.db_path {
            Some(db) => vec!["--db".into(), db.display().to_string()],
            None => Vec::new(),
        }
    }

    fn run(&self, args: &[String]) -> Result<String, FetchError> {
        tracing::debug!(bd = %self.bd_path.display(), args = ?args, "running bd");
        let output = Command::new(&self.bd_path)
            .args(args)
            .output()
            .map_err(|err| FetchError::NotFound {
                detail: format!("{}: {err}", self.bd_path.display()),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(FetchError::ExecutionFailed {
                detail,
                status: output.status.code().unwrap_or(-1),
            });
        }
        Ok(stdout)
    }
}

impl CommandExecutor for BdExecutor {
    fn fetch_all(&self) -> Result<Vec<Record>, FetchError> {
        let stdout = self.run(&self.list_args())?;
        parse_issues(&stdout)
    }

    fn mutate(&self, intent: &MutationIntent) -> Result<String, FetchError> {
        let mut args = self.base_args();
        args.extend(intent.args());
        let stdout = self.run(&args)?;
        Ok(stdout.trim().to_string())
    }
}

/// Locate `bd`: an explicit path wins, then `PATH`, then the usual install
/// locations.
pub fn discover_bd(explicit: Option<&Path>) -> Result<PathBuf, FetchError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let path_var = std::env::var_os("PATH").unwrap_or_default();
    let home = dirs::home_dir();
    discover_bd_in(&path_var, home.as_deref())
}

fn discover_bd_in(path_var: &std::ffi::OsStr, home: Option<&Path>) -> Result<PathBuf, FetchError> {
    let from_path = std::env::split_paths(path_var).map(|dir| dir.join("bd"));
    let fallbacks = home
        .map(|h| h.join(".local").join("bin").join("bd"))
        .into_iter()
        .chain(std::iter::once(PathBuf::from("/usr/local/bin/bd")));

    from_path
        .chain(fallbacks)
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| FetchError::NotFound {
            detail: "bd not found on PATH, ~/.local/bin or /usr/local/bin; set bd_path".into(),
        })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
