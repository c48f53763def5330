//! Write-marker change detection for `beadview-detector`.
//!
//! [`WriteMarkerDetector::probe`] walks the watched root to a bounded depth
//! using `stat` calls only and returns a [`Marker`]: every tracked path mapped
//! to either its byte length or its modification time, depending on the
//! path's [`PathClass`]. Two equal markers mean "the store has not been
//! written"; reads by the external tool touch only `Ignore`d paths (or change
//! mtimes of `Size` tracked blobs) and leave the marker alone.

mod classify;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

use beadview_core::config::{Classification, PathClass};

pub use classify::{wildcard_match, PathClassifier};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Tracked value for a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tracked {
    Size(u64),
    Mtime(SystemTime),
}

/// Snapshot of all tracked paths under the watched root, keyed by
/// `/`-separated relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Marker {
    entries: BTreeMap<String, Tracked>,
}

impl Marker {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, relative: &str) -> Option<&Tracked> {
        self.entries.get(relative)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tracked)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Paths whose tracked value differs, or that exist on only one side.
    pub fn changed_paths(&self, other: &Marker) -> Vec<String> {
        let mut paths: Vec<String> = self
            .entries
            .iter()
            .filter(|(path, value)| other.entries.get(*path) != Some(*value))
            .map(|(path, _)| path.clone())
            .collect();
        paths.extend(
            other
                .entries
                .keys()
                .filter(|path| !self.entries.contains_key(*path))
                .cloned(),
        );
        paths.sort();
        paths
    }

    fn insert(&mut self, relative: String, value: Tracked) {
        self.entries.insert(relative, value);
    }
}

/// One file seen during a walk, including ignored ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub path: String,
    pub class: PathClass,
    pub tracked: Option<Tracked>,
}

/// Per-path probe failures. These never abort a probe; the path is simply
/// left out of the marker.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("watched root '{path}' does not exist or is not a directory")]
    RootMissing { path: PathBuf },
}

/// Result of a single walk.
#[derive(Debug, Default)]
pub struct Scan {
    /// `None` when there is no usable root.
    pub marker: Option<Marker>,
    pub inventory: Vec<InventoryEntry>,
    pub errors: Vec<DetectionError>,
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Cheap, read-insensitive "might the store have changed?" oracle.
#[derive(Debug, Clone)]
pub struct WriteMarkerDetector {
    root: Option<PathBuf>,
    classifier: PathClassifier,
    max_depth: usize,
}

impl WriteMarkerDetector {
    pub fn new(root: Option<PathBuf>, table: &Classification, max_depth: usize) -> Self {
        Self {
            root,
            classifier: PathClassifier::new(table),
            max_depth,
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// True when a root is configured and is currently a directory.
    pub fn has_usable_root(&self) -> bool {
        self.root.as_deref().map(Path::is_dir).unwrap_or(false)
    }

    pub fn classify(&self, relative: &str) -> PathClass {
        self.classifier.classify(relative)
    }

    /// Build the current marker. `None` when the root is unset or missing.
    pub fn probe(&self) -> Option<Marker> {
        let scan = self.scan();
        for err in &scan.errors {
            tracing::debug!("probe skipped path: {err}");
        }
        scan.marker
    }

    /// Whether two probes indicate a write. Absent markers always count as a
    /// change, so a missing root degrades to "always refetch".
    pub fn changed(prev: Option<&Marker>, curr: Option<&Marker>) -> bool {
        match (prev, curr) {
            (Some(prev), Some(curr)) => prev != curr,
            _ => true,
        }
    }

    /// Walk the root, recording the marker, every file's classification and
    /// any per-path errors.
    pub fn scan(&self) -> Scan {
        let Some(root) = self.root.as_deref() else {
            return Scan::default();
        };
        if !root.is_dir() {
            return Scan {
                errors: vec![DetectionError::RootMissing {
                    path: root.to_path_buf(),
                }],
                ..Scan::default()
            };
        }

        let mut marker = Marker::default();
        let mut inventory = Vec::new();
        let mut errors = Vec::new();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(self.max_depth + 1)
            .follow_links(false);
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    errors.push(DetectionError::Walk(err));
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            let relative = relative_key(root, path);
            let class = self.classifier.classify(&relative);
            let tracked = match class {
                PathClass::Ignore => None,
                PathClass::Size | PathClass::Mtime => match track(path, class) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        errors.push(err);
                        None
                    }
                },
            };
            if let Some(value) = tracked {
                marker.insert(relative.clone(), value);
            }
            inventory.push(InventoryEntry {
                path: relative,
                class,
                tracked,
            });
        }

        inventory.sort_by(|a, b| a.path.cmp(&b.path));
        Scan {
            marker: Some(marker),
            inventory,
            errors,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn track(path: &Path, class: PathClass) -> Result<Tracked, DetectionError> {
    let meta = fs::metadata(path).map_err(|e| io_err(path, e))?;
    match class {
        PathClass::Size => Ok(Tracked::Size(meta.len())),
        _ => meta
            .modified()
            .map(Tracked::Mtime)
            .map_err(|e| io_err(path, e)),
    }
}

fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DetectionError {
    DetectionError::Io {
        path: path.into(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
