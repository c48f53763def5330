//! Viewer configuration, persisted as YAML.
//!
//! # Storage layout
//!
//! ```text
//! ~/.beadview/
//!   config.yaml   (mode 0600, written atomically via config.yaml.tmp)
//! ```
//!
//! # API pattern
//!
//! Every function that touches disk has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! A missing file is not an error: [`load_at`] returns [`ViewerConfig::default`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::Column;

// ---------------------------------------------------------------------------
// Path classification table
// ---------------------------------------------------------------------------

/// How a path under the watched root contributes to the write marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathClass {
    /// Touched by reads as well as writes; never part of the marker.
    Ignore,
    /// Append-only on writes; tracked by byte length.
    Size,
    /// Rewritten wholesale on writes; tracked by modification time.
    Mtime,
}

/// One `pattern → class` entry. `*` matches any run of characters. A pattern
/// without `/` is matched against the file name, otherwise against the path
/// relative to the watched root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    pub pattern: String,
    pub class: PathClass,
}

impl PathRule {
    pub fn new(pattern: impl Into<String>, class: PathClass) -> Self {
        Self {
            pattern: pattern.into(),
            class,
        }
    }
}

/// Ordered classification rules; the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub rules: Vec<PathRule>,
    #[serde(default = "default_class")]
    pub default_class: PathClass,
}

fn default_class() -> PathClass {
    PathClass::Size
}

impl Default for Classification {
    /// Table for a `.beads` directory: lock, socket, index and WAL side files
    /// are touched on every `bd` invocation; the database and JSONL export
    /// are rewritten on writes; everything else is append-only chunk data.
    fn default() -> Self {
        use PathClass::*;
        let rules = [
            ("*.lock", Ignore),
            ("LOCK", Ignore),
            ("manifest", Ignore),
            ("*.idx", Ignore),
            ("*-shm", Ignore),
            ("*-wal", Ignore),
            ("*.sock", Ignore),
            ("*.pid", Ignore),
            ("*.log", Ignore),
            ("*.tmp", Ignore),
            ("journal*", Size),
            ("*.db", Mtime),
            ("*.jsonl", Mtime),
            ("metadata.json", Mtime),
            ("last-touched", Mtime),
        ];
        Self {
            rules: rules
                .into_iter()
                .map(|(pattern, class)| PathRule::new(pattern, class))
                .collect(),
            default_class: default_class(),
        }
    }
}

// ---------------------------------------------------------------------------
// ViewerConfig
// ---------------------------------------------------------------------------

/// Everything the viewer reads from `config.yaml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Explicit `bd` binary; discovered on `PATH` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bd_path: Option<PathBuf>,
    /// Passed to `bd --db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    /// Directory probed for write markers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch_path: Option<PathBuf>,
    /// Use filesystem notifications as a wake-up source when available.
    pub watch: bool,
    pub detect_interval_ms: u64,
    pub fallback_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub debounce_ms: u64,
    /// Directory depth below the watched root that the probe descends.
    pub max_depth: usize,
    /// Include closed and deferred records in the default filter.
    pub show_all: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_limit: Option<u32>,
    pub columns: Vec<Column>,
    /// Emit `InsertRow` for rows appended at the tail instead of rebuilding.
    pub append_inserts: bool,
    pub classification: Classification,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            bd_path: None,
            db_path: None,
            watch_path: None,
            watch: true,
            detect_interval_ms: 1_000,
            fallback_interval_ms: 30_000,
            poll_interval_ms: 3_000,
            debounce_ms: 500,
            max_depth: 3,
            show_all: false,
            fetch_limit: None,
            columns: Column::DEFAULT.to_vec(),
            append_inserts: false,
            classification: Classification::default(),
        }
    }
}

impl ViewerConfig {
    pub fn detect_interval(&self) -> Duration {
        Duration::from_millis(self.detect_interval_ms.max(1))
    }

    pub fn fallback_interval(&self) -> Duration {
        Duration::from_millis(self.fallback_interval_ms.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Root to probe: `watch_path`, else the directory holding `db_path`,
    /// else `<cwd>/.beads`. Existence is the detector's concern.
    pub fn resolve_watch_path(&self, cwd: &Path) -> PathBuf {
        if let Some(path) = &self.watch_path {
            return path.clone();
        }
        if let Some(parent) = self.db_path.as_deref().and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                return parent.to_path_buf();
            }
        }
        cwd.join(".beads")
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// `<home>/.beadview/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".beadview").join("config.yaml")
}

/// `config_path_at` convenience wrapper.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_path_at(&home()?))
}

/// Load `<home>/.beadview/config.yaml`, or defaults when it does not exist.
///
/// Returns `ConfigError::Parse` (with path + line context) on malformed YAML.
pub fn load_at(home: &Path) -> Result<ViewerConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(ViewerConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(ViewerConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<ViewerConfig, ConfigError> {
    load_at(&home()?)
}

/// Save atomically: write `config.yaml.tmp`, then rename over `config.yaml`.
pub fn save_at(home: &Path, config: &ViewerConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path_at(home);
    let Some(dir) = path.parent() else {
        return Err(io_err(
            &path,
            std::io::Error::other("invalid config path"),
        ));
    };
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }

    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_file_name("config.yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(path)
}

/// `save_at` convenience wrapper.
pub fn save(config: &ViewerConfig) -> Result<PathBuf, ConfigError> {
    save_at(&home()?, config)
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
