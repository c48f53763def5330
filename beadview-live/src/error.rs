use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Failure of one call to the external command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("bd binary not found: {detail}")]
    NotFound { detail: String },

    #[error("bd command failed (exit {status}): {detail}")]
    ExecutionFailed { detail: String, status: i32 },

    #[error("failed to parse bd JSON output: {detail}")]
    ParseFailed { detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    NotFound,
    ExecutionFailed,
    ParseFailed,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchErrorKind::NotFound => "not_found",
            FetchErrorKind::ExecutionFailed => "execution_failed",
            FetchErrorKind::ParseFailed => "parse_failed",
        })
    }
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::NotFound { .. } => FetchErrorKind::NotFound,
            FetchError::ExecutionFailed { .. } => FetchErrorKind::ExecutionFailed,
            FetchError::ParseFailed { .. } => FetchErrorKind::ParseFailed,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            FetchError::NotFound { detail }
            | FetchError::ExecutionFailed { detail, .. }
            | FetchError::ParseFailed { detail } => detail,
        }
    }
}

/// Error surface for the live scheduler and its control handle.
#[derive(Debug, Error)]
pub enum LiveError {
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("config error: {0}")]
    Config(#[from] beadview_core::ConfigError),

    #[error("view error: {0}")]
    Reconcile(#[from] beadview_sync::ReconcileError),

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("task join failure: {0}")]
    Join(String),
}
