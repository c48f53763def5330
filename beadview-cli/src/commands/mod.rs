//! Subcommands, plus the source and view flags `list` and `watch` share.

pub mod config;
pub mod list;
pub mod probe;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tabled::{builder::Builder, settings::Style};

use beadview_core::{config as viewer_config, Column, ViewerConfig};
use beadview_sync::{FilterSpec, Predicate, RenderedRow, SortSpec, ViewPipeline};

/// Where records come from. Overrides the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Path to the `bd` binary (default: discovered on PATH).
    #[arg(long, value_name = "PATH")]
    pub bd: Option<PathBuf>,

    /// Database passed through as `bd --db`.
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,
}

impl SourceArgs {
    pub fn load_config(&self) -> Result<ViewerConfig> {
        let mut config = viewer_config::load().context("failed to load viewer config")?;
        if let Some(bd) = &self.bd {
            config.bd_path = Some(bd.clone());
        }
        if let Some(db) = &self.db {
            config.db_path = Some(db.clone());
        }
        Ok(config)
    }
}

/// Filter, sort and column selection.
#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    /// Show every status, closed issues included.
    #[arg(long)]
    pub all: bool,

    /// Only these statuses (comma-separated). Replaces the default open/in_progress set.
    #[arg(long, value_delimiter = ',', value_name = "STATUS")]
    pub status: Vec<String>,

    /// Only these priorities (comma-separated).
    #[arg(long, short = 'p', value_delimiter = ',', value_name = "N")]
    pub priority: Vec<i64>,

    /// Only these issue types (comma-separated).
    #[arg(long = "type", short = 't', value_delimiter = ',', value_name = "TYPE")]
    pub issue_type: Vec<String>,

    /// Owned by or assigned to this person.
    #[arg(long)]
    pub assignee: Option<String>,

    /// Carrying this label.
    #[arg(long)]
    pub label: Option<String>,

    /// Case-insensitive text search over id, title, description, people and labels.
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Sort column (default: priority).
    #[arg(long, value_name = "COLUMN")]
    pub sort: Option<Column>,

    /// Sort descending.
    #[arg(long)]
    pub desc: bool,

    /// Columns to display (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "COLUMNS")]
    pub columns: Vec<Column>,
}

impl ViewArgs {
    pub fn pipeline(&self, config: &ViewerConfig) -> ViewPipeline {
        let mut filter = if !self.status.is_empty() {
            FilterSpec::all().with(Predicate::status_in(self.status.iter().cloned()))
        } else if self.all || config.show_all {
            FilterSpec::all()
        } else {
            FilterSpec::open_work()
        };
        if !self.priority.is_empty() {
            filter = filter.with(Predicate::priority_in(self.priority.iter().copied()));
        }
        if !self.issue_type.is_empty() {
            filter = filter.with(Predicate::type_in(self.issue_type.iter().cloned()));
        }
        if let Some(who) = &self.assignee {
            filter = filter.with(Predicate::AssigneeIs(who.clone()));
        }
        if let Some(label) = &self.label {
            filter = filter.with(Predicate::HasLabel(label.clone()));
        }
        if let Some(text) = &self.search {
            filter = filter.with(Predicate::search(text));
        }

        let key = self.sort.unwrap_or(SortSpec::default().key);
        let sort = if self.desc {
            SortSpec::descending(key)
        } else {
            SortSpec::ascending(key)
        };
        ViewPipeline::new(filter, sort)
    }

    pub fn columns(&self, config: &ViewerConfig) -> Vec<Column> {
        if self.columns.is_empty() {
            config.columns.clone()
        } else {
            self.columns.clone()
        }
    }
}

/// Rounded table with one header per column.
pub fn render_table(columns: &[Column], rows: &[RenderedRow]) -> String {
    let mut builder = Builder::default();
    builder.set_header(columns.iter().map(|c| c.header()));
    for row in rows {
        builder.push_record(row.cells.iter().cloned());
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table.to_string()
}
