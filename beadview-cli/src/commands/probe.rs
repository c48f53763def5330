//! `beadview probe`: what the change detector sees under the store root.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use beadview_core::{config as viewer_config, PathClass};
use beadview_detector::{InventoryEntry, Marker, Tracked, WriteMarkerDetector};

/// Arguments for `beadview probe`.
#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Directory to probe (default: configured watch path, else ./.beads).
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Override the configured directory depth.
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ProbeReport<'a> {
    root: String,
    usable: bool,
    marker: Option<&'a Marker>,
    files: &'a [InventoryEntry],
    errors: Vec<String>,
}

#[derive(Tabled)]
struct ProbeRow {
    #[tabled(rename = "path")]
    path: String,
    #[tabled(rename = "class")]
    class: String,
    #[tabled(rename = "tracked")]
    tracked: String,
}

impl ProbeArgs {
    pub fn run(self) -> Result<()> {
        let config = viewer_config::load().context("failed to load viewer config")?;
        let root = match self.root {
            Some(root) => root,
            None => {
                let cwd = std::env::current_dir().context("cannot read current directory")?;
                config.resolve_watch_path(&cwd)
            }
        };
        let depth = self.max_depth.unwrap_or(config.max_depth);
        let detector = WriteMarkerDetector::new(Some(root.clone()), &config.classification, depth);
        let scan = detector.scan();

        if self.json {
            let report = ProbeReport {
                root: root.display().to_string(),
                usable: scan.marker.is_some(),
                marker: scan.marker.as_ref(),
                files: &scan.inventory,
                errors: scan.errors.iter().map(ToString::to_string).collect(),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize probe JSON")?
            );
            return Ok(());
        }

        let Some(marker) = scan.marker.as_ref() else {
            println!(
                "{} no usable root at {}; the viewer will poll instead",
                "■".yellow().bold(),
                root.display()
            );
            return Ok(());
        };

        println!(
            "{} {} ({} tracked of {} files)",
            "■".green().bold(),
            root.display(),
            marker.len(),
            scan.inventory.len()
        );
        if !scan.inventory.is_empty() {
            let rows: Vec<ProbeRow> = scan
                .inventory
                .iter()
                .map(|entry| ProbeRow {
                    path: entry.path.clone(),
                    class: class_label(entry.class).to_string(),
                    tracked: entry.tracked.as_ref().map(describe).unwrap_or_default(),
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        for err in &scan.errors {
            eprintln!("{} {err}", "warning:".yellow());
        }
        Ok(())
    }
}

fn class_label(class: PathClass) -> &'static str {
    match class {
        PathClass::Ignore => "ignore",
        PathClass::Size => "size",
        PathClass::Mtime => "mtime",
    }
}

fn describe(tracked: &Tracked) -> String {
    match tracked {
        Tracked::Size(bytes) => format!("{bytes} bytes"),
        Tracked::Mtime(at) => DateTime::<Local>::from(*at)
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string(),
    }
}
