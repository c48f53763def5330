//! `beadview list`: one fetch, filtered and sorted.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use beadview_core::Record;
use beadview_live::{BdExecutor, CommandExecutor};
use beadview_sync::{LiveView, RefreshStatus};

use super::{render_table, SourceArgs, ViewArgs};

/// Arguments for `beadview list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub view: ViewArgs,

    /// Emit the visible records as a JSON array.
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let config = self.source.load_config()?;
        let executor = BdExecutor::from_config(&config).context("cannot locate bd")?;
        let records = executor.fetch_all().context("bd list failed")?;

        let columns = self.view.columns(&config);
        let mut view = LiveView::new(self.view.pipeline(&config), &columns);
        let refresh = view.apply_fetch(records);

        if self.json {
            let visible: Vec<&Record> = view
                .order()
                .iter()
                .filter_map(|id| view.snapshot().get(id))
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&visible).context("failed to serialize issues")?
            );
            return Ok(());
        }

        let mut status = RefreshStatus::new();
        status.set_filtered(!view.pipeline().filter.is_empty());
        status.record_success(Utc::now(), refresh.shown, refresh.total);

        if refresh.shown == 0 {
            println!("No matching issues.");
        } else {
            println!("{}", render_table(&columns, &view.rendered_rows()));
        }
        println!("{}", status.counts_line().bright_black());
        Ok(())
    }
}
