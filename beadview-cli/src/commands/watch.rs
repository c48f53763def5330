//! `beadview watch`: run the live scheduler and print what changes.
//!
//! Row mutations are mirrored into a [`RowTable`] so removals of rows that
//! were never shown stay silent. Simple commands are read from stdin, one
//! per line:
//!
//! ```text
//! r            refresh now
//! p / c        pause / continue
//! s <column>   sort by column (again to flip direction)
//! g <id>       select a row
//! q            quit
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use beadview_core::Column;
use beadview_detector::WriteMarkerDetector;
use beadview_live::{
    join_scheduler, logging, BdExecutor, SchedulerHandle, SchedulerOptions, StatusNotice,
    SyncEvent, SyncScheduler,
};
use beadview_sync::{LiveView, RefreshStatus, RowTable, ViewMutation};

use super::{render_table, SourceArgs, ViewArgs};

/// Arguments for `beadview watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub view: ViewArgs,

    /// Skip filesystem notifications; probe the write marker on a timer only.
    #[arg(long)]
    pub no_watch: bool,

    /// Emit one JSON object per event.
    #[arg(long)]
    pub json: bool,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        runtime.block_on(self.run_async())
    }

    async fn run_async(self) -> Result<()> {
        if self.json {
            logging::init_json();
        } else {
            logging::init();
        }

        let mut config = self.source.load_config()?;
        if self.no_watch {
            config.watch = false;
        }
        let cwd = std::env::current_dir().context("cannot read current directory")?;
        let executor = BdExecutor::from_config(&config).context("cannot locate bd")?;

        let columns = self.view.columns(&config);
        let view = LiveView::new(self.view.pipeline(&config), &columns)
            .with_append_inserts(config.append_inserts);
        let detector = WriteMarkerDetector::new(
            Some(config.resolve_watch_path(&cwd)),
            &config.classification,
            config.max_depth,
        );
        let (scheduler, handle, mut events) = SyncScheduler::new(
            Arc::new(executor),
            detector,
            view,
            SchedulerOptions::from_config(&config),
        );
        let task = scheduler.spawn();
        handle.start().context("scheduler exited before start")?;

        let mut printer = EventPrinter::new(&columns, self.json);
        let mut stdin = Some(BufReader::new(tokio::io::stdin()).lines());

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => match event {
                    Some(event) => printer.print(&event)?,
                    None => break,
                },
                line = next_line(&mut stdin) => match line {
                    Some(line) => {
                        if !dispatch(&handle, line.trim()).await {
                            break;
                        }
                    }
                    None => stdin = None,
                },
            }
        }

        handle.shutdown().context("scheduler already stopped")?;
        join_scheduler(task).await.context("scheduler failed")?;
        Ok(())
    }
}

async fn next_line(
    stdin: &mut Option<tokio::io::Lines<BufReader<tokio::io::Stdin>>>,
) -> Option<String> {
    match stdin {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => std::future::pending().await,
    }
}

/// Returns false on quit.
async fn dispatch(handle: &SchedulerHandle, line: &str) -> bool {
    let (cmd, arg) = match line.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (line, ""),
    };
    let outcome = match cmd {
        "" => Ok(()),
        "q" | "quit" => return false,
        "r" | "refresh" => handle.force_refresh(),
        "p" | "pause" => handle.pause(),
        "c" | "continue" | "resume" => handle.resume(),
        "s" | "sort" => match arg.parse::<Column>() {
            Ok(column) => handle.toggle_sort(column),
            Err(err) => {
                eprintln!("{} {err}", "error:".red());
                Ok(())
            }
        },
        "g" | "go" => handle.select(arg).await,
        other => {
            eprintln!("{} unknown command '{other}'", "error:".red());
            Ok(())
        }
    };
    if let Err(err) = outcome {
        eprintln!("{} {err}", "error:".red());
    }
    true
}

struct EventPrinter {
    table: RowTable,
    status: RefreshStatus,
    json: bool,
}

impl EventPrinter {
    fn new(columns: &[Column], json: bool) -> Self {
        Self {
            table: RowTable::new(columns),
            status: RefreshStatus::new(),
            json,
        }
    }

    fn print(&mut self, event: &SyncEvent) -> Result<()> {
        let applied = match event {
            SyncEvent::View(mutation) => self.table.apply(mutation).is_ok(),
            SyncEvent::Status(notice) => {
                self.track(notice);
                true
            }
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string(event).context("failed to serialize event")?
            );
            return Ok(());
        }
        if !applied {
            return Ok(());
        }
        match event {
            SyncEvent::View(mutation) => self.print_mutation(mutation),
            SyncEvent::Status(notice) => self.print_notice(notice),
        }
        Ok(())
    }

    fn track(&mut self, notice: &StatusNotice) {
        match notice {
            StatusNotice::Refreshed {
                at, shown, total, ..
            } => self.status.record_success(*at, *shown, *total),
            StatusNotice::Counts { shown, total } => self.status.set_counts(*shown, *total),
            StatusNotice::FetchFailed { detail, .. } => self.status.record_failure(detail.clone()),
            _ => {}
        }
    }

    fn print_mutation(&self, mutation: &ViewMutation) {
        match mutation {
            ViewMutation::RebuildAll { rows } => {
                if rows.is_empty() {
                    println!("{}", "(no matching issues)".bright_black());
                } else {
                    println!("{}", render_table(self.table.columns(), rows));
                }
            }
            ViewMutation::InsertRow { id, index, cells } => {
                println!("{} {id} @{index}  {}", "+".green().bold(), cells.join("  "));
            }
            ViewMutation::UpdateCell { id, column, value } => {
                println!("{} {id} {column} → {value}", "~".yellow().bold());
            }
            ViewMutation::RemoveRow { id } => {
                println!("{} {id}", "-".red().bold());
            }
            ViewMutation::SelectionMoved { id, index } => {
                println!("{} {id} (row {})", ">".cyan().bold(), index + 1);
            }
            ViewMutation::SelectionCleared => {
                println!("{} selection cleared", ">".cyan().bold());
            }
        }
    }

    fn print_notice(&self, notice: &StatusNotice) {
        match notice {
            StatusNotice::Started { mode } => {
                println!("{} watching ({mode:?})", "■".green().bold());
            }
            StatusNotice::Refreshed {
                added,
                changed,
                removed,
                ..
            } => {
                let line = format!(
                    "{}  |  +{added} ~{changed} -{removed}",
                    self.status.line(Utc::now())
                );
                println!("{}", line.bright_black());
            }
            StatusNotice::Counts { .. } => {
                println!("{}", self.status.counts_line().bright_black());
            }
            StatusNotice::FetchFailed { kind, detail } => {
                eprintln!("{} fetch failed ({kind}): {detail}", "■".red().bold());
            }
            StatusNotice::Paused => println!("{} paused", "■".yellow().bold()),
            StatusNotice::Resumed => println!("{} resumed", "■".green().bold()),
            StatusNotice::Stopped => println!("{} stopped", "■".bright_black().bold()),
        }
    }
}
