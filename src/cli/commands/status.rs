//! Batch progress command.

use std::time::Duration;

use chrono::Local;
use console::{style, Term};
use serde::Serialize;

use crate::cli::helpers::{open_store, parse_batch_id};
use crate::config::Settings;
use crate::models::{BatchId, ProgressSnapshot};
use crate::repository::CaseStore;

#[derive(Serialize)]
struct StatusReport<'a> {
    batch_id: &'a BatchId,
    processed: u64,
    total: u64,
    remaining: u64,
    percent: u64,
    complete: bool,
}

impl<'a> StatusReport<'a> {
    fn new(batch_id: &'a BatchId, progress: ProgressSnapshot) -> Self {
        Self {
            batch_id,
            processed: progress.processed,
            total: progress.total,
            remaining: progress.remaining(),
            percent: progress.percent(),
            complete: progress.is_complete(),
        }
    }
}

/// Show how far a batch has got.
pub async fn cmd_status(
    settings: &Settings,
    batch_id: &str,
    watch: bool,
    interval: u64,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(settings)?;
    let batch_id = parse_batch_id(batch_id);

    if !watch {
        let progress = store.progress(&batch_id).await?;
        return display_status(&batch_id, progress, json);
    }

    run_watch(&store, &batch_id, interval.max(1), json).await
}

fn display_status(batch_id: &BatchId, progress: ProgressSnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&StatusReport::new(batch_id, progress))?
        );
        return Ok(());
    }

    if progress.total == 0 {
        println!("{} Batch {} has no cases", style("!").yellow(), batch_id);
        return Ok(());
    }

    let state = if progress.is_complete() {
        style("complete").green()
    } else {
        style("in progress").cyan()
    };
    println!("{} {}", style(batch_id).bold(), state);
    println!("  {:<12} {:>8}", "Filed:", progress.processed);
    println!("  {:<12} {:>8}", "Pending:", progress.remaining());
    println!("  {:<12} {:>8}", "Total:", progress.total);
    println!("  {:<12} {:>7}%", "Progress:", progress.percent());
    Ok(())
}

/// Redraw the status every `interval` seconds until the batch completes or
/// Ctrl-C is pressed.
async fn run_watch(
    store: &CaseStore,
    batch_id: &BatchId,
    interval: u64,
    json: bool,
) -> anyhow::Result<()> {
    let term = Term::stdout();
    loop {
        let progress = store.progress(batch_id).await?;

        if !json {
            term.clear_screen()?;
            println!(
                "{:<40} Last updated: {}",
                style("courtfile status").bold(),
                Local::now().format("%Y-%m-%d %H:%M:%S")
            );
        }
        display_status(batch_id, progress, json)?;

        if progress.is_complete() || progress.total == 0 {
            return Ok(());
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
        }
    }
}
