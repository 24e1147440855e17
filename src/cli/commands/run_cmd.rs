//! Batch filing command.

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, watch, Semaphore};

use crate::browser::BrowserConfig;
use crate::cli::helpers::{open_store, parse_batch_id};
use crate::config::{Config, FilingConfig, Settings};
use crate::filing::{
    BatchError, BatchEvent, BatchOrchestrator, BatchReport, FormDriver, ScriptedSurface,
};
use crate::models::BatchId;
use crate::repository::CaseStore;

/// Token prefix served by the in-memory portal during a dry run.
const REHEARSAL_PREFIX: &str = "DRY-RUN";

/// How each batch of one invocation is filed.
#[derive(Clone)]
struct RunPlan {
    filing: FilingConfig,
    #[cfg_attr(not(feature = "browser"), allow(dead_code))]
    browser: BrowserConfig,
    dry_run: bool,
}

impl RunPlan {
    fn new(config: &Config, dry_run: bool) -> Self {
        let filing = if dry_run {
            FilingConfig {
                portal: config.portal.clone(),
                form: config.form.clone(),
                ..FilingConfig::rehearsal()
            }
        } else {
            config.filing()
        };
        Self {
            filing,
            browser: config.browser.clone(),
            dry_run,
        }
    }
}

/// File the pending cases of each batch, up to `max_parallel` batches at
/// a time, each in its own browser session.
pub async fn cmd_run(
    settings: &Settings,
    config: &Config,
    batch_ids: &[String],
    dry_run: bool,
    max_parallel: usize,
) -> anyhow::Result<()> {
    if !dry_run && !cfg!(feature = "browser") {
        bail!("Browser support not compiled. Rebuild with: cargo build --features browser");
    }

    let store = open_store(settings)?;
    let mut batches: Vec<BatchId> = Vec::new();
    for raw in batch_ids {
        let batch_id = parse_batch_id(raw);
        if !batches.contains(&batch_id) {
            batches.push(batch_id);
        }
    }

    if dry_run {
        println!(
            "{} Dry run: cases go through an in-memory portal and no tokens are recorded",
            style("!").yellow()
        );
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!(
            "{} Stopping after the current case (Ctrl-C again to abort)",
            style("!").yellow()
        );
        let _ = cancel_tx.send(true);
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} Interrupted", style("✗").red());
            std::process::exit(130);
        }
    });

    let plan = RunPlan::new(config, dry_run);
    let multi = MultiProgress::new();
    let limit = Arc::new(Semaphore::new(max_parallel.max(1)));
    let total = batches.len();

    let mut handles = Vec::with_capacity(total);
    for batch_id in batches {
        let store = store.clone();
        let plan = plan.clone();
        let cancel = cancel_rx.clone();
        let bar = multi.add(batch_bar(&batch_id));
        let limit = limit.clone();
        handles.push(tokio::spawn(async move {
            let _permit = limit.acquire_owned().await;
            let result = run_batch(store, &plan, &batch_id, cancel, bar).await;
            (batch_id, result)
        }));
    }

    let mut failures = 0;
    for handle in handles {
        let (batch_id, result) = handle.await?;
        match result {
            Ok(report) => print_report(&batch_id, &report, dry_run),
            Err(e) => {
                failures += 1;
                println!("{} {}: {}", style("✗").red(), batch_id, e);
            }
        }
    }
    interrupt.abort();

    if failures > 0 {
        bail!("{} of {} batches stopped with an error", failures, total);
    }
    Ok(())
}

async fn run_batch(
    store: CaseStore,
    plan: &RunPlan,
    batch_id: &BatchId,
    cancel: watch::Receiver<bool>,
    bar: ProgressBar,
) -> Result<BatchReport, BatchError> {
    let driver = FormDriver::new(plan.filing.clone());
    let orchestrator = BatchOrchestrator::new(store, driver).with_token_recording(!plan.dry_run);

    let (event_tx, event_rx) = mpsc::channel::<BatchEvent>(100);
    let renderer = tokio::spawn(render_events(event_rx, bar, plan.dry_run));

    #[cfg(feature = "browser")]
    let result = if plan.dry_run {
        let mut surface = ScriptedSurface::rehearsal(REHEARSAL_PREFIX);
        orchestrator.run(batch_id, &mut surface, cancel, event_tx).await
    } else {
        let mut surface =
            crate::browser::ChromeSurface::new(plan.browser.clone(), plan.filing.portal.clone());
        let result = orchestrator.run(batch_id, &mut surface, cancel, event_tx).await;
        surface.close().await;
        result
    };

    #[cfg(not(feature = "browser"))]
    let result = {
        let mut surface = ScriptedSurface::rehearsal(REHEARSAL_PREFIX);
        orchestrator.run(batch_id, &mut surface, cancel, event_tx).await
    };

    let _ = renderer.await;
    result
}

fn batch_bar(batch_id: &BatchId) -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    bar.set_style(style);
    bar.set_prefix(batch_id.to_string());
    bar.set_message("waiting");
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Render orchestrator events onto one batch's progress bar.
///
/// Rehearsals record nothing, so their bar counts attempted cases instead
/// of stored tokens.
async fn render_events(mut events: mpsc::Receiver<BatchEvent>, bar: ProgressBar, dry_run: bool) {
    while let Some(event) = events.recv().await {
        match event {
            BatchEvent::Started {
                pending, progress, ..
            } => {
                if dry_run {
                    bar.set_length(pending as u64);
                } else {
                    bar.set_length(progress.total);
                    bar.set_position(progress.processed);
                }
                bar.set_message(format!("{} pending", pending));
            }
            BatchEvent::CaseStarted {
                internal_id,
                position,
                pending,
            } => bar.set_message(format!("case {} ({}/{})", internal_id, position, pending)),
            BatchEvent::CaseFiled { internal_id, token } => {
                bar.println(format!(
                    "  {} {} filed, token {}",
                    style("✓").green(),
                    internal_id,
                    token
                ));
                if dry_run {
                    bar.inc(1);
                }
            }
            BatchEvent::CaseUnconfirmed { internal_id } => {
                bar.println(format!(
                    "  {} {} finished without a confirmation token, left pending",
                    style("!").yellow(),
                    internal_id
                ));
                if dry_run {
                    bar.inc(1);
                }
            }
            BatchEvent::CaseSkipped {
                internal_id,
                reason,
            } => bar.println(format!(
                "  {} {} skipped: {}",
                style("!").yellow(),
                internal_id,
                reason
            )),
            BatchEvent::CaseFailed { internal_id, error } => bar.println(format!(
                "  {} {}: {}",
                style("✗").red(),
                internal_id,
                error
            )),
            BatchEvent::Progress(progress) => {
                if !dry_run {
                    bar.set_length(progress.total);
                    bar.set_position(progress.processed);
                }
            }
            BatchEvent::Cancelled => bar.set_message("cancelled"),
        }
    }
    bar.finish_and_clear();
}

fn print_report(batch_id: &BatchId, report: &BatchReport, dry_run: bool) {
    if report.pending == 0 {
        println!("{} {}: nothing pending", style("✓").green(), batch_id);
        return;
    }

    let mark = if report.unconfirmed > 0 || report.skipped > 0 || report.cancelled {
        style("!").yellow()
    } else {
        style("✓").green()
    };
    println!(
        "{} {}: {} {}, {} unconfirmed, {} skipped",
        mark,
        batch_id,
        report.filed,
        if dry_run { "rehearsed" } else { "filed" },
        report.unconfirmed,
        report.skipped
    );
    if report.already_done > 0 {
        println!(
            "  {} cases were completed by another run meanwhile",
            report.already_done
        );
    }
    if report.cancelled {
        println!(
            "  {} Cancelled with {} cases untouched; run again to resume",
            style("!").yellow(),
            report
                .pending
                .saturating_sub(report.attempted() + report.skipped + report.already_done)
        );
    }
}
