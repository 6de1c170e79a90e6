use crate::config::Settings;
use crate::engine::Reconciler;
use crate::model::{PassOutcome, ReorderEvent};
use crate::orchestrator::{run_controller, Trigger};
use crate::platform::{MemoryPlatform, Snapshot};
use crate::policy::{SortKey, SortKeyPolicy};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "tabsort",
    version,
    about = "Reorder tabs in a window snapshot with the fewest block moves"
)]
pub struct Cli {
    /// Window/tab snapshot to reorder (JSON)
    #[arg(long)]
    pub snapshot: std::path::PathBuf,

    /// Settings file (defaults to <config dir>/tabsort/config.json when present)
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// Print JSON pass reports
    #[arg(long)]
    pub json: bool,

    /// Print a text summary (default)
    #[arg(long)]
    pub text: bool,

    /// Sort key used to compute the desired order
    #[arg(long, value_enum)]
    pub policy: Option<SortKey>,

    /// Use --reordering-enabled true or --reordering-enabled false to override
    #[arg(long, action = clap::ArgAction::Set)]
    pub reordering_enabled: Option<bool>,

    /// Passes slower than this are logged
    #[arg(long)]
    pub slow_pass_threshold: Option<humantime::Duration>,

    /// Number of triggers to fire
    #[arg(long, default_value_t = 1)]
    pub passes: usize,

    /// Delay between consecutive triggers
    #[arg(long, default_value = "0s")]
    pub trigger_interval: humantime::Duration,

    /// Reason reported for each trigger
    #[arg(long, value_enum, default_value_t = Trigger::Manual)]
    pub trigger: Trigger,

    /// Write the reordered snapshot here
    #[arg(long)]
    pub export: Option<std::path::PathBuf>,
}

/// Build `Settings` from the settings file, then apply CLI overrides.
pub fn build_settings(args: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(policy) = args.policy {
        settings.policy = policy;
    }
    if let Some(enabled) = args.reordering_enabled {
        settings.reordering_enabled = enabled;
    }
    if let Some(threshold) = args.slow_pass_threshold {
        settings.slow_pass_threshold = Duration::from(threshold);
    }
    Ok(settings)
}

pub async fn run(args: Cli) -> Result<()> {
    if args.json && args.text {
        return Err(anyhow::anyhow!("--json and --text are mutually exclusive"));
    }

    let settings = build_settings(&args)?;
    let snapshot = Snapshot::load(&args.snapshot)?;
    let platform = Arc::new(MemoryPlatform::new(snapshot));
    let policy = Arc::new(SortKeyPolicy::new(settings.policy));

    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<ReorderEvent>();
    let reconciler =
        Arc::new(Reconciler::new(platform.clone(), policy, &settings).with_events(evt_tx));

    let (trigger_tx, trigger_rx) = mpsc::unbounded_channel::<Trigger>();
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<PassOutcome>();
    let controller = tokio::spawn(run_controller(reconciler, trigger_rx, outcome_tx));

    // Lifecycle events go to stderr as they happen.
    let ev_out = out_tx.clone();
    let printer = tokio::spawn(async move {
        while let Some(ev) = evt_rx.recv().await {
            let _ = ev_out.send(OutputLine::Stderr(ev.to_message()));
        }
    });

    let interval = Duration::from(args.trigger_interval);
    for i in 0..args.passes {
        if i > 0 && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
        trigger_tx
            .send(args.trigger)
            .context("trigger loop stopped early")?;
    }
    drop(trigger_tx);

    controller.await.context("trigger loop task failed")??;
    let _ = printer.await;

    let mut outcomes = Vec::new();
    while let Some(outcome) = outcome_rx.recv().await {
        outcomes.push(outcome);
    }

    if args.json {
        let reports: Vec<_> = outcomes
            .iter()
            .filter_map(|o| match o {
                PassOutcome::Completed(r) => Some(r),
                PassOutcome::AlreadyRunning | PassOutcome::Disabled => None,
            })
            .collect();
        let out = serde_json::to_string_pretty(&reports)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        let summary = crate::text_summary::build_text_summary(&outcomes);
        for line in summary.lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }

    if let Some(path) = args.export.as_deref() {
        platform.snapshot().save(path)?;
        let _ = out_tx.send(OutputLine::Stderr(format!("Exported: {}", path.display())));
    }

    drop(out_tx);
    let _ = out_handle.await;

    let failed: usize = outcomes
        .iter()
        .map(|o| match o {
            PassOutcome::Completed(r) if !r.succeeded() => r.windows_failed().max(1),
            _ => 0,
        })
        .sum();
    if failed > 0 {
        return Err(anyhow::anyhow!("{failed} window(s) could not be reordered"));
    }
    Ok(())
}
