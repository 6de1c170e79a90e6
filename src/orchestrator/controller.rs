//! Trigger loop.
//!
//! Every trigger spawns a pass. Passes never queue: the reconciler's
//! single-flight guard drops requests that overlap a running pass.

use crate::engine::Reconciler;
use crate::model::PassOutcome;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::{JoinError, JoinSet};

/// Why a pass was requested. Carries no payload; the pass re-reads everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Trigger {
    /// The order policy changed its mind.
    PolicyChanged,
    /// Tab tags or groupings changed.
    TagsChanged,
    /// Explicit request from a UI/CLI layer.
    Manual,
}

fn forward(done: Result<PassOutcome, JoinError>, outcome_tx: &UnboundedSender<PassOutcome>) {
    match done {
        Ok(outcome) => {
            let _ = outcome_tx.send(outcome);
        }
        Err(e) => tracing::error!("reordering task failed: {e}"),
    }
}

/// Run passes for incoming triggers until the trigger channel closes, then
/// wait for in-flight passes before returning.
pub async fn run_controller(
    reconciler: Arc<Reconciler>,
    mut trigger_rx: UnboundedReceiver<Trigger>,
    outcome_tx: UnboundedSender<PassOutcome>,
) -> Result<()> {
    let mut passes: JoinSet<PassOutcome> = JoinSet::new();

    loop {
        tokio::select! {
            trigger = trigger_rx.recv() => {
                match trigger {
                    Some(trigger) => {
                        tracing::debug!(?trigger, "reordering requested");
                        let r = reconciler.clone();
                        passes.spawn(async move { r.reconcile().await });
                    }
                    None => break,
                }
            }
            Some(done) = passes.join_next(), if !passes.is_empty() => {
                forward(done, &outcome_tx);
            }
        }
    }

    while let Some(done) = passes.join_next().await {
        forward(done, &outcome_tx);
    }
    Ok(())
}
