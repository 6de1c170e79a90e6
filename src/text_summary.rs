//! Text summary builder for CLI output.

use crate::model::{PassOutcome, PassReport, WindowStatus};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

fn ids_to_string<T: std::fmt::Display>(ids: &[T]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn report_lines(report: &PassReport, lines: &mut Vec<String>) {
    lines.push(format!(
        "Pass {:016x}: {} window(s), {} move(s), {} ms",
        report.pass_id,
        report.windows.len(),
        report.moves_issued(),
        report.elapsed_ms
    ));
    if let Some(e) = report.enumeration_error.as_deref() {
        lines.push(format!("  error: {e}"));
    }
    for w in &report.windows {
        let head = format!(
            "  Window {} ({} pinned, {} reorderable)",
            w.window, w.pinned, w.reorderable
        );
        match &w.status {
            WindowStatus::Unchanged => lines.push(format!("{head}: already in order")),
            WindowStatus::Unavailable => lines.push(format!("{head}: closed, skipped")),
            WindowStatus::Reordered { moves } | WindowStatus::Failed { moves, .. } => {
                let verdict = if w.is_failed() { "FAILED" } else { "reordered" };
                lines.push(format!("{head}: {verdict}"));
                for m in moves {
                    lines.push(format!(
                        "    move [{}] -> {}",
                        ids_to_string(&m.moving_ids),
                        m.target_index + w.pinned
                    ));
                }
                if let WindowStatus::Failed { errors, .. } = &w.status {
                    for e in errors {
                        lines.push(format!("    error: {e}"));
                    }
                }
            }
        }
        if !w.inconsistent.is_empty() {
            lines.push(format!(
                "    left in place: [{}]",
                ids_to_string(&w.inconsistent)
            ));
        }
    }
}

/// Build a text summary from the outcomes of a CLI run.
pub(crate) fn build_text_summary(outcomes: &[PassOutcome]) -> TextSummary {
    let mut lines = Vec::new();
    let mut dropped = 0usize;
    for outcome in outcomes {
        match outcome {
            PassOutcome::Completed(report) => report_lines(report, &mut lines),
            PassOutcome::AlreadyRunning => dropped += 1,
            PassOutcome::Disabled => lines.push("Reordering is disabled".into()),
        }
    }
    if dropped > 0 {
        lines.push(format!("{dropped} request(s) dropped while a pass was running"));
    }
    TextSummary { lines }
}
