//! Reordering engine.
//!
//! A pass reads every eligible window, asks the order policy where its tabs
//! should go, plans the fewest block moves, and sends them to the platform.
//! Windows are handled concurrently and a failure in one never stops the
//! others. Only one pass runs at a time; requests that arrive meanwhile are
//! dropped, since the next trigger picks up whatever they would have fixed.

mod executor;
mod guard;
pub mod planner;
mod snapshot;

use crate::config::Settings;
use crate::error::ReorderError;
use crate::model::{
    PassOutcome, PassReport, ReorderEvent, TabId, WindowId, WindowKind, WindowReport, WindowStatus,
};
use crate::platform::TabPlatform;
use crate::policy::OrderPolicy;
use futures::future::join_all;
use guard::SingleFlight;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub struct Reconciler {
    platform: Arc<dyn TabPlatform>,
    policy: Arc<dyn OrderPolicy>,
    enabled: Arc<AtomicBool>,
    window_kinds: Vec<WindowKind>,
    slow_pass_threshold: Duration,
    flight: SingleFlight,
    event_tx: Option<mpsc::UnboundedSender<ReorderEvent>>,
}

fn now_ms() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

impl Reconciler {
    pub fn new(
        platform: Arc<dyn TabPlatform>,
        policy: Arc<dyn OrderPolicy>,
        settings: &Settings,
    ) -> Self {
        Self {
            platform,
            policy,
            enabled: Arc::new(AtomicBool::new(settings.reordering_enabled)),
            window_kinds: settings.window_kinds.clone(),
            slow_pass_threshold: settings.slow_pass_threshold,
            flight: SingleFlight::default(),
            event_tx: None,
        }
    }

    /// Broadcast lifecycle events on `tx`. Undeliverable events are dropped.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<ReorderEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Shared switch; flipping it affects the next pass.
    pub fn enabled_flag(&self) -> Arc<AtomicBool> {
        self.enabled.clone()
    }

    pub fn is_running(&self) -> bool {
        self.flight.is_running()
    }

    fn emit(&self, event: ReorderEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    /// Run one reordering pass over every eligible window.
    pub async fn reconcile(&self) -> PassOutcome {
        if !self.enabled.load(Ordering::Relaxed) {
            return PassOutcome::Disabled;
        }
        let Some(_guard) = self.flight.try_acquire() else {
            tracing::debug!("reordering already in progress, request dropped");
            return PassOutcome::AlreadyRunning;
        };

        let pass_id: u64 = rand::random();
        let started = Instant::now();
        let start_time_ms = now_ms();
        self.emit(ReorderEvent::ReorderStarted {
            pass_id,
            start_time_ms,
        });

        let listed = self.platform.list_windows().await;
        let (windows, enumeration_error): (Vec<WindowId>, Option<String>) = match listed {
            Ok(all) => (
                all.into_iter()
                    .filter(|w| self.window_kinds.contains(&w.kind))
                    .map(|w| w.id)
                    .collect(),
                None,
            ),
            Err(e) => {
                let e = ReorderError::Enumeration(e);
                tracing::error!(pass_id, "{e}");
                (Vec::new(), Some(e.to_string()))
            }
        };

        let reports = join_all(windows.into_iter().map(|w| self.reorder_window(w))).await;

        let elapsed = started.elapsed();
        let report = PassReport {
            pass_id,
            start_time_ms,
            end_time_ms: now_ms(),
            elapsed_ms: elapsed.as_millis() as u64,
            windows: reports,
            enumeration_error,
        };

        if report.succeeded() {
            if elapsed > self.slow_pass_threshold {
                tracing::info!(pass_id, "reordering took {} ms", report.elapsed_ms);
            } else {
                tracing::debug!(
                    pass_id,
                    moves = report.moves_issued(),
                    "reordering finished in {} ms",
                    report.elapsed_ms
                );
            }
        } else {
            tracing::error!(
                pass_id,
                windows_failed = report.windows_failed(),
                "reordering failed in {} ms",
                report.elapsed_ms
            );
        }

        self.emit(ReorderEvent::ReorderEnded {
            pass_id,
            end_time_ms: report.end_time_ms,
            elapsed_ms: report.elapsed_ms,
            windows_failed: report.windows_failed(),
            moves_issued: report.moves_issued(),
        });

        PassOutcome::Completed(report)
    }

    /// Snapshot, plan and execute for one window. Never fails; every error
    /// ends up in the returned report.
    async fn reorder_window(&self, window: WindowId) -> WindowReport {
        let mut report = WindowReport {
            window,
            pinned: 0,
            reorderable: 0,
            status: WindowStatus::Unchanged,
            inconsistent: Vec::new(),
        };

        let tabs = match snapshot::read_window(&*self.platform, window).await {
            Ok(tabs) => tabs,
            Err(e @ ReorderError::PartitionUnavailable { .. }) => {
                tracing::debug!(%window, "{e}, skipping");
                report.status = WindowStatus::Unavailable;
                return report;
            }
            Err(e) => {
                tracing::warn!("{e}");
                report.status = WindowStatus::Failed {
                    moves: Vec::new(),
                    errors: vec![e.to_string()],
                };
                return report;
            }
        };
        report.pinned = tabs.pinned.len();
        report.reorderable = tabs.reorderable.len();

        let observed: Vec<TabId> = tabs.reorderable.iter().map(|t| t.id).collect();
        let desired = match self.policy.desired_order(&tabs.reorderable).await {
            Ok(desired) => desired,
            Err(source) => {
                let e = ReorderError::OrderPolicyFailed { window, source };
                tracing::warn!("{e}");
                report.status = WindowStatus::Failed {
                    moves: Vec::new(),
                    errors: vec![e.to_string()],
                };
                return report;
            }
        };

        let mut plan = planner::plan_moves(&observed, &desired);
        if !plan.inconsistent.is_empty() {
            report.inconsistent = std::mem::take(&mut plan.inconsistent);
            let e = ReorderError::PlanningInconsistency {
                window,
                ids: report.inconsistent.clone(),
            };
            tracing::warn!("{e}");
        }
        if plan.is_empty() {
            return report;
        }

        let errors =
            executor::execute_moves(&*self.platform, window, &plan.moves, tabs.pinned.len()).await;
        report.status = if errors.is_empty() {
            WindowStatus::Reordered { moves: plan.moves }
        } else {
            WindowStatus::Failed {
                moves: plan.moves,
                errors: errors.iter().map(ToString::to_string).collect(),
            }
        };
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tab;
    use crate::platform::{MemoryPlatform, Snapshot, WindowSnapshot};
    use async_trait::async_trait;
    use proptest::prelude::*;

    /// Orders tabs by their position in a fixed global list.
    struct Ranked(Vec<u64>);

    #[async_trait]
    impl OrderPolicy for Ranked {
        async fn desired_order(&self, tabs: &[Tab]) -> anyhow::Result<Vec<TabId>> {
            let mut ids: Vec<TabId> = tabs.iter().map(|t| t.id).collect();
            ids.sort_by_key(|id| self.0.iter().position(|r| *r == id.0));
            Ok(ids)
        }
    }

    /// Fails for any window containing the poisoned tab.
    struct Poisoned(u64);

    #[async_trait]
    impl OrderPolicy for Poisoned {
        async fn desired_order(&self, tabs: &[Tab]) -> anyhow::Result<Vec<TabId>> {
            if tabs.iter().any(|t| t.id.0 == self.0) {
                anyhow::bail!("cannot rank tab {}", self.0);
            }
            Ok(tabs.iter().rev().map(|t| t.id).collect())
        }
    }

    fn window(id: u64, kind: WindowKind, tabs: Vec<Tab>) -> WindowSnapshot {
        WindowSnapshot {
            id: WindowId(id),
            kind,
            tabs,
        }
    }

    fn tabs(ids: &[u64]) -> Vec<Tab> {
        ids.iter().copied().map(Tab::new).collect()
    }

    fn ids(v: &[u64]) -> Vec<TabId> {
        v.iter().copied().map(TabId).collect()
    }

    fn reconciler(
        platform: Arc<MemoryPlatform>,
        policy: impl OrderPolicy + 'static,
    ) -> (Reconciler, mpsc::UnboundedReceiver<ReorderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let r = Reconciler::new(platform, Arc::new(policy), &Settings::default()).with_events(tx);
        (r, rx)
    }

    fn completed(outcome: PassOutcome) -> PassReport {
        match outcome {
            PassOutcome::Completed(report) => report,
            other => panic!("expected a completed pass, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pinned_tabs_offset_platform_index() {
        let p = Arc::new(MemoryPlatform::new(Snapshot {
            windows: vec![window(
                1,
                WindowKind::Normal,
                vec![Tab::new(1).pinned(), Tab::new(2), Tab::new(3)],
            )],
        }));
        let (r, _rx) = reconciler(p.clone(), Ranked(vec![3, 2]));
        let report = completed(r.reconcile().await);

        assert_eq!(p.issued_moves(), vec![(ids(&[3]), 1)]);
        assert_eq!(p.order(WindowId(1)), ids(&[1, 3, 2]));
        assert_eq!(report.windows[0].pinned, 1);
        assert!(report.succeeded());
    }

    #[tokio::test]
    async fn pass_converges_every_window() {
        let p = Arc::new(MemoryPlatform::new(Snapshot {
            windows: vec![
                window(1, WindowKind::Normal, tabs(&[1, 2, 3, 4, 5])),
                window(2, WindowKind::Normal, tabs(&[10, 9, 8, 7, 6])),
            ],
        }));
        let rank = vec![1, 3, 4, 2, 5, 6, 7, 8, 9, 10];
        let (r, _rx) = reconciler(p.clone(), Ranked(rank));
        let report = completed(r.reconcile().await);

        assert_eq!(p.order(WindowId(1)), ids(&[1, 3, 4, 2, 5]));
        assert_eq!(p.order(WindowId(2)), ids(&[6, 7, 8, 9, 10]));
        assert_eq!(report.windows[0].moves_issued(), 1);

        // A second pass finds nothing to do.
        let again = completed(r.reconcile().await);
        assert_eq!(again.moves_issued(), 0);
        assert!(again
            .windows
            .iter()
            .all(|w| w.status == WindowStatus::Unchanged));
    }

    #[tokio::test]
    async fn overlapping_request_touches_nothing() {
        let p = Arc::new(
            MemoryPlatform::new(Snapshot {
                windows: vec![window(1, WindowKind::Normal, tabs(&[2, 1]))],
            })
            .with_latency(Duration::from_millis(20)),
        );
        let (r, _rx) = reconciler(p.clone(), Ranked(vec![1, 2]));

        let (first, second) = tokio::join!(r.reconcile(), async {
            tokio::task::yield_now().await;
            let calls = p.calls();
            (r.reconcile().await, calls)
        });
        let (second, calls_before) = second;

        assert!(matches!(first, PassOutcome::Completed(_)));
        assert!(matches!(second, PassOutcome::AlreadyRunning));
        assert_eq!(calls_before.list_windows, 1);
        assert_eq!(p.calls().list_windows, 1);
        assert!(!r.is_running());
        assert!(matches!(r.reconcile().await, PassOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn disabled_pass_is_silent() {
        let p = Arc::new(MemoryPlatform::new(Snapshot {
            windows: vec![window(1, WindowKind::Normal, tabs(&[2, 1]))],
        }));
        let (r, mut rx) = reconciler(p.clone(), Ranked(vec![1, 2]));
        r.enabled_flag().store(false, Ordering::Relaxed);

        assert!(matches!(r.reconcile().await, PassOutcome::Disabled));
        assert_eq!(p.calls(), Default::default());
        assert!(rx.try_recv().is_err());
        assert!(!r.is_running());
    }

    #[tokio::test]
    async fn failing_window_does_not_block_others() {
        let p = Arc::new(MemoryPlatform::new(Snapshot {
            windows: vec![
                window(1, WindowKind::Normal, tabs(&[2, 1])),
                window(2, WindowKind::Normal, tabs(&[4, 3])),
            ],
        }));
        p.reject_moves_in(WindowId(2));
        let (r, mut rx) = reconciler(p.clone(), Ranked(vec![1, 2, 3, 4]));
        let report = completed(r.reconcile().await);

        assert_eq!(p.order(WindowId(1)), ids(&[1, 2]));
        assert_eq!(p.order(WindowId(2)), ids(&[4, 3]));
        assert!(!report.succeeded());
        assert!(report.windows[1].is_failed());
        assert!(!r.is_running());

        let Ok(ReorderEvent::ReorderStarted { start_time_ms, .. }) = rx.try_recv() else {
            panic!("missing start event");
        };
        let Ok(ReorderEvent::ReorderEnded {
            end_time_ms,
            windows_failed,
            ..
        }) = rx.try_recv()
        else {
            panic!("missing end event");
        };
        assert!(end_time_ms >= start_time_ms);
        assert_eq!(end_time_ms, report.end_time_ms);
        assert_eq!(windows_failed, 1);
    }

    #[tokio::test]
    async fn vanished_window_is_skipped_not_failed() {
        let p = Arc::new(MemoryPlatform::new(Snapshot {
            windows: vec![
                window(1, WindowKind::Normal, tabs(&[2, 1])),
                window(2, WindowKind::Normal, tabs(&[4, 3])),
            ],
        }));
        p.vanish_on_read(WindowId(1));
        let (r, _rx) = reconciler(p.clone(), Ranked(vec![1, 2, 3, 4]));
        let report = completed(r.reconcile().await);

        assert_eq!(report.windows[0].status, WindowStatus::Unavailable);
        assert!(report.succeeded());
        assert_eq!(p.order(WindowId(2)), ids(&[3, 4]));
    }

    #[tokio::test]
    async fn unreadable_window_fails_instead_of_skipping() {
        let p = Arc::new(MemoryPlatform::new(Snapshot {
            windows: vec![
                window(1, WindowKind::Normal, tabs(&[2, 1])),
                window(2, WindowKind::Normal, tabs(&[4, 3])),
            ],
        }));
        p.reject_reads_in(WindowId(1));
        let (r, mut rx) = reconciler(p.clone(), Ranked(vec![1, 2, 3, 4]));
        let report = completed(r.reconcile().await);

        let WindowStatus::Failed { moves, errors } = &report.windows[0].status else {
            panic!("expected a failed window, got {:?}", report.windows[0].status);
        };
        assert!(moves.is_empty());
        assert!(errors[0].contains("permission denied"));
        assert!(!report.succeeded());
        assert_eq!(report.windows_failed(), 1);
        assert_eq!(p.order(WindowId(1)), ids(&[2, 1]));
        assert_eq!(p.order(WindowId(2)), ids(&[3, 4]));

        let _started = rx.try_recv();
        let Ok(ReorderEvent::ReorderEnded { windows_failed, .. }) = rx.try_recv() else {
            panic!("missing end event");
        };
        assert_eq!(windows_failed, 1);
    }

    #[tokio::test]
    async fn policy_error_fails_only_its_window() {
        let p = Arc::new(MemoryPlatform::new(Snapshot {
            windows: vec![
                window(1, WindowKind::Normal, tabs(&[1, 2, 3])),
                window(2, WindowKind::Normal, tabs(&[4, 5, 6])),
            ],
        }));
        let (r, _rx) = reconciler(p.clone(), Poisoned(5));
        let report = completed(r.reconcile().await);

        assert_eq!(p.order(WindowId(1)), ids(&[3, 2, 1]));
        assert_eq!(p.order(WindowId(2)), ids(&[4, 5, 6]));
        assert_eq!(report.windows_failed(), 1);
    }

    #[tokio::test]
    async fn only_configured_window_kinds_are_touched() {
        let p = Arc::new(MemoryPlatform::new(Snapshot {
            windows: vec![
                window(1, WindowKind::Normal, tabs(&[2, 1])),
                window(2, WindowKind::Popup, tabs(&[4, 3])),
            ],
        }));
        let (r, _rx) = reconciler(p.clone(), Ranked(vec![1, 2, 3, 4]));
        let report = completed(r.reconcile().await);

        assert_eq!(report.windows.len(), 1);
        assert_eq!(p.order(WindowId(2)), ids(&[4, 3]));
        assert_eq!(p.calls().list_tabs, 1);
    }

    proptest::proptest! {
        #[test]
        fn pinned_prefix_survives_any_reorder(
            pinned in 0usize..4,
            (observed, desired) in (0usize..=30).prop_flat_map(|n| {
                let ids: Vec<u64> = (100..100 + n as u64).collect();
                (Just(ids.clone()).prop_shuffle(), Just(ids).prop_shuffle())
            }),
        ) {
            let mut strip: Vec<Tab> = (1..=pinned as u64).map(|id| Tab::new(id).pinned()).collect();
            strip.extend(observed.iter().copied().map(Tab::new));
            let p = Arc::new(MemoryPlatform::new(Snapshot {
                windows: vec![window(1, WindowKind::Normal, strip)],
            }));
            let (r, _rx) = reconciler(p.clone(), Ranked(desired.clone()));

            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let report = completed(rt.block_on(r.reconcile()));

            let mut expected: Vec<u64> = (1..=pinned as u64).collect();
            expected.extend(desired.iter().copied());
            prop_assert_eq!(p.order(WindowId(1)), ids(&expected));
            prop_assert!(report.succeeded());
            for (moved, index) in p.issued_moves() {
                prop_assert!(index >= pinned);
                prop_assert!(moved.iter().all(|id| id.0 >= 100));
            }
        }
    }

    #[tokio::test]
    async fn inconsistent_policy_output_is_reported() {
        struct Extra;

        #[async_trait]
        impl OrderPolicy for Extra {
            async fn desired_order(&self, tabs: &[Tab]) -> anyhow::Result<Vec<TabId>> {
                let mut ids: Vec<TabId> = tabs.iter().rev().map(|t| t.id).collect();
                ids.push(TabId(99));
                Ok(ids)
            }
        }

        let p = Arc::new(MemoryPlatform::new(Snapshot {
            windows: vec![window(1, WindowKind::Normal, tabs(&[1, 2]))],
        }));
        let (r, _rx) = reconciler(p.clone(), Extra);
        let report = completed(r.reconcile().await);

        assert_eq!(report.windows[0].inconsistent, ids(&[99]));
        assert_eq!(p.order(WindowId(1)), ids(&[2, 1]));
        assert!(report.succeeded());
    }
}
