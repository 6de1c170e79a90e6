//! In-memory tab platform.
//!
//! Holds a table of windows behind a lock and applies moves the way a browser
//! tab strip does. Tests use the failure-injection hooks and call counters to
//! observe what the engine asked for.

use super::TabPlatform;
use crate::error::PlatformError;
use crate::model::{Tab, TabId, WindowId, WindowInfo, WindowKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub windows: Vec<WindowSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub id: WindowId,
    #[serde(default)]
    pub kind: WindowKind,
    #[serde(default)]
    pub tabs: Vec<Tab>,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let snapshot: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
        snapshot
            .validate()
            .with_context(|| format!("invalid snapshot {}", path.display()))?;
        Ok(snapshot)
    }

    /// Every window must list its pinned tabs before any unpinned one.
    pub fn validate(&self) -> Result<()> {
        for w in &self.windows {
            let prefix = w.tabs.iter().take_while(|t| t.pinned).count();
            if let Some(tab) = w.tabs[prefix..].iter().find(|t| t.pinned) {
                anyhow::bail!(
                    "window {}: pinned tab {} follows an unpinned tab",
                    w.id,
                    tab.id
                );
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let out = serde_json::to_string_pretty(self)?;
        std::fs::write(path, out)
            .with_context(|| format!("failed to write snapshot {}", path.display()))
    }
}

/// Per-operation call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list_windows: usize,
    pub list_tabs: usize,
    pub move_tabs: usize,
}

#[derive(Debug, Default)]
struct Counters {
    list_windows: AtomicUsize,
    list_tabs: AtomicUsize,
    move_tabs: AtomicUsize,
}

#[derive(Debug, Default)]
struct Faults {
    /// Listed by `list_windows` but gone by the time tabs are read.
    vanishing: HashSet<WindowId>,
    /// Every move touching these windows is refused.
    rejecting: HashSet<WindowId>,
    /// Still listed, but reading their tabs is refused.
    unreadable: HashSet<WindowId>,
}

#[derive(Debug, Default)]
pub struct MemoryPlatform {
    windows: RwLock<Vec<WindowSnapshot>>,
    faults: RwLock<Faults>,
    counters: Counters,
    issued: Mutex<Vec<(Vec<TabId>, usize)>>,
    latency: Option<Duration>,
}

fn poison_err<T>(_: PoisonError<T>) -> PlatformError {
    PlatformError::Rejected {
        reason: "platform state lock poisoned".into(),
    }
}

impl MemoryPlatform {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            windows: RwLock::new(snapshot.windows),
            ..Default::default()
        }
    }

    /// Delay every platform call, so overlapping passes can be observed.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn vanish_on_read(&self, window: WindowId) {
        if let Ok(mut f) = self.faults.write() {
            f.vanishing.insert(window);
        }
    }

    pub fn reject_reads_in(&self, window: WindowId) {
        if let Ok(mut f) = self.faults.write() {
            f.unreadable.insert(window);
        }
    }

    pub fn reject_moves_in(&self, window: WindowId) {
        if let Ok(mut f) = self.faults.write() {
            f.rejecting.insert(window);
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let windows = self
            .windows
            .read()
            .map(|w| w.clone())
            .unwrap_or_else(|p| p.into_inner().clone());
        Snapshot { windows }
    }

    /// Tab ids of one window in current order.
    pub fn order(&self, window: WindowId) -> Vec<TabId> {
        self.snapshot()
            .windows
            .into_iter()
            .find(|w| w.id == window)
            .map(|w| w.tabs.into_iter().map(|t| t.id).collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list_windows: self.counters.list_windows.load(Ordering::Relaxed),
            list_tabs: self.counters.list_tabs.load(Ordering::Relaxed),
            move_tabs: self.counters.move_tabs.load(Ordering::Relaxed),
        }
    }

    /// Every move command received, as `(ids, absolute index)`.
    pub fn issued_moves(&self) -> Vec<(Vec<TabId>, usize)> {
        self.issued
            .lock()
            .map(|m| m.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    async fn simulate_latency(&self) {
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }
    }
}

/// Relocate `ids` inside one tab strip. Unpinned tabs never land inside the
/// pinned prefix.
fn move_within(tabs: &mut Vec<Tab>, ids: &[TabId], index: usize) -> Result<(), PlatformError> {
    let mut block = Vec::with_capacity(ids.len());
    for id in ids {
        let pos = tabs
            .iter()
            .position(|t| t.id == *id)
            .ok_or(PlatformError::TabNotFound(*id))?;
        block.push(tabs.remove(pos));
    }
    let pinned = tabs.iter().filter(|t| t.pinned).count();
    let mut at = index.min(tabs.len());
    if block.iter().all(|t| !t.pinned) {
        at = at.max(pinned);
    }
    tabs.splice(at..at, block);
    Ok(())
}

#[async_trait]
impl TabPlatform for MemoryPlatform {
    async fn list_windows(&self) -> Result<Vec<WindowInfo>, PlatformError> {
        self.counters.list_windows.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;
        let windows = self.windows.read().map_err(poison_err)?;
        Ok(windows
            .iter()
            .map(|w| WindowInfo {
                id: w.id,
                kind: w.kind,
            })
            .collect())
    }

    async fn list_tabs(&self, window: WindowId) -> Result<Vec<Tab>, PlatformError> {
        self.counters.list_tabs.fetch_add(1, Ordering::Relaxed);
        self.simulate_latency().await;
        {
            let faults = self.faults.read().map_err(poison_err)?;
            if faults.vanishing.contains(&window) {
                return Err(PlatformError::WindowNotFound(window));
            }
            if faults.unreadable.contains(&window) {
                return Err(PlatformError::Rejected {
                    reason: "permission denied".into(),
                });
            }
        }
        let windows = self.windows.read().map_err(poison_err)?;
        windows
            .iter()
            .find(|w| w.id == window)
            .map(|w| w.tabs.clone())
            .ok_or(PlatformError::WindowNotFound(window))
    }

    async fn move_tabs(&self, ids: &[TabId], index: usize) -> Result<(), PlatformError> {
        self.counters.move_tabs.fetch_add(1, Ordering::Relaxed);
        self.issued
            .lock()
            .map_err(poison_err)?
            .push((ids.to_vec(), index));
        self.simulate_latency().await;

        let Some(first) = ids.first() else {
            return Ok(());
        };
        let mut windows = self.windows.write().map_err(poison_err)?;
        let window = windows
            .iter_mut()
            .find(|w| w.tabs.iter().any(|t| t.id == *first))
            .ok_or(PlatformError::TabNotFound(*first))?;
        if self
            .faults
            .read()
            .map_err(poison_err)?
            .rejecting
            .contains(&window.id)
        {
            return Err(PlatformError::Rejected {
                reason: format!("moves in window {} are blocked", window.id),
            });
        }
        if let Some(stray) = ids
            .iter()
            .find(|id| !window.tabs.iter().any(|t| t.id == **id))
        {
            return Err(PlatformError::TabNotFound(*stray));
        }
        move_within(&mut window.tabs, ids, index)
    }
}
