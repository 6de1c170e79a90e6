use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Container (cookie store) the tab belongs to.
    #[serde(default)]
    pub container: Option<String>,
}

impl Tab {
    pub fn new(id: u64) -> Self {
        Self {
            id: TabId(id),
            pinned: false,
            title: None,
            url: None,
            container: None,
        }
    }

    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    #[default]
    Normal,
    Popup,
    Panel,
    Devtools,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    pub kind: WindowKind,
}

/// A block move planned against the reorderable (unpinned) part of a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOp<T> {
    pub moving_ids: Vec<T>,
    pub target_index: usize,
}

/// Lifecycle notifications broadcast by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReorderEvent {
    ReorderStarted {
        pass_id: u64,
        start_time_ms: i64,
    },
    ReorderEnded {
        pass_id: u64,
        end_time_ms: i64,
        elapsed_ms: u64,
        windows_failed: usize,
        moves_issued: usize,
    },
}

impl ReorderEvent {
    pub fn to_message(&self) -> String {
        match self {
            ReorderEvent::ReorderStarted {
                pass_id,
                start_time_ms,
            } => format!("Reordering started (pass {pass_id:016x}, t={start_time_ms})"),
            ReorderEvent::ReorderEnded {
                pass_id,
                elapsed_ms,
                windows_failed,
                moves_issued,
                ..
            } => {
                if *windows_failed == 0 {
                    format!(
                        "Reordering ended (pass {pass_id:016x}): {moves_issued} move(s) in {elapsed_ms} ms"
                    )
                } else {
                    format!(
                        "Reordering ended (pass {pass_id:016x}): {moves_issued} move(s), {windows_failed} window(s) failed, {elapsed_ms} ms"
                    )
                }
            }
        }
    }
}

/// What happened to a single window during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WindowStatus {
    Unchanged,
    Reordered { moves: Vec<MoveOp<TabId>> },
    /// The window closed between enumeration and read.
    Unavailable,
    /// Moves that were issued plus the errors that made the window fail.
    Failed {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        moves: Vec<MoveOp<TabId>>,
        errors: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowReport {
    pub window: WindowId,
    pub pinned: usize,
    pub reorderable: usize,
    #[serde(flatten)]
    pub status: WindowStatus,
    /// Identities the policy and the window disagreed on; left in place.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inconsistent: Vec<TabId>,
}

impl WindowReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, WindowStatus::Failed { .. })
    }

    pub fn moves_issued(&self) -> usize {
        match &self.status {
            WindowStatus::Reordered { moves } | WindowStatus::Failed { moves, .. } => moves.len(),
            WindowStatus::Unchanged | WindowStatus::Unavailable => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassReport {
    pub pass_id: u64,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub elapsed_ms: u64,
    pub windows: Vec<WindowReport>,
    /// Set when the window list itself could not be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumeration_error: Option<String>,
}

impl PassReport {
    pub fn windows_failed(&self) -> usize {
        self.windows.iter().filter(|w| w.is_failed()).count()
    }

    pub fn moves_issued(&self) -> usize {
        self.windows.iter().map(WindowReport::moves_issued).sum()
    }

    pub fn succeeded(&self) -> bool {
        self.enumeration_error.is_none() && self.windows_failed() == 0
    }
}

/// Result of a reconciliation request.
#[derive(Debug, Clone)]
pub enum PassOutcome {
    /// Reordering is switched off; nothing ran and nothing was broadcast.
    Disabled,
    /// Another pass held the single-flight guard; the request was dropped.
    AlreadyRunning,
    Completed(PassReport),
}
