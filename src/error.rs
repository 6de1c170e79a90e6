//! Error types for the reordering engine and its collaborators.

use crate::model::{TabId, WindowId};

/// Errors reported by a [`crate::platform::TabPlatform`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// The window does not exist (anymore).
    #[error("window {0} not found")]
    WindowNotFound(WindowId),

    /// A tab named in a move does not exist.
    #[error("tab {0} not found")]
    TabNotFound(TabId),

    /// The platform refused the operation.
    #[error("rejected by platform: {reason}")]
    Rejected {
        /// Why the platform refused.
        reason: String,
    },
}

/// Errors raised while reordering a single window.
///
/// None of these escape a pass: the coordinator folds them into the
/// per-window report.
#[derive(Debug, thiserror::Error)]
pub enum ReorderError {
    /// The window vanished between enumeration and read.
    #[error("window {window} is no longer available")]
    PartitionUnavailable {
        /// The window that disappeared.
        window: WindowId,
    },

    /// The window exists but its tabs could not be read.
    #[error("reading tabs of window {window} failed: {source}")]
    ReadFailed {
        /// The window being read.
        window: WindowId,
        /// What the platform reported.
        #[source]
        source: PlatformError,
    },

    /// The order policy could not produce an ordering.
    #[error("order policy failed for window {window}: {source:#}")]
    OrderPolicyFailed {
        /// The window being sorted.
        window: WindowId,
        /// What the policy reported.
        #[source]
        source: anyhow::Error,
    },

    /// The platform rejected a single block move.
    #[error("moving {ids:?} to index {index} in window {window} failed: {source}")]
    MoveFailed {
        /// The window being sorted.
        window: WindowId,
        /// Tabs in the rejected block.
        ids: Vec<TabId>,
        /// Absolute platform index the block was sent to.
        index: usize,
        /// What the platform reported.
        #[source]
        source: PlatformError,
    },

    /// Observed and desired orders disagreed on these identities.
    #[error("order policy and window {window} disagree on tabs {ids:?}")]
    PlanningInconsistency {
        /// The window being sorted.
        window: WindowId,
        /// Identities left out of the plan.
        ids: Vec<TabId>,
    },

    /// Listing windows failed.
    #[error("listing windows failed: {0}")]
    Enumeration(#[source] PlatformError),
}
