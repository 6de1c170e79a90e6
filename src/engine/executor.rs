//! Issues planned block moves against the live platform.

use crate::error::ReorderError;
use crate::model::{MoveOp, TabId, WindowId};
use crate::platform::TabPlatform;
use futures::future::join_all;

/// Send every move of one window to the platform, offset past the pinned
/// prefix.
///
/// Moves are issued in plan order and awaited together; the planner already
/// sequenced their indices, so no move waits for an earlier acknowledgment.
/// A rejected move is collected and never retried.
pub(crate) async fn execute_moves(
    platform: &dyn TabPlatform,
    window: WindowId,
    moves: &[MoveOp<TabId>],
    pinned_count: usize,
) -> Vec<ReorderError> {
    let commands = moves.iter().map(|m| {
        let index = pinned_count + m.target_index;
        async move {
            platform
                .move_tabs(&m.moving_ids, index)
                .await
                .map_err(|source| ReorderError::MoveFailed {
                    window,
                    ids: m.moving_ids.clone(),
                    index,
                    source,
                })
        }
    });

    join_all(commands)
        .await
        .into_iter()
        .filter_map(Result::err)
        .inspect(|e| tracing::warn!(%window, "{e}"))
        .collect()
}
