//! Tab platform abstraction.
//!
//! The engine never owns tabs; it reads windows and asks the platform to move
//! blocks of tabs. [`MemoryPlatform`] is the in-process implementation used by
//! the CLI and by tests.

mod memory;

pub use memory::{CallCounts, MemoryPlatform, Snapshot, WindowSnapshot};

use crate::error::PlatformError;
use crate::model::{Tab, TabId, WindowId, WindowInfo};
use async_trait::async_trait;

#[async_trait]
pub trait TabPlatform: Send + Sync {
    /// All open windows, in platform order.
    async fn list_windows(&self) -> Result<Vec<WindowInfo>, PlatformError>;

    /// Tabs of one window in tab-strip order, pinned tabs first.
    async fn list_tabs(&self, window: WindowId) -> Result<Vec<Tab>, PlatformError>;

    /// Move `ids` as one contiguous block so the first lands at absolute `index`.
    async fn move_tabs(&self, ids: &[TabId], index: usize) -> Result<(), PlatformError>;
}
