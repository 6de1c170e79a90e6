use crate::error::{PlatformError, ReorderError};
use crate::model::{Tab, WindowId};
use crate::platform::TabPlatform;

/// One window's tabs split into the pinned prefix and the reorderable rest.
#[derive(Debug, Clone)]
pub(crate) struct WindowTabs {
    pub pinned: Vec<Tab>,
    pub reorderable: Vec<Tab>,
}

/// Read a window's tab strip. A closed window maps to `PartitionUnavailable`,
/// any other platform error to `ReadFailed`.
pub(crate) async fn read_window(
    platform: &dyn TabPlatform,
    window: WindowId,
) -> Result<WindowTabs, ReorderError> {
    let tabs = match platform.list_tabs(window).await {
        Ok(tabs) => tabs,
        Err(PlatformError::WindowNotFound(_)) => {
            return Err(ReorderError::PartitionUnavailable { window });
        }
        Err(source) => return Err(ReorderError::ReadFailed { window, source }),
    };
    let (pinned, reorderable): (Vec<Tab>, Vec<Tab>) = tabs.into_iter().partition(|t| t.pinned);
    Ok(WindowTabs {
        pinned,
        reorderable,
    })
}
