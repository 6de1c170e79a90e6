//! Persistent settings.
//!
//! Settings live in `<config_dir>/tabsort/config.json` unless a path is given.
//! Missing fields fall back to defaults; CLI flags override the file.

use crate::model::WindowKind;
use crate::policy::SortKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master switch, read at the start of every pass.
    pub reordering_enabled: bool,
    /// Passes slower than this are logged at info level.
    #[serde(with = "humantime_serde")]
    pub slow_pass_threshold: Duration,
    pub policy: SortKey,
    /// Window kinds that get reordered.
    pub window_kinds: Vec<WindowKind>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reordering_enabled: true,
            slow_pass_threshold: Duration::from_millis(500),
            policy: SortKey::default(),
            window_kinds: vec![WindowKind::Normal],
        }
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tabsort").join("config.json"))
}

impl Settings {
    /// Load from `path`, or from the default location when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_file(p),
            None => match default_path() {
                Some(p) if p.exists() => Self::load_file(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse settings {}", path.display()))
    }
}
