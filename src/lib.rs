//! Tab reordering engine.
//!
//! Converges the tab order of every window towards the order an
//! [`policy::OrderPolicy`] asks for, using the fewest contiguous block moves,
//! while pinned tabs stay in place and at most one pass runs at a time.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod platform;
pub mod policy;
mod text_summary;
