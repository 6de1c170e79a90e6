//! Application-level orchestration.
//!
//! Turns external change notifications into reordering passes. UI/CLI layers
//! feed triggers in and read pass outcomes back out.

mod controller;

pub use controller::{run_controller, Trigger};
