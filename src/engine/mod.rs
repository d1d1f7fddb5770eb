//! Core engine — the per-puppet create → login → settings → flag → move → bid loop.

pub mod actions;
pub mod report;
pub mod runner;

pub use runner::{ActionToggles, Runner};
