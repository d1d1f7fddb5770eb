//! QUE — NationStates puppet processing
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod cli;
pub mod config;
pub mod types;
pub mod nationstates;
pub mod prompt;
pub mod engine;
pub mod storage;
