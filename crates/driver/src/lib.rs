//! Chainwatch Driver crate root
//!
//! Filters chain blocks against the watched addresses and records matches, first for the
//! blocks missed while the process was down, then live.
#![allow(clippy::uninlined_format_args)]

pub mod backfill;
pub mod driver;
pub mod processor;
pub mod prompt;
pub mod registry;
pub mod watcher;

#[cfg(test)]
mod mock;
