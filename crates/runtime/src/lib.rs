//! Runtime utilities for chainwatch.
#![allow(missing_docs)]

pub mod shutdown;

#[cfg(test)]
mod shutdown_test;
