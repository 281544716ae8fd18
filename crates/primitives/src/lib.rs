//! Core primitives for the chainwatch project.
/// Block header and body types
pub mod headers;
/// Sender recovery from signed transactions
pub mod sender;
/// Watched address set and the transaction filter
pub mod watchlist;

/// Signed transaction builders for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
