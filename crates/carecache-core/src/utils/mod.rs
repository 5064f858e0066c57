//! Utility functions for string normalisation and formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{normalize_phone, truncate_string};
