//! Core business logic abstractions

pub mod config;
pub mod feed;
pub mod log;
pub mod record;
pub mod stats;
pub mod window;

// Re-export main types for cleaner imports
pub use feed::{FetchError, RateFeed};
pub use record::Record;
pub use stats::{Summary, summarize};
