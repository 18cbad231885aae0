#![forbid(unsafe_code)]

//! Core: geometry, terminal capability detection, and logging shims.

pub mod geometry;
pub mod logging;
pub mod terminal_capabilities;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, error, info, trace, warn};
