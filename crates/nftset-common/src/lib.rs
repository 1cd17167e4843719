//! NFTSet Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Ambient utilities shared by the NFTSet workspace members.
//!
//! - **Logging**: `tracing` subscriber setup for console and rotated files

pub mod logging;

pub use logging::{init_logging, LogConfig, LogLevel, LoggingGuard};
