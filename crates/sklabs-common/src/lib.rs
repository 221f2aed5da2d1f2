//! # SKINLABS Common
//!
//! Shared plumbing for the SKINLABS offline agent crates.
//!
//! ## Features
//!
//! - Logging configuration and setup on `tracing`
//! - Retry with exponential backoff for lifecycle phases

pub mod logging;
pub mod retry;

pub use logging::{init_logging, LogConfig, LogFormat};
pub use retry::{retry_with_backoff, RetryConfig};
