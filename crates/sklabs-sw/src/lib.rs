//! # SKINLABS Service Worker
//!
//! Offline-support agent for the SKINLABS web application.
//!
//! ## Features
//!
//! - **Lifecycle**: install (precache), activate (generation GC), fetch
//! - **Fetch routing**: ordered classification table over four strategies
//! - **Cache API**: named buckets derived from the version tag
//! - **Push**: notification display and click-through window routing
//!
//! ## Architecture
//!
//! ```text
//! ServiceWorkerAgent
//!     ├── SwConfig            (version tag, precache list, fallbacks)
//!     ├── Router              (ordered predicate → strategy table)
//!     ├── CacheStorage        (sklabs-static-<v>, sklabs-runtime-<v>)
//!     ├── Clients             (open pages: claim, open_window, focus)
//!     ├── NotificationCenter  (shown notifications)
//!     └── Fetcher             (host network primitive, sklabs-net)
//! ```
//!
//! The agent serves every intercepted GET from one of four strategies
//! (network-first, stale-while-revalidate, cache-first, or network with
//! cache fallback) and retires prior cache generations when the version
//! tag bumps.

use thiserror::Error;

use sklabs_net::NetError;

pub mod agent;
pub mod cache;
pub mod clients;
pub mod config;
pub mod notify;
pub mod router;
mod strategy;

pub use agent::{ServiceWorkerAgent, SwEvent, WorkerState};
pub use cache::{Cache, CacheEntry, CacheStorage};
pub use clients::{Client, Clients};
pub use config::{SwConfig, VERSION};
pub use notify::{Notification, NotificationCenter, NotificationId, NotificationPayload};
pub use router::{Router, Strategy, IMAGE_EXTENSIONS, STATIC_EXTENSIONS};

/// Errors surfaced by the agent's lifecycle and fetch handlers.
#[derive(Error, Debug)]
pub enum SwError {
    #[error("Install failed: {0}")]
    Install(String),

    #[error("Activation failed: {0}")]
    Activate(String),

    #[error("Network error: {0}")]
    Network(#[from] NetError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Not found: {0}")]
    NotFound(String),
}
