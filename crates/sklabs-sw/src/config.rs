//! Agent configuration.
//!
//! What the original deployment keeps as module-level constants (version tag,
//! precache list, fallback paths) is injected here once at construction, so a
//! test generation can swap in its own version tag and asset list.

use serde::{Deserialize, Serialize};
use url::Url;

/// Current cache generation shipped with the application.
pub const VERSION: &str = "v3.0.0";

/// Offline agent configuration, immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwConfig {
    /// Version tag naming the cache generation.
    pub version: String,

    /// Prefix shared by this application's cache buckets.
    pub cache_prefix: String,

    /// Origin the page is served from; same-origin checks compare against it.
    pub origin: Url,

    /// Asset paths fetched and stored at install time.
    pub precache_urls: Vec<String>,

    /// Fallback page served to navigations when both network and cache miss.
    pub offline_url: String,

    /// Placeholder returned for image requests that cannot be satisfied.
    pub fallback_icon_url: String,

    /// Icon attached to displayed notifications.
    pub notification_icon_url: String,

    /// Badge attached to displayed notifications.
    pub notification_badge_url: String,

    /// Notification title used when a push payload omits one.
    pub default_notification_title: String,

    /// Notification body used when a push payload omits one.
    pub default_notification_body: String,

    /// URL a notification click opens when the payload omits one.
    pub default_notification_url: String,
}

impl Default for SwConfig {
    fn default() -> Self {
        Self {
            version: VERSION.to_string(),
            cache_prefix: "sklabs".to_string(),
            origin: Url::parse("https://skinlabs.app").expect("static origin is valid"),
            precache_urls: vec![
                "/".to_string(), // HTML shell
                "/offline.html".to_string(),
                "/manifest.webmanifest".to_string(),
                "/icons/icon-192.png".to_string(),
                "/icons/icon-512.png".to_string(),
                "/icons/maskable-192.png".to_string(),
                "/icons/maskable-512.png".to_string(),
            ],
            offline_url: "/offline.html".to_string(),
            fallback_icon_url: "/icons/icon-192.png".to_string(),
            notification_icon_url: "/icons/icon-192.png".to_string(),
            notification_badge_url: "/icons/icon-192.png".to_string(),
            default_notification_title: "SKINLABS".to_string(),
            default_notification_body: "New skincare picks are live.".to_string(),
            default_notification_url: "/".to_string(),
        }
    }
}

impl SwConfig {
    /// Name of the bucket holding precached assets for this generation.
    pub fn static_cache_name(&self) -> String {
        format!("{}-static-{}", self.cache_prefix, self.version)
    }

    /// Name of the bucket populated opportunistically during operation.
    pub fn runtime_cache_name(&self) -> String {
        format!("{}-runtime-{}", self.cache_prefix, self.version)
    }

    /// Resolve an app path against the configured origin.
    pub fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
        self.origin.join(path)
    }

    /// Check whether a URL shares the page origin.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }
}
