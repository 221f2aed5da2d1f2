//! Request classification.
//!
//! The fetch router is an ordered table of (predicate, strategy) pairs; the
//! first matching row decides how a GET request is served. The table makes the
//! classification order explicit and lets each predicate be tested on its own.

use tracing::trace;
use url::Url;

use sklabs_net::FetchRequest;

use crate::config::SwConfig;

/// Path extensions classified as same-origin static bundle assets.
pub const STATIC_EXTENSIONS: &[&str] = &["css", "js", "json", "webmanifest"];

/// Path extensions classified as images, regardless of origin.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "svg", "ico"];

/// Caching strategy applied to a classified request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Live response preferred; cache, then offline page, on failure.
    NetworkFirst,
    /// Cached response returned immediately while the cache refreshes.
    StaleWhileRevalidate,
    /// Cached response preferred; network, then placeholder, on a miss.
    CacheFirst,
    /// Live response preferred; any cached entry on failure, else the error.
    NetworkWithCacheFallback,
}

type Predicate = fn(&SwConfig, &FetchRequest) -> bool;

/// One row of the classification table.
pub struct Route {
    /// Class name, used in traces.
    pub name: &'static str,
    predicate: Predicate,
    pub strategy: Strategy,
}

/// Ordered classification table; first match wins.
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// The SKINLABS table: navigations, static assets, images, then the
    /// conservative default.
    pub fn new() -> Self {
        Self {
            routes: vec![
                Route {
                    name: "navigation",
                    predicate: is_html_navigation,
                    strategy: Strategy::NetworkFirst,
                },
                Route {
                    name: "static-asset",
                    predicate: is_static_asset,
                    strategy: Strategy::StaleWhileRevalidate,
                },
                Route {
                    name: "image",
                    predicate: is_image,
                    strategy: Strategy::CacheFirst,
                },
                Route {
                    name: "default",
                    predicate: |_, _| true,
                    strategy: Strategy::NetworkWithCacheFallback,
                },
            ],
        }
    }

    /// Classify a request. The trailing catch-all row keeps this total.
    pub fn classify(&self, config: &SwConfig, request: &FetchRequest) -> Strategy {
        for route in &self.routes {
            if (route.predicate)(config, request) {
                trace!(class = route.name, url = %request.url, "Classified request");
                return route.strategy;
            }
        }
        Strategy::NetworkWithCacheFallback
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Navigation mode, or an `Accept` header asking for HTML.
fn is_html_navigation(_config: &SwConfig, request: &FetchRequest) -> bool {
    request.is_navigation()
        || request
            .header_value("accept")
            .is_some_and(|accept| accept.contains("text/html"))
}

/// Same-origin request for a bundle asset.
fn is_static_asset(config: &SwConfig, request: &FetchRequest) -> bool {
    config.is_same_origin(&request.url) && has_extension(&request.url, STATIC_EXTENSIONS)
}

/// Image path, any origin.
fn is_image(_config: &SwConfig, request: &FetchRequest) -> bool {
    has_extension(&request.url, IMAGE_EXTENSIONS)
}

fn has_extension(url: &Url, extensions: &[&str]) -> bool {
    let path = url.path().to_ascii_lowercase();
    extensions
        .iter()
        .any(|ext| path.ends_with(&format!(".{ext}")))
}
