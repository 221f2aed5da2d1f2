//! In-memory [`Fetcher`] for tests and offline fixtures.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use hashbrown::HashMap;
use tracing::trace;

use crate::{FetchRequest, FetchResponse, Fetcher, NetError};

/// Fetcher serving canned responses keyed by full URL.
///
/// Unrouted URLs fail like a dead DNS lookup, `set_offline` fails every fetch,
/// and `set_delay` makes each fetch take simulated time, which is how the
/// stale-while-revalidate tests prove the response path does not wait for the
/// network.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    routes: RwLock<HashMap<String, FetchResponse>>,
    offline: AtomicBool,
    delay: RwLock<Option<Duration>>,
    requests: Mutex<Vec<String>>,
    fetches: AtomicU64,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for `url`.
    pub fn route(&self, url: impl Into<String>, response: FetchResponse) {
        self.routes
            .write()
            .expect("routes lock poisoned")
            .insert(url.into(), response);
    }

    /// Drop the route for `url`, making it fail like an unreachable host.
    pub fn unroute(&self, url: &str) {
        self.routes
            .write()
            .expect("routes lock poisoned")
            .remove(url);
    }

    /// Simulate total network loss.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make every fetch take `delay` before resolving.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write().expect("delay lock poisoned") = Some(delay);
    }

    /// Number of fetches attempted so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// URLs fetched so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetError> {
        let url = request.url.to_string();
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(url.clone());

        let delay = *self.delay.read().expect("delay lock poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            trace!(%url, "Simulated offline fetch");
            return Err(NetError::Offline);
        }

        self.routes
            .read()
            .expect("routes lock poisoned")
            .get(&url)
            .cloned()
            .ok_or_else(|| NetError::RequestFailed(format!("no route for {url}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_routed_url_resolves() {
        let fetcher = MemoryFetcher::new();
        fetcher.route("https://skinlabs.app/", FetchResponse::html("shell"));

        let response = fetcher
            .fetch(&FetchRequest::get(url("https://skinlabs.app/")))
            .await
            .unwrap();

        assert_eq!(response.body_text(), "shell");
        assert_eq!(fetcher.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_unrouted_url_fails() {
        let fetcher = MemoryFetcher::new();

        let result = fetcher
            .fetch(&FetchRequest::get(url("https://skinlabs.app/nope")))
            .await;

        assert!(matches!(result, Err(NetError::RequestFailed(_))));
    }

    #[tokio::test]
    async fn test_offline_fails_routed_urls() {
        let fetcher = MemoryFetcher::new();
        fetcher.route("https://skinlabs.app/", FetchResponse::html("shell"));
        fetcher.set_offline(true);

        let result = fetcher
            .fetch(&FetchRequest::get(url("https://skinlabs.app/")))
            .await;

        assert!(matches!(result, Err(NetError::Offline)));

        fetcher.set_offline(false);
        assert!(fetcher
            .fetch(&FetchRequest::get(url("https://skinlabs.app/")))
            .await
            .is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_observed() {
        let fetcher = MemoryFetcher::new();
        fetcher.route("https://skinlabs.app/slow", FetchResponse::text("late"));
        fetcher.set_delay(Duration::from_secs(3));

        let started = tokio::time::Instant::now();
        let response = fetcher
            .fetch(&FetchRequest::get(url("https://skinlabs.app/slow")))
            .await
            .unwrap();

        assert_eq!(response.body_text(), "late");
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
