//! Strategy execution.
//!
//! Each strategy resolves one classified GET request. Runtime-bucket writes on
//! the success paths are detached tasks: the response is returned without
//! waiting for the store, and a failed store is logged and dropped.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, trace};

use sklabs_net::{FetchRequest, FetchResponse, Fetcher};

use crate::agent::{ServiceWorkerAgent, SwEvent};
use crate::cache::{CacheEntry, CacheStorage};
use crate::router::Strategy;
use crate::SwError;

impl ServiceWorkerAgent {
    pub(crate) async fn run_strategy(
        &self,
        strategy: Strategy,
        request: &FetchRequest,
    ) -> Result<FetchResponse, SwError> {
        match strategy {
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkWithCacheFallback => self.network_with_cache_fallback(request).await,
        }
    }

    /// Navigations: live page preferred, cache on failure, offline page last.
    async fn network_first(&self, request: &FetchRequest) -> Result<FetchResponse, SwError> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.spawn_runtime_write(request, &response);
                Ok(response)
            }
            Err(error) => {
                debug!(url = %request.url, %error, "Navigation fetch failed, serving from cache");
                let caches = self.caches.read().await;
                if let Some(entry) = caches.match_request(request.url.as_str()) {
                    return Ok(entry.to_response());
                }
                let offline_url = self.config.resolve(&self.config.offline_url)?;
                caches
                    .match_request(offline_url.as_str())
                    .map(CacheEntry::to_response)
                    .ok_or_else(|| {
                        SwError::NotFound(format!("offline page {} not cached", self.config.offline_url))
                    })
            }
        }
    }

    /// Bundle assets: cached copy returned immediately, refreshed behind it.
    async fn stale_while_revalidate(
        &self,
        request: &FetchRequest,
    ) -> Result<FetchResponse, SwError> {
        let cached = self
            .caches
            .read()
            .await
            .match_request(request.url.as_str())
            .map(CacheEntry::to_response);

        if let Some(response) = cached {
            self.spawn_revalidate(request);
            return Ok(response);
        }

        // Cold cache: the network result is the response.
        let response = self.fetcher.fetch(request).await?;
        self.spawn_runtime_write(request, &response);
        Ok(response)
    }

    /// Images: cached copy preferred, network on a miss, placeholder last.
    async fn cache_first(&self, request: &FetchRequest) -> Result<FetchResponse, SwError> {
        if let Some(entry) = self
            .caches
            .read()
            .await
            .match_request(request.url.as_str())
        {
            return Ok(entry.to_response());
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.spawn_runtime_write(request, &response);
                Ok(response)
            }
            Err(error) => {
                debug!(url = %request.url, %error, "Image fetch failed, serving placeholder");
                let icon_url = self.config.resolve(&self.config.fallback_icon_url)?;
                self.caches
                    .read()
                    .await
                    .match_request(icon_url.as_str())
                    .map(CacheEntry::to_response)
                    .ok_or_else(|| {
                        SwError::NotFound(format!(
                            "placeholder {} not cached",
                            self.config.fallback_icon_url
                        ))
                    })
            }
        }
    }

    /// Everything else: live response preferred, stored only when OK and
    /// same-origin; any cached entry on failure, else the network error.
    async fn network_with_cache_fallback(
        &self,
        request: &FetchRequest,
    ) -> Result<FetchResponse, SwError> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.ok() && self.config.is_same_origin(&request.url) {
                    self.spawn_runtime_write(request, &response);
                }
                Ok(response)
            }
            Err(error) => {
                debug!(url = %request.url, %error, "Fetch failed, trying cache");
                self.caches
                    .read()
                    .await
                    .match_request(request.url.as_str())
                    .map(CacheEntry::to_response)
                    .ok_or(SwError::Network(error))
            }
        }
    }

    /// Store a snapshot of `response` in the runtime bucket without blocking
    /// the response path. Completion is signaled on the event stream.
    pub(crate) fn spawn_runtime_write(&self, request: &FetchRequest, response: &FetchResponse) {
        let entry = CacheEntry::snapshot(request, response);
        let caches = Arc::clone(&self.caches);
        let bucket = self.config.runtime_cache_name();
        let events = self.events.clone();

        tokio::spawn(async move {
            let url = entry.url.clone();
            caches.write().await.open(&bucket).put(entry);
            trace!(%url, bucket = %bucket, "Runtime cache write complete");
            let _ = events.send(SwEvent::RuntimeCacheWrite { url });
        });
    }

    /// Refresh the runtime bucket for `request` without blocking the cached
    /// response already returned. Fetch errors here are logged and dropped.
    pub(crate) fn spawn_revalidate(&self, request: &FetchRequest) {
        let request = request.clone();
        let fetcher: Arc<dyn Fetcher> = Arc::clone(&self.fetcher);
        let caches: Arc<RwLock<CacheStorage>> = Arc::clone(&self.caches);
        let bucket = self.config.runtime_cache_name();
        let events = self.events.clone();

        tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(response) => {
                    let entry = CacheEntry::snapshot(&request, &response);
                    let url = entry.url.clone();
                    caches.write().await.open(&bucket).put(entry);
                    trace!(%url, bucket = %bucket, "Revalidation complete");
                    let _ = events.send(SwEvent::RuntimeCacheWrite { url });
                }
                Err(error) => {
                    debug!(url = %request.url, %error, "Revalidation fetch failed");
                }
            }
        });
    }
}
