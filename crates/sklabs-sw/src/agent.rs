//! The offline agent: lifecycle, fetch dispatch, push handling.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use url::Url;

use sklabs_common::{retry_with_backoff, RetryConfig};
use sklabs_net::{FetchRequest, FetchResponse, Fetcher};

use crate::cache::{CacheEntry, CacheStorage};
use crate::clients::Clients;
use crate::config::SwConfig;
use crate::notify::{NotificationCenter, NotificationId, NotificationPayload};
use crate::router::Router;
use crate::SwError;

/// Lifecycle state of one agent generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, no lifecycle event handled yet.
    Parsed,
    /// Install in progress (precache running).
    Installing,
    /// Installed; activation is next.
    Installed,
    /// Activation in progress (generation GC running).
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Install failed permanently or generation was replaced.
    Redundant,
}

/// Observable agent effects, for embedders and tests.
///
/// Background cache writes are fire-and-forget on the response path; the
/// event stream is the only way to see them land.
#[derive(Debug, Clone)]
pub enum SwEvent {
    /// Lifecycle state changed.
    StateChange { state: WorkerState },
    /// A stale-generation bucket was deleted during activation.
    BucketDeleted { name: String },
    /// A detached runtime-bucket write completed.
    RuntimeCacheWrite { url: String },
    /// A push notification was displayed.
    NotificationShown { id: NotificationId },
    /// A notification click opened or focused a window.
    WindowOpened { url: Url },
}

/// The SKINLABS offline agent.
///
/// One instance models one script generation. The cache storage is the host's
/// and outlives generations; pass the previous generation's storage to
/// [`ServiceWorkerAgent::with_storage`] so a version bump can retire its
/// buckets.
pub struct ServiceWorkerAgent {
    pub(crate) config: SwConfig,
    pub(crate) router: Router,
    state: RwLock<WorkerState>,

    /// Host cache store, shared with the embedder.
    pub caches: Arc<RwLock<CacheStorage>>,

    /// Open pages under this agent's scope.
    pub clients: Arc<RwLock<Clients>>,

    /// Displayed notifications.
    pub notifications: Arc<RwLock<NotificationCenter>>,

    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) events: mpsc::UnboundedSender<SwEvent>,
}

impl ServiceWorkerAgent {
    /// Create an agent with fresh cache storage.
    pub fn new(
        config: SwConfig,
        fetcher: Arc<dyn Fetcher>,
    ) -> (Self, mpsc::UnboundedReceiver<SwEvent>) {
        Self::with_storage(config, fetcher, Arc::new(RwLock::new(CacheStorage::new())))
    }

    /// Create an agent over existing host cache storage.
    pub fn with_storage(
        config: SwConfig,
        fetcher: Arc<dyn Fetcher>,
        caches: Arc<RwLock<CacheStorage>>,
    ) -> (Self, mpsc::UnboundedReceiver<SwEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();

        (
            Self {
                config,
                router: Router::new(),
                state: RwLock::new(WorkerState::Parsed),
                caches,
                clients: Arc::new(RwLock::new(Clients::new())),
                notifications: Arc::new(RwLock::new(NotificationCenter::new())),
                fetcher,
                events,
            },
            event_rx,
        )
    }

    /// The injected configuration.
    pub fn config(&self) -> &SwConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn set_state(&self, state: WorkerState) {
        *self.state.write().await = state;
        let _ = self.events.send(SwEvent::StateChange { state });
    }

    /// Run the registration lifecycle: install under the host retry policy,
    /// then activate immediately. There is no waiting phase; a successful
    /// install rolls straight into activation so the new generation takes
    /// over without a reload.
    pub async fn start(&self) -> Result<(), SwError> {
        let policy = RetryConfig::lifecycle();
        if let Err(error) = retry_with_backoff(&policy, || self.install()).await {
            self.set_state(WorkerState::Redundant).await;
            return Err(error);
        }
        self.activate().await
    }

    /// Install: fetch and store every precache URL in the static bucket.
    ///
    /// All-or-nothing: every response is fetched before any entry is
    /// committed, so a failed asset never leaves a partially filled bucket.
    pub async fn install(&self) -> Result<(), SwError> {
        self.set_state(WorkerState::Installing).await;

        let bucket = self.config.static_cache_name();
        let mut entries = Vec::with_capacity(self.config.precache_urls.len());

        for path in &self.config.precache_urls {
            let url = self.config.resolve(path)?;
            let request = FetchRequest::get(url);
            let response = self
                .fetcher
                .fetch(&request)
                .await
                .map_err(|e| SwError::Install(format!("precache {path}: {e}")))?;
            if !response.ok() {
                return Err(SwError::Install(format!(
                    "precache {path}: status {}",
                    response.status
                )));
            }
            entries.push(CacheEntry::snapshot(&request, &response));
        }

        let count = entries.len();
        self.caches.write().await.open(&bucket).put_all(entries);
        info!(count, bucket = %bucket, "Precache complete");

        self.set_state(WorkerState::Installed).await;
        Ok(())
    }

    /// Activate: delete every bucket from another generation, make sure the
    /// current buckets exist, and claim all open pages.
    pub async fn activate(&self) -> Result<(), SwError> {
        self.set_state(WorkerState::Activating).await;

        let static_name = self.config.static_cache_name();
        let runtime_name = self.config.runtime_cache_name();

        {
            let mut caches = self.caches.write().await;
            let stale: Vec<String> = caches
                .keys()
                .into_iter()
                .filter(|name| *name != static_name && *name != runtime_name)
                .map(String::from)
                .collect();

            for name in stale {
                caches.delete(&name);
                debug!(bucket = %name, "Deleted stale cache generation");
                let _ = self.events.send(SwEvent::BucketDeleted { name });
            }

            caches.open(&static_name);
            caches.open(&runtime_name);
        }

        self.clients.write().await.claim();
        self.set_state(WorkerState::Activated).await;
        info!(version = %self.config.version, "Agent activated");
        Ok(())
    }

    /// Fetch interception entry point.
    ///
    /// Returns `Ok(None)` for requests the agent does not handle (anything
    /// that is not a GET); the host then applies its default behavior.
    pub async fn handle_fetch(
        &self,
        request: &FetchRequest,
    ) -> Result<Option<FetchResponse>, SwError> {
        if !request.is_get() {
            debug!(method = %request.method, url = %request.url, "Passing request through");
            return Ok(None);
        }

        let strategy = self.router.classify(&self.config, request);
        let response = self.run_strategy(strategy, request).await?;
        Ok(Some(response))
    }

    /// Push entry point: merge the optional JSON body over defaults and
    /// display a notification. Never fails; malformed payloads fall back to
    /// the defaults.
    pub async fn handle_push(&self, data: Option<&[u8]>) -> NotificationId {
        let payload = NotificationPayload::from_push(&self.config, data);
        info!(title = %payload.title, "Showing push notification");

        let id = self.notifications.write().await.show(&self.config, payload);
        let _ = self.events.send(SwEvent::NotificationShown { id });
        id
    }

    /// Notification-click entry point: close the notification, then open a
    /// window at its attached URL, focusing an existing one when the page is
    /// already open.
    pub async fn handle_notification_click(&self, id: NotificationId) -> Result<(), SwError> {
        let notification = self
            .notifications
            .write()
            .await
            .close(id)
            .ok_or_else(|| SwError::NotFound(format!("notification {id:?}")))?;

        let path = if notification.url.is_empty() {
            self.config.default_notification_url.clone()
        } else {
            notification.url
        };
        let url = self.config.resolve(&path)?;

        {
            let mut clients = self.clients.write().await;
            match clients.find_by_url(&url).map(|c| c.id.clone()) {
                Some(existing) => {
                    clients.focus(&existing);
                }
                None => {
                    clients.open_window(url.clone());
                }
            }
        }

        let _ = self.events.send(SwEvent::WindowOpened { url });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use sklabs_net::MemoryFetcher;

    const OFFLINE_BODY: &str = "You appear to be offline.";
    const ICON_BODY: &str = "icon-192-bytes";

    /// Fetcher with every precache URL of `config` routed.
    fn precache_fetcher(config: &SwConfig) -> Arc<MemoryFetcher> {
        let fetcher = MemoryFetcher::new();
        for path in &config.precache_urls {
            let url = config.resolve(path).unwrap();
            let body = match path.as_str() {
                "/offline.html" => OFFLINE_BODY.to_string(),
                p if p.ends_with(".png") => ICON_BODY.to_string(),
                p => format!("asset:{p}"),
            };
            fetcher.route(url, sklabs_net::FetchResponse::html(&body));
        }
        Arc::new(fetcher)
    }

    async fn installed_agent() -> (
        ServiceWorkerAgent,
        mpsc::UnboundedReceiver<SwEvent>,
        Arc<MemoryFetcher>,
    ) {
        let config = SwConfig::default();
        let fetcher = precache_fetcher(&config);
        let (agent, rx) = ServiceWorkerAgent::new(config, fetcher.clone());
        agent.install().await.unwrap();
        agent.activate().await.unwrap();
        (agent, rx, fetcher)
    }

    fn sorted(mut names: Vec<String>) -> Vec<String> {
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_install_precaches_every_listed_asset() {
        let (agent, _rx, _fetcher) = installed_agent().await;

        let caches = agent.caches.read().await;
        let config = agent.config();
        assert!(caches.has(&config.static_cache_name()));

        for path in &config.precache_urls {
            let url = config.resolve(path).unwrap();
            assert!(
                caches.match_request(url.as_str()).is_some(),
                "missing precache entry for {path}"
            );
        }
    }

    #[tokio::test]
    async fn test_install_is_all_or_nothing() {
        let config = SwConfig::default();
        let fetcher = precache_fetcher(&config);
        fetcher.unroute(config.resolve("/manifest.webmanifest").unwrap().as_str());

        let (agent, _rx) = ServiceWorkerAgent::new(config.clone(), fetcher);
        let result = agent.install().await;

        assert!(matches!(result, Err(SwError::Install(_))));
        // Nothing was committed, not even the assets fetched before the failure.
        let caches = agent.caches.read().await;
        assert!(!caches.has(&config.static_cache_name()));
    }

    #[tokio::test]
    async fn test_install_rejects_non_ok_precache_response() {
        let config = SwConfig::default();
        let fetcher = precache_fetcher(&config);
        fetcher.route(
            config.resolve("/offline.html").unwrap(),
            sklabs_net::FetchResponse::with_status(500),
        );

        let (agent, _rx) = ServiceWorkerAgent::new(config, fetcher);
        assert!(matches!(agent.install().await, Err(SwError::Install(_))));
    }

    #[tokio::test]
    async fn test_start_installs_then_activates() {
        let config = SwConfig::default();
        let fetcher = precache_fetcher(&config);
        let (agent, mut rx) = ServiceWorkerAgent::new(config, fetcher);

        agent.start().await.unwrap();
        assert_eq!(agent.state().await, WorkerState::Activated);

        let mut states = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SwEvent::StateChange { state } = event {
                states.push(state);
            }
        }
        assert_eq!(
            states,
            vec![
                WorkerState::Installing,
                WorkerState::Installed,
                WorkerState::Activating,
                WorkerState::Activated,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_marks_generation_redundant_after_retries() {
        let config = SwConfig::default();
        let fetcher = precache_fetcher(&config);
        fetcher.set_offline(true);

        let (agent, _rx) = ServiceWorkerAgent::new(config, fetcher.clone());
        let result = agent.start().await;

        assert!(result.is_err());
        assert_eq!(agent.state().await, WorkerState::Redundant);
        // One failed precache fetch per lifecycle attempt.
        assert_eq!(fetcher.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_activation_deletes_stale_generations() {
        let config = SwConfig::default();
        let fetcher = precache_fetcher(&config);
        let (agent, _rx) = ServiceWorkerAgent::new(config.clone(), fetcher);

        {
            let mut caches = agent.caches.write().await;
            caches.open("sklabs-static-v2.9.9");
            caches.open("sklabs-runtime-v2.9.9");
            caches.open("third-party-cache");
        }

        agent.install().await.unwrap();
        agent.activate().await.unwrap();

        let caches = agent.caches.read().await;
        let names = sorted(caches.keys().into_iter().map(String::from).collect());
        assert_eq!(
            names,
            vec![config.runtime_cache_name(), config.static_cache_name()]
        );
    }

    #[tokio::test]
    async fn test_version_bump_retires_previous_generation() {
        let old_config = SwConfig {
            version: "v2.9.9".to_string(),
            ..Default::default()
        };
        let fetcher = precache_fetcher(&old_config);
        let storage = Arc::new(RwLock::new(CacheStorage::new()));

        let (old_agent, _rx) =
            ServiceWorkerAgent::with_storage(old_config, fetcher.clone(), storage.clone());
        old_agent.install().await.unwrap();
        old_agent.activate().await.unwrap();

        let new_config = SwConfig::default();
        let (new_agent, _rx) =
            ServiceWorkerAgent::with_storage(new_config.clone(), fetcher, storage.clone());
        new_agent.install().await.unwrap();
        new_agent.activate().await.unwrap();

        let caches = storage.read().await;
        let names = sorted(caches.keys().into_iter().map(String::from).collect());
        assert_eq!(
            names,
            vec!["sklabs-runtime-v3.0.0".to_string(), "sklabs-static-v3.0.0".to_string()]
        );
        assert!(!caches.has("sklabs-static-v2.9.9"));
        assert!(!caches.has("sklabs-runtime-v2.9.9"));
    }

    #[tokio::test]
    async fn test_activation_claims_open_pages() {
        let config = SwConfig::default();
        let fetcher = precache_fetcher(&config);
        let (agent, _rx) = ServiceWorkerAgent::new(config.clone(), fetcher);

        let page = agent
            .clients
            .write()
            .await
            .add(config.resolve("/").unwrap());
        assert!(!agent.clients.read().await.get(&page).unwrap().controlled);

        agent.install().await.unwrap();
        agent.activate().await.unwrap();

        assert!(agent.clients.read().await.get(&page).unwrap().controlled);
    }

    #[tokio::test]
    async fn test_non_get_requests_pass_through() {
        let (agent, _rx, fetcher) = installed_agent().await;

        let request = FetchRequest::post(
            agent.config().resolve("/api/cart").unwrap(),
            Bytes::from_static(b"{}"),
        );
        let result = agent.handle_fetch(&request).await.unwrap();

        assert!(result.is_none());
        // The agent never fetched on the page's behalf.
        assert!(!fetcher
            .requests()
            .contains(&"https://skinlabs.app/api/cart".to_string()));
    }

    #[tokio::test]
    async fn test_push_merges_payload_over_defaults() {
        let (agent, _rx, _fetcher) = installed_agent().await;

        let id = agent
            .handle_push(Some(br#"{"title":"Sale","url":"/sale"}"#))
            .await;

        let notifications = agent.notifications.read().await;
        let shown = notifications.get(id).unwrap();
        assert_eq!(shown.title, "Sale");
        assert_eq!(shown.body, "New skincare picks are live.");
        assert_eq!(shown.url, "/sale");
        assert_eq!(shown.icon, "/icons/icon-192.png");
    }

    #[tokio::test]
    async fn test_push_with_malformed_body_shows_defaults() {
        let (agent, _rx, _fetcher) = installed_agent().await;

        let id = agent.handle_push(Some(b"\xff not json")).await;

        let notifications = agent.notifications.read().await;
        let shown = notifications.get(id).unwrap();
        assert_eq!(shown.title, "SKINLABS");
        assert_eq!(shown.url, "/");
    }

    #[tokio::test]
    async fn test_notification_click_opens_window_and_closes() {
        let (agent, _rx, _fetcher) = installed_agent().await;

        let id = agent.handle_push(Some(br#"{"url":"/sale"}"#)).await;
        agent.handle_notification_click(id).await.unwrap();

        assert!(agent.notifications.read().await.is_empty());

        let clients = agent.clients.read().await;
        let opened = clients
            .find_by_url(&agent.config().resolve("/sale").unwrap())
            .expect("window opened at attached URL");
        assert!(opened.focused);
        drop(clients);

        // A second click on the same notification is a miss.
        assert!(matches!(
            agent.handle_notification_click(id).await,
            Err(SwError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_notification_click_focuses_existing_window() {
        let (agent, _rx, _fetcher) = installed_agent().await;

        let url = agent.config().resolve("/sale").unwrap();
        let existing = agent.clients.write().await.add(url.clone());

        let id = agent.handle_push(Some(br#"{"url":"/sale"}"#)).await;
        agent.handle_notification_click(id).await.unwrap();

        let clients = agent.clients.read().await;
        assert_eq!(clients.len(), 1, "no duplicate window opened");
        assert!(clients.get(&existing).unwrap().focused);
    }

    #[tokio::test]
    async fn test_notification_click_defaults_to_root() {
        let (agent, _rx, _fetcher) = installed_agent().await;

        let id = agent.handle_push(None).await;
        agent.handle_notification_click(id).await.unwrap();

        let clients = agent.clients.read().await;
        assert!(clients
            .find_by_url(&agent.config().resolve("/").unwrap())
            .is_some());
    }
}
