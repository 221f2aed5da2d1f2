//! Push notifications.
//!
//! A push body is an optional JSON object merged over configured defaults. A
//! malformed body must never keep a notification from showing, so parse
//! failures fall back to the defaults silently.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use serde::Deserialize;
use tracing::debug;

use crate::config::SwConfig;

/// Fields a push message may carry; everything is optional.
#[derive(Debug, Clone, Default, Deserialize)]
struct PushMessage {
    title: Option<String>,
    body: Option<String>,
    url: Option<String>,
}

/// Resolved notification content: push fields merged over defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    /// URL a click on the notification opens.
    pub url: String,
}

impl NotificationPayload {
    /// Defaults from configuration.
    pub fn defaults(config: &SwConfig) -> Self {
        Self {
            title: config.default_notification_title.clone(),
            body: config.default_notification_body.clone(),
            url: config.default_notification_url.clone(),
        }
    }

    /// Merge an optional JSON push body over the defaults.
    pub fn from_push(config: &SwConfig, data: Option<&[u8]>) -> Self {
        let mut payload = Self::defaults(config);

        let Some(data) = data else {
            return payload;
        };

        match serde_json::from_slice::<PushMessage>(data) {
            Ok(message) => {
                if let Some(title) = message.title {
                    payload.title = title;
                }
                if let Some(body) = message.body {
                    payload.body = body;
                }
                if let Some(url) = message.url {
                    payload.url = url;
                }
            }
            Err(error) => {
                // Malformed payloads are dropped, not surfaced.
                debug!(%error, "Ignoring malformed push payload");
            }
        }

        payload
    }
}

/// Identifier of a displayed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(u64);

impl NotificationId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A notification currently on screen.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    /// Attached data: the click-through URL.
    pub url: String,
}

/// Displayed notifications, held until closed.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    shown: HashMap<NotificationId, Notification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display a payload with the configured icon and badge.
    pub fn show(&mut self, config: &SwConfig, payload: NotificationPayload) -> NotificationId {
        let id = NotificationId::next();
        self.shown.insert(
            id,
            Notification {
                id,
                title: payload.title,
                body: payload.body,
                icon: config.notification_icon_url.clone(),
                badge: config.notification_badge_url.clone(),
                url: payload.url,
            },
        );
        id
    }

    /// Get a shown notification.
    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.shown.get(&id)
    }

    /// Close a notification, returning it.
    pub fn close(&mut self, id: NotificationId) -> Option<Notification> {
        self.shown.remove(&id)
    }

    /// Number of notifications on screen.
    pub fn len(&self) -> usize {
        self.shown.len()
    }

    /// Whether nothing is on screen.
    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }
}
