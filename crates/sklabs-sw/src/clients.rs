//! Controlled pages.
//!
//! A client is an open window under this agent's scope. The registry backs
//! `claim` at activation and `open_window`/`focus` from notification clicks.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use url::Url;

/// An open page.
#[derive(Debug, Clone)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Page URL.
    pub url: Url,

    /// Whether the window currently has focus.
    pub focused: bool,

    /// Whether this agent generation controls the page.
    pub controlled: bool,
}

/// Registry of open pages.
#[derive(Debug, Default)]
pub struct Clients {
    clients: HashMap<String, Client>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a client by ID.
    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    /// All clients, unordered.
    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    /// Number of open pages.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no pages are open.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Register an existing page (navigated before the agent activated, so
    /// not yet controlled).
    pub fn add(&mut self, url: Url) -> String {
        let id = next_client_id();
        self.clients.insert(
            id.clone(),
            Client {
                id: id.clone(),
                url,
                focused: false,
                controlled: false,
            },
        );
        id
    }

    /// Remove a page (window closed).
    pub fn remove(&mut self, id: &str) -> Option<Client> {
        self.clients.remove(id)
    }

    /// Open a new window at `url`, focused and controlled.
    pub fn open_window(&mut self, url: Url) -> &Client {
        let id = next_client_id();
        for client in self.clients.values_mut() {
            client.focused = false;
        }
        self.clients.insert(
            id.clone(),
            Client {
                id: id.clone(),
                url,
                focused: true,
                controlled: true,
            },
        );
        &self.clients[&id]
    }

    /// Focus the client with the given ID.
    pub fn focus(&mut self, id: &str) -> Option<&Client> {
        if !self.clients.contains_key(id) {
            return None;
        }
        for client in self.clients.values_mut() {
            client.focused = client.id == id;
        }
        self.clients.get(id)
    }

    /// Find an open page already showing `url`.
    pub fn find_by_url(&self, url: &Url) -> Option<&Client> {
        self.clients.values().find(|c| &c.url == url)
    }

    /// Take control of every open page without waiting for reloads.
    pub fn claim(&mut self) {
        for client in self.clients.values_mut() {
            client.controlled = true;
        }
    }
}

fn next_client_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("client-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_open_window_is_focused_and_controlled() {
        let mut clients = Clients::new();
        let id = clients.open_window(url("https://skinlabs.app/sale")).id.clone();

        let client = clients.get(&id).unwrap();
        assert!(client.focused);
        assert!(client.controlled);
        assert_eq!(client.url.as_str(), "https://skinlabs.app/sale");
    }

    #[test]
    fn test_open_window_steals_focus() {
        let mut clients = Clients::new();
        let first = clients.open_window(url("https://skinlabs.app/")).id.clone();
        let second = clients.open_window(url("https://skinlabs.app/sale")).id.clone();

        assert!(!clients.get(&first).unwrap().focused);
        assert!(clients.get(&second).unwrap().focused);
    }

    #[test]
    fn test_claim_controls_existing_pages() {
        let mut clients = Clients::new();
        let id = clients.add(url("https://skinlabs.app/"));
        assert!(!clients.get(&id).unwrap().controlled);

        clients.claim();
        assert!(clients.get(&id).unwrap().controlled);
    }

    #[test]
    fn test_focus_moves_between_pages() {
        let mut clients = Clients::new();
        let first = clients.add(url("https://skinlabs.app/"));
        let second = clients.add(url("https://skinlabs.app/cart"));

        assert!(clients.focus(&first).is_some());
        assert!(clients.get(&first).unwrap().focused);

        clients.focus(&second);
        assert!(!clients.get(&first).unwrap().focused);
        assert!(clients.get(&second).unwrap().focused);

        assert!(clients.focus("client-does-not-exist").is_none());
    }

    #[test]
    fn test_find_by_url() {
        let mut clients = Clients::new();
        clients.add(url("https://skinlabs.app/sale"));

        assert!(clients.find_by_url(&url("https://skinlabs.app/sale")).is_some());
        assert!(clients.find_by_url(&url("https://skinlabs.app/")).is_none());
    }
}
