//! # SKINLABS Net
//!
//! The network primitive consumed by the SKINLABS offline agent.
//!
//! ## Design Goals
//!
//! 1. **Host seam**: the agent never talks to the network directly; it goes
//!    through the [`Fetcher`] trait so embedders and tests pick the transport
//! 2. **Plain descriptors**: [`FetchRequest`] and [`FetchResponse`] carry
//!    method, URL, headers, and body with no transport state attached
//! 3. **Fixtures included**: [`MemoryFetcher`] serves canned responses and can
//!    simulate a dead network

use async_trait::async_trait;
use bytes::Bytes;
use hashbrown::HashMap;
use thiserror::Error;
use url::Url;

pub mod http;
pub mod memory;

pub use http::HttpFetcher;
pub use memory::MemoryFetcher;

/// Errors that can occur while fetching.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Network unreachable")]
    Offline,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Request mode, mirroring `Request.mode` from the Fetch standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level document navigation.
    Navigate,
    #[default]
    Cors,
    NoCors,
    SameOrigin,
}

/// Read-only request descriptor.
///
/// The agent classifies requests by shape; it never mutates one.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    pub method: String,
    /// Header names are stored lowercase.
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub mode: RequestMode,
}

impl FetchRequest {
    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
            mode: RequestMode::default(),
        }
    }

    /// Create a top-level navigation request.
    pub fn navigate(url: Url) -> Self {
        let mut request = Self::get(url);
        request.mode = RequestMode::Navigate;
        request
            .headers
            .insert("accept".to_string(), "text/html,*/*".to_string());
        request
    }

    /// Create a POST request.
    pub fn post(url: Url, body: Bytes) -> Self {
        Self {
            url,
            method: "POST".to_string(),
            headers: HashMap::new(),
            body: Some(body),
            mode: RequestMode::default(),
        }
    }

    /// Add a header (name is lowercased).
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Look up a header by name (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    /// Check the method (case-insensitive).
    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Check if this is a top-level navigation.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// Response descriptor.
///
/// A body is a plain byte snapshot, so a response can be both stored and
/// returned without the single-consumption restriction of a streaming body.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    /// Header names are stored lowercase.
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    /// Whether this response was served from a cache bucket.
    pub from_cache: bool,
}

impl FetchResponse {
    /// Create an empty response with the given status.
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
            from_cache: false,
        }
    }

    /// Create a 200 text/plain response.
    pub fn text(body: &str) -> Self {
        Self::with_status(200)
            .header("content-type", "text/plain")
            .with_body(body.as_bytes())
    }

    /// Create a 200 text/html response.
    pub fn html(body: &str) -> Self {
        Self::with_status(200)
            .header("content-type", "text/html")
            .with_body(body.as_bytes())
    }

    /// Replace the body.
    pub fn with_body(mut self, body: &[u8]) -> Self {
        self.body = Bytes::copy_from_slice(body);
        self
    }

    /// Add a header (name is lowercased).
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Check if the status is 2xx.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get the body as text (lossy).
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The host network primitive: perform a fetch, yield a response or an error.
///
/// Implementations must be cheap to share behind an `Arc`; the agent issues
/// concurrent fetches against the same instance.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetError>;
}
