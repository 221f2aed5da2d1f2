//! `reqwest`-backed [`Fetcher`] implementation.

use async_trait::async_trait;
use hashbrown::HashMap;
use reqwest::Client;
use tracing::{debug, trace};

use crate::{FetchRequest, FetchResponse, Fetcher, NetError};

/// Production fetcher on a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher around an existing client (custom TLS, proxy, ...).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, NetError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| NetError::RequestFailed(format!("bad method: {}", request.method)))?;

        trace!(url = %request.url, method = %method, "Dispatching fetch");

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
            }
        }
        let body = response.bytes().await?;

        debug!(url = %request.url, status, bytes = body.len(), "Fetch complete");

        Ok(FetchResponse {
            status,
            headers,
            body,
            from_cache: false,
        })
    }
}
