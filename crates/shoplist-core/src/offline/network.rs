//! Live network access behind the cache.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client};
use tracing::debug;

use super::{CapturedResponse, FetchError, Request};

#[async_trait]
pub trait Network: Send + Sync + 'static {
    /// Perform a live fetch. Any HTTP status is `Ok`; only a missing
    /// response is an error.
    async fn fetch(&self, request: &Request) -> Result<CapturedResponse, FetchError>;
}

/// `Network` backed by a reqwest client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    /// Create a client. With `timeout` unset no deadline is imposed and the
    /// connection's own behaviour decides when a fetch gives up.
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    fn header_map(request: &Request) -> Result<header::HeaderMap, FetchError> {
        let mut headers = header::HeaderMap::new();
        for (name, value) in &request.headers {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::InvalidRequest(format!("header {}: {}", name, e)))?;
            let value = header::HeaderValue::from_str(value)
                .map_err(|e| FetchError::InvalidRequest(format!("header {}: {}", name, e)))?;
            headers.append(name, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<CapturedResponse, FetchError> {
        debug!(method = %request.method, url = %request.url, "Network fetch");

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(Self::header_map(request)?)
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url, status, bytes = body.len(), "Network response");

        Ok(CapturedResponse {
            status,
            headers,
            body,
            captured_at: Utc::now(),
        })
    }
}
