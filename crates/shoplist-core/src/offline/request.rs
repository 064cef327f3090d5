//! Intercepted requests and their classification.

use std::fmt;

use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

use super::FetchError;

/// Extensions served network-first. Matched case-sensitively against the
/// last path segment.
const ASSET_EXTENSIONS: &[&str] = &[
    "js", "css", "json", "svg", "png", "jpg", "jpeg", "gif", "ico", "woff", "woff2", "ttf", "eot",
];

/// How an intercepted GET is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Build-versioned static file: network-first.
    Asset,
    /// Navigation and everything else: cache-first, revalidated in the background.
    Document,
}

impl ResourceKind {
    pub fn classify(url: &Url) -> Self {
        let last_segment = url.path().rsplit('/').next().unwrap_or_default();
        match last_segment.rsplit_once('.') {
            Some((_, ext)) if ASSET_EXTENSIONS.contains(&ext) => ResourceKind::Asset,
            _ => ResourceKind::Document,
        }
    }
}

/// Identity of a request inside a cache store: method plus URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parse an absolute URL into a GET request
    pub fn parse_get(url: &str) -> Result<Self, FetchError> {
        let url = Url::parse(url)
            .map_err(|e| FetchError::InvalidRequest(format!("{}: {}", url, e)))?;
        Ok(Self::get(url))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn key(&self) -> RequestKey {
        let mut url = self.url.clone();
        url.set_fragment(None);
        RequestKey(format!("{} {}", self.method, url))
    }

    pub fn kind(&self) -> ResourceKind {
        ResourceKind::classify(&self.url)
    }

    pub fn is_same_origin(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }
}
