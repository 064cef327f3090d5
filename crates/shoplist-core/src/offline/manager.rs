//! The offline cache manager: lifecycle and request-handling policy.

use std::sync::{Arc, Mutex};

use futures::future::join_all;
use reqwest::{Method, Url};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    CacheStorage, CapturedResponse, FetchError, LifecycleError, Network, Request, RequestKey,
    ResourceKind, ResponseSource, Served, WorkerHost, WorkerState,
};

/// What a manager instance serves and under which store name.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Only GETs to this origin are cached
    pub origin: Url,
    /// Name of the store this version owns; every other store is stale
    pub cache_name: String,
    /// Resources fetched and stored on install
    pub seed_urls: Vec<Url>,
}

/// Store name for a version: `<prefix>-<version>`
pub fn cache_name(prefix: &str, version: &str) -> String {
    format!("{}-{}", prefix, version)
}

#[derive(Debug, Default)]
pub struct InstallReport {
    pub cached: Vec<Url>,
    pub failed: Vec<(Url, String)>,
}

#[derive(Debug, Default)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
    pub claimed: usize,
}

pub struct OfflineCacheManager<S, N, H> {
    settings: CacheSettings,
    storage: Arc<S>,
    network: Arc<N>,
    host: Arc<H>,
    state: Mutex<WorkerState>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl<S, N, H> OfflineCacheManager<S, N, H>
where
    S: CacheStorage,
    N: Network,
    H: WorkerHost,
{
    pub fn new(settings: CacheSettings, storage: Arc<S>, network: Arc<N>, host: Arc<H>) -> Self {
        Self {
            settings,
            storage,
            network,
            host,
            state: Mutex::new(WorkerState::Parsed),
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn cache_name(&self) -> &str {
        &self.settings.cache_name
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: WorkerState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let current = *state;
        debug!(
            cache = %self.settings.cache_name,
            from = %current,
            to = %next,
            "Worker state change"
        );
        *state = next;
    }

    fn transition(
        &self,
        action: &'static str,
        from: WorkerState,
        to: WorkerState,
    ) -> Result<(), LifecycleError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let current = *state;
        if current != from {
            return Err(LifecycleError::InvalidTransition {
                action,
                state: current,
            });
        }
        debug!(cache = %self.settings.cache_name, from = %current, to = %to, "Worker state change");
        *state = to;
        Ok(())
    }

    // ===== Install =====

    /// Open this version's store and seed it. Individual seed failures are
    /// logged and reported; installation always completes.
    pub async fn install(&self) -> Result<InstallReport, LifecycleError> {
        self.transition("install", WorkerState::Parsed, WorkerState::Installing)?;
        self.host.skip_waiting();

        let name = &self.settings.cache_name;
        if let Err(e) = self.storage.open(name).await {
            warn!(cache = %name, error = %e, "Failed to open cache store during install");
        }

        let results = join_all(self.settings.seed_urls.iter().map(|url| self.seed(url))).await;

        let mut report = InstallReport::default();
        for (url, result) in self.settings.seed_urls.iter().zip(results) {
            match result {
                Ok(()) => report.cached.push(url.clone()),
                Err(reason) => {
                    warn!(url = %url, reason = %reason, "Failed to cache seed resource");
                    report.failed.push((url.clone(), reason));
                }
            }
        }

        self.set_state(WorkerState::Installed);
        info!(
            cache = %name,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Cache installed"
        );
        Ok(report)
    }

    async fn seed(&self, url: &Url) -> Result<(), String> {
        let request = Request::get(url.clone());
        let response = self
            .network
            .fetch(&request)
            .await
            .map_err(|e| e.to_string())?;

        if !response.is_success() {
            return Err(format!(
                "Status {}: {}",
                response.status,
                FetchError::truncate_body(&response.text())
            ));
        }

        self.storage
            .put(&self.settings.cache_name, &request.key(), &response)
            .await
            .map_err(|e| e.to_string())
    }

    // ===== Activate =====

    /// Evict every stale store and take control of open clients, concurrently.
    pub async fn activate(&self) -> Result<ActivationReport, LifecycleError> {
        self.transition("activate", WorkerState::Installed, WorkerState::Activating)?;
        Ok(self.finish_activation().await)
    }

    /// Runs while `Activating`; always ends in `Active`.
    async fn finish_activation(&self) -> ActivationReport {
        let (deleted, claimed) = tokio::join!(self.evict_stale_stores(), self.claim_clients());

        self.set_state(WorkerState::Active);
        info!(
            cache = %self.settings.cache_name,
            deleted = deleted.len(),
            claimed,
            "Cache activated"
        );
        ActivationReport { deleted, claimed }
    }

    async fn evict_stale_stores(&self) -> Vec<String> {
        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Failed to list cache stores, skipping eviction");
                return Vec::new();
            }
        };

        let stale: Vec<String> = names
            .into_iter()
            .filter(|name| name != &self.settings.cache_name)
            .collect();

        let results = join_all(stale.iter().map(|name| {
            info!(cache = %name, "Deleting old cache");
            self.storage.delete(name)
        }))
        .await;

        stale
            .into_iter()
            .zip(results)
            .filter_map(|(name, result)| match result {
                Ok(true) => Some(name),
                Ok(false) => None,
                Err(e) => {
                    warn!(cache = %name, error = %e, "Failed to delete old cache");
                    None
                }
            })
            .collect()
    }

    async fn claim_clients(&self) -> usize {
        match self.host.claim_clients(&self.settings.cache_name).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Failed to claim clients");
                0
            }
        }
    }

    /// Take over with a store left by an earlier run, without seeding it.
    /// The store may never have been activated, so stale stores are still
    /// evicted and clients claimed before serving. Returns false when the
    /// store does not exist.
    pub async fn resume(&self) -> Result<bool, LifecycleError> {
        let present = match self.storage.keys().await {
            Ok(names) => names.iter().any(|n| n == &self.settings.cache_name),
            Err(e) => {
                warn!(error = %e, "Failed to list cache stores");
                false
            }
        };
        if present {
            self.transition("resume", WorkerState::Parsed, WorkerState::Activating)?;
            self.finish_activation().await;
        }
        Ok(present)
    }

    // ===== Fetch =====

    /// Serve an intercepted request according to the caching policy.
    ///
    /// Non-GET and cross-origin requests, and everything before activation,
    /// go straight to the network. Same-origin GETs are served network-first
    /// for assets and cache-first with background revalidation for documents.
    pub async fn handle_fetch(&self, request: Request) -> Result<Served, FetchError> {
        if self.state() != WorkerState::Active
            || request.method != Method::GET
            || !request.is_same_origin(&self.settings.origin)
        {
            return self.passthrough(&request).await;
        }

        match request.kind() {
            ResourceKind::Asset => self.network_first(request).await,
            ResourceKind::Document => self.cache_first(request).await,
        }
    }

    async fn passthrough(&self, request: &Request) -> Result<Served, FetchError> {
        let response = self.network.fetch(request).await?;
        Ok(Served {
            response,
            source: ResponseSource::Passthrough,
        })
    }

    async fn network_first(&self, request: Request) -> Result<Served, FetchError> {
        let key = request.key();
        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.spawn_put(key, response.clone());
                }
                Ok(Served {
                    response,
                    source: ResponseSource::Network,
                })
            }
            Err(fetch_err) => {
                debug!(key = %key, error = %fetch_err, "Asset fetch failed, trying cache");
                match self.storage.match_request(&self.settings.cache_name, &key).await {
                    Ok(Some(response)) => Ok(Served {
                        response,
                        source: ResponseSource::Cache,
                    }),
                    Ok(None) => Err(fetch_err),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Cache lookup failed");
                        Err(fetch_err)
                    }
                }
            }
        }
    }

    async fn cache_first(&self, request: Request) -> Result<Served, FetchError> {
        let key = request.key();
        match self.storage.match_request(&self.settings.cache_name, &key).await {
            Ok(Some(response)) => {
                self.spawn_revalidate(request);
                Ok(Served {
                    response,
                    source: ResponseSource::Cache,
                })
            }
            Ok(None) => match self.network.fetch(&request).await {
                Ok(response) => {
                    if response.is_cacheable() {
                        self.spawn_put(key, response.clone());
                    }
                    Ok(Served {
                        response,
                        source: ResponseSource::Network,
                    })
                }
                Err(e) => {
                    debug!(key = %key, error = %e, "Document fetch failed, retrying once");
                    self.last_attempt(&request).await
                }
            },
            Err(e) => {
                warn!(key = %key, error = %e, "Cache lookup failed");
                self.last_attempt(&request).await
            }
        }
    }

    async fn last_attempt(&self, request: &Request) -> Result<Served, FetchError> {
        let response = self.network.fetch(request).await?;
        Ok(Served {
            response,
            source: ResponseSource::Network,
        })
    }

    // ===== Background work =====

    fn track(&self, handle: JoinHandle<()>) {
        let mut background = self.background.lock().unwrap_or_else(|e| e.into_inner());
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    /// Write a response to the active store without holding up the caller.
    fn spawn_put(&self, key: RequestKey, response: CapturedResponse) {
        let storage = Arc::clone(&self.storage);
        let name = self.settings.cache_name.clone();
        self.track(tokio::spawn(async move {
            Self::put_quietly(storage.as_ref(), &name, &key, &response).await;
        }));
    }

    /// Refresh a cached document for the next visit.
    fn spawn_revalidate(&self, request: Request) {
        let storage = Arc::clone(&self.storage);
        let network = Arc::clone(&self.network);
        let name = self.settings.cache_name.clone();
        self.track(tokio::spawn(async move {
            match network.fetch(&request).await {
                Ok(response) if response.is_cacheable() => {
                    Self::put_quietly(storage.as_ref(), &name, &request.key(), &response).await;
                }
                Ok(response) => {
                    debug!(url = %request.url, status = response.status, "Revalidation not cached");
                }
                Err(e) => {
                    debug!(url = %request.url, error = %e, "Revalidation fetch failed");
                }
            }
        }));
    }

    async fn put_quietly(storage: &S, name: &str, key: &RequestKey, response: &CapturedResponse) {
        match storage.put(name, key, response).await {
            Ok(()) => debug!(cache = name, key = %key, "Cached response"),
            Err(e) => warn!(cache = name, key = %key, error = %e, "Failed to write cache entry"),
        }
    }

    /// Wait for every background write and revalidation started so far.
    pub async fn settle(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut background = self.background.lock().unwrap_or_else(|e| e.into_inner());
                std::mem::take(&mut *background)
            };
            if handles.is_empty() {
                return;
            }
            for result in join_all(handles).await {
                if let Err(e) = result {
                    warn!(error = %e, "Background cache task failed");
                }
            }
        }
    }
}
