//! The environment a cache version runs in.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::info;

use super::HostError;

#[async_trait]
pub trait WorkerHost: Send + Sync + 'static {
    /// Let the installing version activate without waiting for open clients to close
    fn skip_waiting(&self);

    /// Make `controller` control every open client. Returns the number claimed.
    async fn claim_clients(&self, controller: &str) -> Result<usize, HostError>;
}

/// In-process host: tracks open clients and which cache version controls each.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<BTreeMap<u64, Option<String>>>,
    next_id: AtomicU64,
    waiting_skipped: AtomicBool,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open client with no controller. Returns its id.
    pub fn open_client(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.clients
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, None);
        id
    }

    pub fn controller(&self, id: u64) -> Option<String> {
        self.clients
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .flatten()
    }

    pub fn waiting_skipped(&self) -> bool {
        self.waiting_skipped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerHost for ClientRegistry {
    fn skip_waiting(&self) {
        self.waiting_skipped.store(true, Ordering::SeqCst);
    }

    async fn claim_clients(&self, controller: &str) -> Result<usize, HostError> {
        let mut clients = self.clients.write().unwrap_or_else(|e| e.into_inner());
        for slot in clients.values_mut() {
            *slot = Some(controller.to_string());
        }
        info!(controller, count = clients.len(), "Claimed clients");
        Ok(clients.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_claim_sets_controller_on_all_clients() {
        let registry = ClientRegistry::new();
        let a = registry.open_client();
        let b = registry.open_client();
        assert_eq!(registry.controller(a), None);

        let claimed = registry.claim_clients("shop-v2").await.unwrap();
        assert_eq!(claimed, 2);
        assert_eq!(registry.controller(a).as_deref(), Some("shop-v2"));
        assert_eq!(registry.controller(b).as_deref(), Some("shop-v2"));
    }

    #[tokio::test]
    async fn test_claim_with_no_clients() {
        let registry = ClientRegistry::new();
        assert_eq!(registry.claim_clients("shop-v2").await.unwrap(), 0);
    }

    #[test]
    fn test_skip_waiting_is_recorded() {
        let registry = ClientRegistry::new();
        assert!(!registry.waiting_skipped());
        registry.skip_waiting();
        assert!(registry.waiting_skipped());
    }
}
