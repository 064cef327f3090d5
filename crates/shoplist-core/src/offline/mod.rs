//! Offline caching for the application shell.
//!
//! This module provides the `OfflineCacheManager`, which sits between the
//! application and the network. It keeps one versioned cache store per
//! deployed version and serves requests from it:
//!
//! - Assets (scripts, styles, JSON, images, fonts): network-first, falling
//!   back to the cached copy when the network is unreachable.
//! - Documents (everything else): cache-first, refreshed in the background
//!   for the next visit.
//!
//! On activation every store that does not belong to the current version
//! is deleted.

pub mod disk;
pub mod error;
pub mod host;
pub mod manager;
pub mod network;
pub mod request;
pub mod response;
pub mod seeds;
pub mod storage;

use std::fmt;

pub use reqwest::{Method, Url};

pub use disk::DiskStorage;
pub use error::{FetchError, HostError, LifecycleError, StorageError};
pub use host::{ClientRegistry, WorkerHost};
pub use manager::{cache_name, ActivationReport, CacheSettings, InstallReport, OfflineCacheManager};
pub use network::{HttpNetwork, Network};
pub use request::{Request, RequestKey, ResourceKind};
pub use response::{CapturedResponse, ResponseSource, Served};
pub use storage::{CacheStorage, MemoryStorage};

/// Lifecycle of one cache version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    /// Serving requests. Stays here until a newer version takes over.
    Active,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Parsed => write!(f, "parsed"),
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Active => write!(f, "active"),
        }
    }
}
