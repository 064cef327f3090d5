//! Core library for shoplist.
//!
//! - `offline`: versioned offline cache for the application shell
//! - `store`: shopping list and menu data access
//! - `config`: configuration loading

pub mod config;
pub mod offline;
pub mod store;

pub use config::Config;
pub use offline::{OfflineCacheManager, Request, ResponseSource};
pub use store::Database;
