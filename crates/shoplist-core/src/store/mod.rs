//! Data access for the shopping list and the event menu.
//!
//! This module provides the `Database` client used by the presentation
//! layer: subscriptions that deliver ordered snapshots, and fallible
//! add/update/delete operations. Records are validated here, at the
//! boundary, so every stored menu entry carries exactly the fields of its
//! kind.

pub mod database;
pub mod error;
pub mod models;

pub use database::{Database, Unsubscribe};
pub use error::StoreError;
pub use models::{
    salad_names, MenuEntry, MenuItem, NewShoppingItem, Shop, ShoppingItem, ShoppingItemUpdate,
};
