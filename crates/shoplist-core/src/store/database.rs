//! Document store client.
//!
//! `Database` is constructed once at startup and handed by reference to
//! whatever needs it. Each collection keeps its documents ordered newest
//! first and pushes a fresh snapshot to every subscriber after each change.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::models::{
    MenuEntry, MenuItem, NewShoppingItem, ShoppingItem, ShoppingItemUpdate,
};
use super::StoreError;

const SHOPPING_LIST_COLLECTION: &str = "shoppingList";
const MENU_COLLECTION: &str = "menu";

type Listener<T> = Arc<dyn Fn(Vec<T>) + Send + Sync>;

trait Document: Clone + Send + 'static {
    fn id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
}

impl Document for ShoppingItem {
    fn id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Document for MenuItem {
    fn id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Handle returned by a subscription. Dropping it keeps the subscription alive.
#[must_use = "call unsubscribe() to stop receiving snapshots"]
pub struct Unsubscribe {
    cancel: Box<dyn FnOnce() + Send>,
}

impl Unsubscribe {
    pub fn unsubscribe(self) {
        (self.cancel)()
    }
}

struct CollectionState<T> {
    docs: Vec<T>,
    listeners: BTreeMap<u64, Listener<T>>,
    next_listener: u64,
}

/// Lock order is `delivery` then `state`. Holding `delivery` from the change
/// until its snapshot is delivered keeps subscribers seeing snapshots in
/// the order the changes happened. Handlers may read the collection but
/// must not write to it.
struct Collection<T> {
    name: &'static str,
    state: Mutex<CollectionState<T>>,
    delivery: Mutex<()>,
}

impl<T: Document> Collection<T> {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            state: Mutex::new(CollectionState {
                docs: Vec::new(),
                listeners: BTreeMap::new(),
                next_listener: 0,
            }),
            delivery: Mutex::new(()),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CollectionState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Newest first; among equal timestamps the later insert comes first.
    fn ordered(docs: &[T]) -> Vec<T> {
        let mut out: Vec<T> = docs.iter().rev().cloned().collect();
        out.sort_by_key(|doc| std::cmp::Reverse(doc.created_at()));
        out
    }

    fn snapshot(&self) -> Vec<T> {
        Self::ordered(&self.lock().docs)
    }

    /// Apply a change under the state lock, then deliver the new snapshot
    /// outside it but before any later change is delivered.
    fn mutate<R>(
        &self,
        change: impl FnOnce(&mut Vec<T>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let _delivering = self.delivery.lock().unwrap_or_else(|e| e.into_inner());
        let (result, snapshot, listeners) = {
            let mut state = self.lock();
            let result = change(&mut state.docs)?;
            let listeners: Vec<Listener<T>> = state.listeners.values().cloned().collect();
            (result, Self::ordered(&state.docs), listeners)
        };
        debug!(collection = self.name, listeners = listeners.len(), "Delivering snapshot");
        for listener in listeners {
            listener(snapshot.clone());
        }
        Ok(result)
    }

    fn find_mut<'a>(&self, docs: &'a mut [T], id: &str) -> Result<&'a mut T, StoreError> {
        docs.iter_mut()
            .find(|doc| doc.id() == id)
            .ok_or_else(|| StoreError::NotFound {
                collection: self.name,
                id: id.to_string(),
            })
    }

    fn insert(&self, doc: T) -> Result<T, StoreError> {
        self.mutate(|docs| {
            docs.push(doc.clone());
            Ok(doc)
        })
    }

    fn update(
        &self,
        id: &str,
        change: impl FnOnce(&mut T) -> Result<(), StoreError>,
    ) -> Result<T, StoreError> {
        self.mutate(|docs| {
            let doc = self.find_mut(docs, id)?;
            let mut updated = doc.clone();
            change(&mut updated)?;
            *doc = updated.clone();
            Ok(updated)
        })
    }

    fn remove(&self, id: &str) -> Result<(), StoreError> {
        self.mutate(|docs| {
            let idx = docs
                .iter()
                .position(|doc| doc.id() == id)
                .ok_or_else(|| StoreError::NotFound {
                    collection: self.name,
                    id: id.to_string(),
                })?;
            docs.remove(idx);
            Ok(())
        })
    }

    fn subscribe(self: &Arc<Self>, listener: Listener<T>) -> Unsubscribe {
        let id = {
            let _delivering = self.delivery.lock().unwrap_or_else(|e| e.into_inner());
            let (id, snapshot) = {
                let mut state = self.lock();
                let id = state.next_listener;
                state.next_listener += 1;
                state.listeners.insert(id, Arc::clone(&listener));
                (id, Self::ordered(&state.docs))
            };
            listener(snapshot);
            id
        };

        let collection: Weak<Self> = Arc::downgrade(self);
        Unsubscribe {
            cancel: Box::new(move || {
                if let Some(collection) = collection.upgrade() {
                    collection.lock().listeners.remove(&id);
                }
            }),
        }
    }
}

/// Client for the shopping list and menu collections.
pub struct Database {
    shopping: Arc<Collection<ShoppingItem>>,
    menu: Arc<Collection<MenuItem>>,
    next_id: AtomicU64,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    pub fn new() -> Self {
        Self {
            shopping: Collection::new(SHOPPING_LIST_COLLECTION),
            menu: Collection::new(MENU_COLLECTION),
            next_id: AtomicU64::new(1),
        }
    }

    fn generate_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{:x}-{:06}", Utc::now().timestamp_millis(), n)
    }

    // ===== Shopping list =====

    /// Deliver the shopping list now and after every change, newest first
    pub fn subscribe_shopping_list(
        &self,
        handler: impl Fn(Vec<ShoppingItem>) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.shopping.subscribe(Arc::new(handler))
    }

    pub async fn list_shopping_items(&self) -> Result<Vec<ShoppingItem>, StoreError> {
        Ok(self.shopping.snapshot())
    }

    /// New items always start unchecked
    pub async fn add_shopping_item(
        &self,
        item: NewShoppingItem,
    ) -> Result<ShoppingItem, StoreError> {
        item.validate()?;
        let doc = ShoppingItem {
            id: self.generate_id(),
            name: item.name,
            store: item.store,
            quantity: item.quantity,
            notes: item.notes,
            checked: false,
            created_at: Utc::now(),
        };
        debug!(id = %doc.id, name = %doc.name, "Adding shopping item");
        self.shopping.insert(doc)
    }

    pub async fn update_shopping_item(
        &self,
        id: &str,
        updates: ShoppingItemUpdate,
    ) -> Result<ShoppingItem, StoreError> {
        self.shopping.update(id, |item| updates.apply(item))
    }

    pub async fn toggle_shopping_item(
        &self,
        id: &str,
        checked: bool,
    ) -> Result<ShoppingItem, StoreError> {
        self.update_shopping_item(
            id,
            ShoppingItemUpdate {
                checked: Some(checked),
                ..ShoppingItemUpdate::default()
            },
        )
        .await
    }

    pub async fn delete_shopping_item(&self, id: &str) -> Result<(), StoreError> {
        self.shopping.remove(id)
    }

    // ===== Menu =====

    /// Deliver the menu now and after every change, newest first
    pub fn subscribe_menu(
        &self,
        handler: impl Fn(Vec<MenuItem>) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.menu.subscribe(Arc::new(handler))
    }

    pub async fn list_menu_items(&self) -> Result<Vec<MenuItem>, StoreError> {
        Ok(self.menu.snapshot())
    }

    pub async fn add_menu_item(&self, entry: MenuEntry) -> Result<MenuItem, StoreError> {
        entry.validate()?;
        let doc = MenuItem {
            id: self.generate_id(),
            created_at: Utc::now(),
            entry,
        };
        debug!(id = %doc.id, kind = doc.entry.kind(), "Adding menu item");
        self.menu.insert(doc)
    }

    /// Replace the entry of a menu item. The kind may change; the id and
    /// creation time are kept.
    pub async fn update_menu_item(
        &self,
        id: &str,
        entry: MenuEntry,
    ) -> Result<MenuItem, StoreError> {
        entry.validate()?;
        self.menu.update(id, |item| {
            item.entry = entry;
            Ok(())
        })
    }

    pub async fn delete_menu_item(&self, id: &str) -> Result<(), StoreError> {
        self.menu.remove(id)
    }
}
