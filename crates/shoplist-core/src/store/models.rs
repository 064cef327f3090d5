//! Shopping list and menu records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StoreError;

/// Where an item is bought
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Shop {
    FreshFarm,
    Aldi,
    Costco,
    Binnys,
    #[default]
    Other,
}

impl Shop {
    pub const ALL: [Shop; 5] = [
        Shop::FreshFarm,
        Shop::Aldi,
        Shop::Costco,
        Shop::Binnys,
        Shop::Other,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Shop::FreshFarm => "Fresh Farm",
            Shop::Aldi => "Aldi",
            Shop::Costco => "Costco",
            Shop::Binnys => "Binny's",
            Shop::Other => "Other",
        }
    }

    /// Unknown names are filed under `Other`
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|shop| shop.name() == name)
            .unwrap_or(Shop::Other)
    }

    pub fn color(&self) -> &'static str {
        match self {
            Shop::FreshFarm => "#4caf50",
            Shop::Aldi => "#2196f3",
            Shop::Costco => "#f44336",
            Shop::Binnys => "#212121",
            Shop::Other => "#9e9e9e",
        }
    }
}

impl fmt::Display for Shop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Shop {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Shop {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Shop::from_name(&name))
    }
}

/// Fields supplied when adding a shopping item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShoppingItem {
    pub name: String,
    #[serde(default)]
    pub store: Shop,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub notes: String,
}

impl NewShoppingItem {
    pub fn new(name: impl Into<String>, store: Shop) -> Self {
        Self {
            name: name.into(),
            store,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::Invalid("shopping item name is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingItem {
    pub id: String,
    pub name: String,
    pub store: Shop,
    pub quantity: String,
    pub notes: String,
    pub checked: bool,
    pub created_at: DateTime<Utc>,
}

/// Partial update of a shopping item; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShoppingItemUpdate {
    pub name: Option<String>,
    pub store: Option<Shop>,
    pub quantity: Option<String>,
    pub notes: Option<String>,
    pub checked: Option<bool>,
}

impl ShoppingItemUpdate {
    pub(crate) fn apply(self, item: &mut ShoppingItem) -> Result<(), StoreError> {
        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                return Err(StoreError::Invalid("shopping item name is required".to_string()));
            }
        }
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(store) = self.store {
            item.store = store;
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(notes) = self.notes {
            item.notes = notes;
        }
        if let Some(checked) = self.checked {
            item.checked = checked;
        }
        Ok(())
    }
}

/// One menu record. Each kind carries only the fields that apply to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MenuEntry {
    Daily {
        date: String,
        #[serde(default)]
        lunch: String,
        #[serde(default)]
        dinner: String,
    },
    Salad {
        name: String,
        #[serde(default, rename = "preparedBy")]
        prepared_by: String,
    },
    Snack {
        name: String,
    },
    Drink {
        name: String,
    },
}

impl MenuEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            MenuEntry::Daily { .. } => "daily",
            MenuEntry::Salad { .. } => "salad",
            MenuEntry::Snack { .. } => "snack",
            MenuEntry::Drink { .. } => "drink",
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            MenuEntry::Daily { .. } => None,
            MenuEntry::Salad { name, .. } | MenuEntry::Snack { name } | MenuEntry::Drink { name } => {
                Some(name.as_str())
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        match self {
            MenuEntry::Daily { date, .. } if date.trim().is_empty() => Err(StoreError::Invalid(
                "daily menu entry needs a date".to_string(),
            )),
            MenuEntry::Daily { .. } => Ok(()),
            _ => match self.name() {
                Some(name) if !name.trim().is_empty() => Ok(()),
                _ => Err(StoreError::Invalid(format!("{} entry needs a name", self.kind()))),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: MenuEntry,
}

/// Salad names from a menu snapshot, sorted
pub fn salad_names(items: &[MenuItem]) -> Vec<String> {
    let mut names: Vec<String> = items
        .iter()
        .filter_map(|item| match &item.entry {
            MenuEntry::Salad { name, .. } if !name.is_empty() => Some(name.clone()),
            _ => None,
        })
        .collect();
    names.sort();
    names
}
