//! Character inventories

use serde::{Deserialize, Serialize};

use crate::core::types::ObjectId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub serial: String,
    #[serde(default)]
    pub value: u64,
}

impl Item {
    pub fn new(id: impl Into<String>, serial: impl Into<String>, value: u64) -> Self {
        Self {
            id: id.into(),
            serial: serial.into(),
            value,
        }
    }

    pub fn matches(&self, id: &str, serial: &str) -> bool {
        self.id == id && self.serial == serial
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    items: Vec<Item>,
}

impl Inventory {
    pub fn add(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn item(&self, id: &ObjectId) -> Option<&Item> {
        self.items.iter().find(|it| it.matches(&id.id, &id.serial))
    }
}
