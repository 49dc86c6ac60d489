use crate::id::ItemTypeId;
use serde::{Deserialize, Serialize};

/// A stack of fungible items, as held in one container slot or spawned as
/// a free item in the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_type: ItemTypeId,
    pub quantity: u32,
}

impl ItemStack {
    pub fn new(item_type: ItemTypeId, quantity: u32) -> Self {
        Self {
            item_type,
            quantity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Same item type, different quantity.
    pub fn with_quantity(&self, quantity: u32) -> Self {
        Self {
            item_type: self.item_type,
            quantity,
        }
    }

    /// Whether `other` can merge into this stack.
    pub fn is_similar(&self, other: &ItemStack) -> bool {
        self.item_type == other.item_type
    }

    /// Removes up to `quantity` items. Returns the amount actually removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn take(&mut self, quantity: u32) -> u32 {
        let removed = quantity.min(self.quantity);
        self.quantity -= removed;
        removed
    }
}
