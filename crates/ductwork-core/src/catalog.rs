//! The pipe variant catalog.
//!
//! Variants are registered through a [`CatalogBuilder`] and then frozen
//! into an immutable [`VariantCatalog`]. Nodes hold their variant by `Arc`,
//! so a catalog reload rebinds nodes instead of mutating shared entries.

use crate::id::{IdError, VariantId};
use ductwork_spatial::Facing;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Behavior class of a pipe variant.
///
/// Regular pipes pull from the container behind them and push along the
/// chain. Corner pipes never originate a transfer; they only redirect items
/// that reach them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    #[serde(alias = "REGULAR")]
    Regular,
    #[serde(alias = "CORNER")]
    Corner,
}

/// An immutable catalog entry. Shared by `Arc` among every node of the kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeVariant {
    pub id: VariantId,
    pub behavior: Behavior,
    /// Ticks between two service attempts of one node.
    pub interval_ticks: u32,
    /// Upper bound on items moved per service attempt.
    pub items_per_transfer: u32,
    /// Informational only.
    pub display_name: String,
}

impl PipeVariant {
    pub fn is_corner(&self) -> bool {
        self.behavior == Behavior::Corner
    }

    /// Whether a node of this variant may face `facing`. Corners never
    /// face up.
    pub fn allows_facing(&self, facing: Facing) -> bool {
        !(self.is_corner() && facing == Facing::Up)
    }
}

/// Raw variant definition before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDef {
    pub id: String,
    pub behavior: Behavior,
    pub interval_ticks: u32,
    pub items_per_transfer: u32,
    pub display_name: Option<String>,
}

impl VariantDef {
    pub fn new(id: &str, behavior: Behavior, interval_ticks: u32, items_per_transfer: u32) -> Self {
        Self {
            id: id.to_string(),
            behavior,
            interval_ticks,
            items_per_transfer,
            display_name: None,
        }
    }
}

/// Builder for constructing an immutable [`VariantCatalog`].
/// Two-phase lifecycle: registration -> finalization.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    variants: Vec<Arc<PipeVariant>>,
    id_to_index: HashMap<VariantId, usize>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register one variant definition.
    pub fn register(&mut self, def: VariantDef) -> Result<VariantId, CatalogError> {
        let id = VariantId::new(&def.id)?;
        if def.interval_ticks == 0 {
            return Err(CatalogError::ZeroInterval(def.id));
        }
        if def.items_per_transfer == 0 {
            return Err(CatalogError::ZeroTransfer(def.id));
        }
        if self.id_to_index.contains_key(&id) {
            return Err(CatalogError::Duplicate(def.id));
        }
        let display_name = def.display_name.unwrap_or_else(|| def.id.clone());
        self.id_to_index.insert(id.clone(), self.variants.len());
        self.variants.push(Arc::new(PipeVariant {
            id: id.clone(),
            behavior: def.behavior,
            interval_ticks: def.interval_ticks,
            items_per_transfer: def.items_per_transfer,
            display_name,
        }));
        Ok(id)
    }

    /// Register a definition, logging and skipping it when invalid.
    /// Returns whether the entry was accepted.
    pub fn register_or_skip(&mut self, def: VariantDef) -> bool {
        let raw_id = def.id.clone();
        match self.register(def) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(variant = %raw_id, error = %e, "skipping invalid pipe variant");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Finalize the catalog.
    pub fn build(self) -> VariantCatalog {
        tracing::info!(count = self.variants.len(), "pipe variant catalog built");
        VariantCatalog {
            variants: self.variants,
            id_to_index: self.id_to_index,
        }
    }
}

/// Immutable table of pipe variants. Frozen after [`CatalogBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct VariantCatalog {
    variants: Vec<Arc<PipeVariant>>,
    id_to_index: HashMap<VariantId, usize>,
}

impl VariantCatalog {
    pub fn get(&self, id: &VariantId) -> Option<&Arc<PipeVariant>> {
        self.id_to_index.get(id).map(|&i| &self.variants[i])
    }

    /// Lookup by raw string. Invalid ids simply miss.
    pub fn get_str(&self, id: &str) -> Option<&Arc<PipeVariant>> {
        let id = VariantId::new(id).ok()?;
        self.get(&id)
    }

    /// Variants in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PipeVariant>> {
        self.variants.iter()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Smallest tick interval of any variant, or `None` for an empty catalog.
    pub fn fastest_interval(&self) -> Option<u32> {
        self.variants.iter().map(|v| v.interval_ticks).min()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    InvalidId(#[from] IdError),
    #[error("variant '{0}' has a zero tick interval")]
    ZeroInterval(String),
    #[error("variant '{0}' moves zero items per transfer")]
    ZeroTransfer(String),
    #[error("duplicate variant id '{0}'")]
    Duplicate(String),
}
