//! Serde data file structs for pipe content definitions.
//!
//! These structs define the on-disk format of the variant list. They are
//! deserialized from RON, JSON, or TOML and then turned into catalog
//! entries by the loader. The engine config file deserializes straight into
//! [`ductwork_core::sim::EngineConfig`].

use ductwork_core::catalog::{Behavior, VariantDef};
use serde::Deserialize;

/// One pipe variant in a data file.
///
/// Only `id` is required:
///
/// ```ron
/// [
///     (id: "copper", interval_ticks: 10, items_per_transfer: 4),
///     (id: "copper_corner", behavior: corner),
/// ]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct VariantData {
    pub id: String,
    #[serde(default = "default_behavior")]
    pub behavior: Behavior,
    #[serde(default = "default_interval")]
    pub interval_ticks: u32,
    #[serde(default = "default_items_per_transfer")]
    pub items_per_transfer: u32,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_behavior() -> Behavior {
    Behavior::Regular
}

fn default_interval() -> u32 {
    10
}

fn default_items_per_transfer() -> u32 {
    1
}

impl From<VariantData> for VariantDef {
    fn from(data: VariantData) -> Self {
        VariantDef {
            id: data.id,
            behavior: data.behavior,
            interval_ticks: data.interval_ticks,
            items_per_transfer: data.items_per_transfer,
            display_name: data.display_name,
        }
    }
}

/// TOML wrapper: `[[variants]]` tables.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlVariants {
    pub variants: Vec<VariantData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_entry_uses_defaults() {
        let v: VariantData = serde_json::from_str(r#"{"id": "copper"}"#).unwrap();
        assert_eq!(v.behavior, Behavior::Regular);
        assert_eq!(v.interval_ticks, 10);
        assert_eq!(v.items_per_transfer, 1);
        assert!(v.display_name.is_none());
    }

    #[test]
    fn behavior_accepts_both_spellings() {
        let lower: VariantData =
            serde_json::from_str(r#"{"id": "a", "behavior": "corner"}"#).unwrap();
        let upper: VariantData =
            serde_json::from_str(r#"{"id": "a", "behavior": "CORNER"}"#).unwrap();
        assert_eq!(lower.behavior, Behavior::Corner);
        assert_eq!(upper.behavior, Behavior::Corner);
    }

    #[test]
    fn ron_list_parses() {
        let list: Vec<VariantData> = ron::from_str(
            r#"[
                (id: "copper", interval_ticks: 10, items_per_transfer: 4),
                (id: "copper_corner", behavior: corner, display_name: Some("Copper Corner")),
            ]"#,
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].items_per_transfer, 4);
        assert_eq!(list[1].behavior, Behavior::Corner);
        assert_eq!(list[1].display_name.as_deref(), Some("Copper Corner"));
    }

    #[test]
    fn toml_tables_parse() {
        let wrapper: TomlVariants = toml::from_str(
            r#"
[[variants]]
id = "copper"
items_per_transfer = 4

[[variants]]
id = "copper_corner"
behavior = "corner"
"#,
        )
        .unwrap();
        assert_eq!(wrapper.variants.len(), 2);
        assert_eq!(wrapper.variants[1].behavior, Behavior::Corner);
    }

    #[test]
    fn converts_into_catalog_definition() {
        let v: VariantData =
            serde_json::from_str(r#"{"id": "fast", "interval_ticks": 2}"#).unwrap();
        let def = VariantDef::from(v);
        assert_eq!(def.id, "fast");
        assert_eq!(def.interval_ticks, 2);
        assert_eq!(def.items_per_transfer, 1);
    }
}
