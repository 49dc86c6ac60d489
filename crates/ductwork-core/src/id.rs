use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;
use std::sync::Arc;

new_key_type! {
    /// Identifies a render-proxy entity owned by the host.
    ///
    /// Proxy ids are not stable across a restart; only the marker a proxy
    /// carries survives. Hosts that mint their own ids can wrap them with
    /// `slotmap::KeyData::from_ffi`.
    pub struct ProxyId;
}

/// Identifies an item type. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);

/// Identifies a pipe variant in the catalog.
///
/// Variant ids are written verbatim into markers, so they are restricted to
/// lowercase ASCII letters, digits, `_` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantId(Arc<str>);

impl VariantId {
    pub fn new(id: &str) -> Result<Self, IdError> {
        if Self::is_valid(id) {
            Ok(Self(Arc::from(id)))
        } else {
            Err(IdError::InvalidVariantId(id.to_string()))
        }
    }

    /// Whether `id` may be used as a variant id.
    pub fn is_valid(id: &str) -> bool {
        !id.is_empty()
            && id
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors from id construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("invalid variant id '{0}' (allowed: a-z, 0-9, '_', '-')")]
    InvalidVariantId(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn item_type_id_equality() {
        assert_eq!(ItemTypeId(0), ItemTypeId(0));
        assert_ne!(ItemTypeId(0), ItemTypeId(1));
    }

    #[test]
    fn variant_id_accepts_plain_names() {
        let id = VariantId::new("copper_pipe").unwrap();
        assert_eq!(id.as_str(), "copper_pipe");
        assert_eq!(id.to_string(), "copper_pipe");
        assert!(VariantId::new("corner-2").is_ok());
    }

    #[test]
    fn variant_id_rejects_marker_breaking_names() {
        for bad in ["", "pipe:x", "Copper", "has space", "ümlaut"] {
            assert_eq!(
                VariantId::new(bad),
                Err(IdError::InvalidVariantId(bad.to_string()))
            );
        }
    }

    #[test]
    fn variant_ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(VariantId::new("a").unwrap(), 1);
        assert_eq!(map[&VariantId::new("a").unwrap()], 1);
    }

    #[test]
    fn proxy_ids_are_distinct() {
        let mut sm = SlotMap::<ProxyId, ()>::with_key();
        let a = sm.insert(());
        let b = sm.insert(());
        assert_ne!(a, b);
    }
}
