// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Logical property name to physical document path mapping.
//!
//! Filters, sort keys and queryables speak in logical STAC names
//! (`datetime`, `cloud_cover`); documents in the store keep most of those
//! under `properties.`. This table is the single place that translation
//! happens.
//!
//! # Example
//!
//! ```rust
//! use stac_compiler::mapping::FieldMappingTable;
//! use std::collections::HashMap;
//!
//! let table = FieldMappingTable::new();
//!
//! // Static STAC common properties
//! assert_eq!(table.resolve("datetime"), "properties.datetime");
//! assert_eq!(table.resolve("cloud_cover"), "properties.eo:cloud_cover");
//!
//! // Entries learned from schema introspection
//! table.replace_dynamic(HashMap::from([
//!     ("platform".to_string(), "properties.platform".to_string()),
//! ]));
//! assert_eq!(table.resolve("platform"), "properties.platform");
//!
//! // Unknown names pass through unchanged
//! assert_eq!(table.resolve("properties.gsd"), "properties.gsd");
//! ```
//!
//! # Design
//!
//! - **Static wins**: the fixed table is consulted before dynamic entries
//! - **Wholesale replacement**: dynamic entries are swapped as one snapshot
//! - **Thread-safe**: `parking_lot::RwLock` around an `Arc` snapshot

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Prefix under which item properties live in stored documents.
pub const PROPERTIES_PREFIX: &str = "properties.";

/// Fixed mapping for STAC common and well-known extension properties.
pub const STATIC_FIELD_MAPPING: &[(&str, &str)] = &[
    ("id", "id"),
    ("collection", "collection"),
    ("geometry", "geometry"),
    ("datetime", "properties.datetime"),
    ("start_datetime", "properties.start_datetime"),
    ("end_datetime", "properties.end_datetime"),
    ("created", "properties.created"),
    ("updated", "properties.updated"),
    ("cloud_cover", "properties.eo:cloud_cover"),
    ("cloud_shadow_percentage", "properties.s2:cloud_shadow_percentage"),
    ("nodata_pixel_percentage", "properties.s2:nodata_pixel_percentage"),
];

/// Field mapping table: static STAC entries plus a replaceable dynamic layer.
#[derive(Debug, Default)]
pub struct FieldMappingTable {
    dynamic: RwLock<Arc<HashMap<String, String>>>,
}

impl FieldMappingTable {
    /// Create a table with only the static entries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with an initial dynamic layer.
    #[must_use]
    pub fn with_dynamic(entries: HashMap<String, String>) -> Self {
        Self {
            dynamic: RwLock::new(Arc::new(entries)),
        }
    }

    /// Look up the static entry for a logical name.
    #[must_use]
    pub fn static_path(logical: &str) -> Option<&'static str> {
        STATIC_FIELD_MAPPING
            .iter()
            .find(|(name, _)| *name == logical)
            .map(|(_, path)| *path)
    }

    /// Resolve a logical name to its physical document path.
    ///
    /// Static entries first, then dynamic, else the name itself.
    #[must_use]
    pub fn resolve(&self, logical: &str) -> String {
        if let Some(path) = Self::static_path(logical) {
            return path.to_string();
        }
        if let Some(path) = self.dynamic.read().get(logical) {
            return path.clone();
        }
        logical.to_string()
    }

    /// Whether a logical name has an explicit mapping (static or dynamic).
    #[must_use]
    pub fn is_mapped(&self, logical: &str) -> bool {
        Self::static_path(logical).is_some() || self.dynamic.read().contains_key(logical)
    }

    /// Replace the dynamic layer wholesale.
    pub fn replace_dynamic(&self, entries: HashMap<String, String>) {
        *self.dynamic.write() = Arc::new(entries);
    }

    /// Drop all dynamic entries.
    pub fn clear_dynamic(&self) {
        self.replace_dynamic(HashMap::new());
    }

    /// Current dynamic snapshot.
    #[must_use]
    pub fn dynamic_snapshot(&self) -> Arc<HashMap<String, String>> {
        self.dynamic.read().clone()
    }
}

/// Strip the `properties.` prefix a client may put on a logical name.
#[must_use]
pub fn strip_properties_prefix(name: &str) -> &str {
    name.strip_prefix(PROPERTIES_PREFIX).unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_mapping() {
        let table = FieldMappingTable::new();
        assert_eq!(table.resolve("id"), "id");
        assert_eq!(table.resolve("created"), "properties.created");
        assert_eq!(
            table.resolve("nodata_pixel_percentage"),
            "properties.s2:nodata_pixel_percentage"
        );
    }

    #[test]
    fn test_unmapped_passthrough() {
        let table = FieldMappingTable::new();
        assert_eq!(table.resolve("view:sun_elevation"), "view:sun_elevation");
        assert!(!table.is_mapped("view:sun_elevation"));
    }

    #[test]
    fn test_static_wins_over_dynamic() {
        let table = FieldMappingTable::with_dynamic(HashMap::from([
            ("datetime".to_string(), "somewhere.else".to_string()),
            ("gsd".to_string(), "properties.gsd".to_string()),
        ]));
        assert_eq!(table.resolve("datetime"), "properties.datetime");
        assert_eq!(table.resolve("gsd"), "properties.gsd");
    }

    #[test]
    fn test_replace_is_wholesale() {
        let table = FieldMappingTable::new();
        table.replace_dynamic(HashMap::from([("a".to_string(), "properties.a".to_string())]));
        table.replace_dynamic(HashMap::from([("b".to_string(), "properties.b".to_string())]));
        assert_eq!(table.resolve("a"), "a");
        assert_eq!(table.resolve("b"), "properties.b");

        table.clear_dynamic();
        assert!(table.dynamic_snapshot().is_empty());
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_properties_prefix("properties.eo:bands"), "eo:bands");
        assert_eq!(strip_properties_prefix("id"), "id");
    }
}
