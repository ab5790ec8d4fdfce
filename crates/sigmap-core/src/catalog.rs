//! JSON Catalogs - File-Backed Providers
//!
//! Deterministic implementations of the provider traits, loaded from JSON.
//! They back the command-line tool and tests; production deployments inject
//! their own providers over a real schema backend and dataset.
//!
//! Schema catalog format:
//!
//! ```json
//! {
//!   "versions": {
//!     "4.0.0": {
//!       "structures": {
//!         "magnetics": {
//!           "slots": {
//!             "flux_loop": {
//!               "leaves": { "flux/data": "Wb", "voltage/data": "V" }
//!             }
//!           }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Machine description format:
//!
//! ```json
//! {
//!   "locator": "md://iter/150100-5",
//!   "structures": {
//!     "magnetics": {
//!       "flux_loop": ["55.AD.00-MSA-1001", "55.AD.00-MSA-1002"]
//!     }
//!   }
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::{MachineDescriptionProvider, ProviderError, SchemaProvider};

/// Catalog file could not be read or decoded.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read catalog {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid catalog {path}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },
}

/// Leaf paths and expected units for one slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotDef {
    /// Leaf path to expected unit.
    #[serde(default)]
    pub leaves: HashMap<String, String>,
}

/// Slots of one structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructureDef {
    #[serde(default)]
    pub slots: HashMap<String, SlotDef>,
}

/// Structures of one schema version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaVersionDef {
    #[serde(default)]
    pub structures: HashMap<String, StructureDef>,
}

/// A schema authority backed by a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    #[serde(default)]
    pub versions: HashMap<String, SchemaVersionDef>,
}

impl SchemaCatalog {
    pub fn from_json(json: &str) -> Result<SchemaCatalog, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<SchemaCatalog, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| CatalogError::Decode {
            path: path.display().to_string(),
            source,
        })
    }

    fn version(&self, version: &Version) -> Result<Option<&SchemaVersionDef>, ProviderError> {
        if self.versions.is_empty() {
            // Nothing installed at all: the authority itself is unusable.
            return Err(ProviderError::SchemaUnavailable(version.to_string()));
        }
        Ok(self.versions.get(&version.to_string()))
    }

    fn slot(
        &self,
        version: &Version,
        structure: &str,
        slot: &str,
    ) -> Result<Option<&SlotDef>, ProviderError> {
        Ok(self
            .version(version)?
            .and_then(|v| v.structures.get(structure))
            .and_then(|s| s.slots.get(slot)))
    }
}

impl SchemaProvider for SchemaCatalog {
    fn is_valid_version(&self, version: &Version) -> Result<bool, ProviderError> {
        Ok(self.version(version)?.is_some())
    }

    fn is_valid_structure(&self, version: &Version, name: &str) -> Result<bool, ProviderError> {
        Ok(self
            .version(version)?
            .is_some_and(|v| v.structures.contains_key(name)))
    }

    fn slot_names(&self, version: &Version, structure: &str) -> Result<Vec<String>, ProviderError> {
        Ok(self
            .version(version)?
            .and_then(|v| v.structures.get(structure))
            .map(|s| s.slots.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn leaf_paths(
        &self,
        version: &Version,
        structure: &str,
        slot: &str,
    ) -> Result<Vec<String>, ProviderError> {
        Ok(self
            .slot(version, structure, slot)?
            .map(|s| s.leaves.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn expected_unit(
        &self,
        version: &Version,
        structure: &str,
        slot: &str,
        path: &str,
    ) -> Result<Option<String>, ProviderError> {
        Ok(self
            .slot(version, structure, slot)?
            .and_then(|s| s.leaves.get(path))
            .cloned())
    }
}

/// A machine-description dataset backed by a JSON file. Knows the element
/// names for exactly one locator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineDescription {
    pub locator: String,
    /// Structure name to slot name to element names.
    #[serde(default)]
    pub structures: HashMap<String, HashMap<String, Vec<String>>>,
}

impl MachineDescription {
    pub fn from_json(json: &str) -> Result<MachineDescription, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<MachineDescription, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| CatalogError::Decode {
            path: path.display().to_string(),
            source,
        })
    }

    fn check_locator(&self, locator: &str) -> Result<(), ProviderError> {
        if locator != self.locator {
            return Err(ProviderError::MachineDescription {
                locator: locator.to_string(),
                reason: format!("dataset provides '{}'", self.locator),
            });
        }
        Ok(())
    }
}

impl MachineDescriptionProvider for MachineDescription {
    fn contains_structure(&self, locator: &str, structure: &str) -> Result<bool, ProviderError> {
        self.check_locator(locator)?;
        Ok(self.structures.contains_key(structure))
    }

    fn valid_names(
        &self,
        locator: &str,
        structure: &str,
        slot: &str,
    ) -> Result<HashSet<String>, ProviderError> {
        self.check_locator(locator)?;
        Ok(self
            .structures
            .get(structure)
            .and_then(|slots| slots.get(slot))
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{
        "versions": {
            "4.0.0": {
                "structures": {
                    "magnetics": {
                        "slots": {
                            "flux_loop": {
                                "leaves": { "flux/data": "Wb", "voltage/data": "V" }
                            }
                        }
                    }
                }
            }
        }
    }"#;

    const MD: &str = r#"{
        "locator": "md://test/1",
        "structures": {
            "magnetics": { "flux_loop": ["55.AD.00-MSA-1001"] }
        }
    }"#;

    #[test]
    fn test_schema_catalog_lookups() {
        let catalog = SchemaCatalog::from_json(SCHEMA).unwrap();
        let v4 = Version::new(4, 0, 0);
        assert!(catalog.is_valid_version(&v4).unwrap());
        assert!(!catalog.is_valid_version(&Version::new(5, 0, 0)).unwrap());
        assert!(catalog.is_valid_structure(&v4, "magnetics").unwrap());
        assert!(!catalog.is_valid_structure(&v4, "mhd").unwrap());
        assert_eq!(catalog.slot_names(&v4, "magnetics").unwrap(), ["flux_loop"]);
        assert_eq!(
            catalog
                .expected_unit(&v4, "magnetics", "flux_loop", "flux/data")
                .unwrap()
                .as_deref(),
            Some("Wb")
        );
        assert_eq!(
            catalog
                .expected_unit(&v4, "magnetics", "flux_loop", "nope")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_empty_catalog_is_unavailable() {
        let catalog = SchemaCatalog::default();
        let err = catalog.is_valid_version(&Version::new(4, 0, 0)).unwrap_err();
        assert!(matches!(err, ProviderError::SchemaUnavailable(_)));
    }

    #[test]
    fn test_machine_description_lookups() {
        let md = MachineDescription::from_json(MD).unwrap();
        assert!(md.contains_structure("md://test/1", "magnetics").unwrap());
        assert!(!md.contains_structure("md://test/1", "mhd").unwrap());
        let names = md.valid_names("md://test/1", "magnetics", "flux_loop").unwrap();
        assert!(names.contains("55.AD.00-MSA-1001"));

        let err = md.contains_structure("md://other", "magnetics").unwrap_err();
        assert!(matches!(err, ProviderError::MachineDescription { .. }));
    }
}
