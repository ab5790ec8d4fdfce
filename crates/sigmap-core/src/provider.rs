//! Capability Interfaces - Schema Authority and Machine Description
//!
//! The validation pipeline never owns its sources of truth. Both providers
//! are injected by the caller, which keeps the engine testable against
//! deterministic fakes and avoids any implicit global registry state.

use std::collections::HashSet;

use semver::Version;
use thiserror::Error;

/// Failure reported by a provider itself, as opposed to a negative answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// No schema definitions are installed for the requested version.
    #[error("no schema definitions available for version {0}")]
    SchemaUnavailable(String),

    /// The machine-description locator could not be resolved.
    #[error("machine description '{locator}' could not be resolved: {reason}")]
    MachineDescription { locator: String, reason: String },
}

/// Source of truth for valid structure names, slot names, leaf paths and
/// expected units, per schema version.
pub trait SchemaProvider {
    /// Whether the version resolves to an installed schema definition.
    fn is_valid_version(&self, version: &Version) -> Result<bool, ProviderError>;

    /// Whether `name` is a valid structure under the given schema version.
    fn is_valid_structure(&self, version: &Version, name: &str) -> Result<bool, ProviderError>;

    /// Valid array-of-structures slot names directly under the structure.
    fn slot_names(&self, version: &Version, structure: &str) -> Result<Vec<String>, ProviderError>;

    /// Valid child leaf paths under one element of the given slot.
    fn leaf_paths(
        &self,
        version: &Version,
        structure: &str,
        slot: &str,
    ) -> Result<Vec<String>, ProviderError>;

    /// The unit the schema requires for a leaf path, if the path declares one.
    fn expected_unit(
        &self,
        version: &Version,
        structure: &str,
        slot: &str,
        path: &str,
    ) -> Result<Option<String>, ProviderError>;
}

/// Source of truth for the element names registered in a machine-description
/// dataset.
pub trait MachineDescriptionProvider {
    /// Whether the locator resolves and holds data for the structure.
    fn contains_structure(&self, locator: &str, structure: &str) -> Result<bool, ProviderError>;

    /// The set of valid unique element names for a slot of the structure.
    fn valid_names(
        &self,
        locator: &str,
        structure: &str,
        slot: &str,
    ) -> Result<HashSet<String>, ProviderError>;
}
