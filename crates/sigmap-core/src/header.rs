//! Header Validation
//!
//! The header is a prerequisite for everything downstream, so checks run in
//! order and short-circuit on the first failure: field presence and shape,
//! version syntax and floor, version resolvability, target structure, and
//! machine-description resolution.

use semver::Version;
use tracing::debug;

use crate::document::Node;
use crate::error::{HeaderError, MappingError};
use crate::provider::{MachineDescriptionProvider, ProviderError, SchemaProvider};

/// The oldest schema version with name-based uniqueness semantics. Earlier
/// versions are rejected before any slot is inspected.
pub const MIN_SCHEMA_VERSION: Version = Version::new(4, 0, 0);

/// Validated document header.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MappingHeader {
    /// Free-format description of the mapping document.
    pub description: String,
    /// Schema version the mapping is validated against.
    pub schema_version: Version,
    /// Locator of the machine-description dataset.
    pub machine_description_locator: String,
    /// Structure name all signals map into.
    pub target_structure: String,
}

/// Scalar header field, or the precise reason it is unusable.
fn scalar_field<'a>(root: &'a Node, field: &'static str) -> Result<(&'a str, usize), HeaderError> {
    let entry = root
        .get(field)
        .ok_or(HeaderError::MissingField { field })?;
    let value = entry
        .value
        .as_scalar()
        .ok_or(HeaderError::NotAScalar {
            field,
            line: entry.value.pos.line,
        })?;
    Ok((value, entry.key_pos.line))
}

/// Validate the header of a parsed document against the schema authority and
/// the machine description.
pub fn validate_header(
    root: &Node,
    schema: &dyn SchemaProvider,
    machine_description: &dyn MachineDescriptionProvider,
) -> Result<MappingHeader, MappingError> {
    let (description, _) = scalar_field(root, "description")?;
    let (version_str, version_line) = scalar_field(root, "schema_version")?;
    let (locator, locator_line) = scalar_field(root, "machine_description_locator")?;
    let (structure, structure_line) = scalar_field(root, "target_structure")?;

    let version: Version =
        version_str
            .parse()
            .map_err(|_| HeaderError::InvalidVersion {
                value: version_str.to_string(),
                line: version_line,
            })?;
    if version < MIN_SCHEMA_VERSION {
        return Err(HeaderError::UnsupportedVersion {
            version: version.to_string(),
            minimum: MIN_SCHEMA_VERSION.to_string(),
            line: version_line,
        }
        .into());
    }

    if !schema.is_valid_version(&version)? {
        return Err(HeaderError::UnknownVersion {
            version: version.to_string(),
            line: version_line,
        }
        .into());
    }

    if !schema.is_valid_structure(&version, structure)? {
        return Err(HeaderError::UnknownStructure {
            name: structure.to_string(),
            version: version.to_string(),
            line: structure_line,
        }
        .into());
    }

    match machine_description.contains_structure(locator, structure) {
        Ok(true) => {}
        Ok(false) => {
            return Err(HeaderError::StructureNotInMachineDescription {
                locator: locator.to_string(),
                structure: structure.to_string(),
                line: locator_line,
            }
            .into());
        }
        Err(ProviderError::MachineDescription { locator, reason }) => {
            return Err(HeaderError::UnresolvedMachineDescription {
                locator,
                reason,
                line: locator_line,
            }
            .into());
        }
        Err(err) => return Err(err.into()),
    }

    debug!(%version, structure, locator, "header validated");
    Ok(MappingHeader {
        description: description.to_string(),
        schema_version: version,
        machine_description_locator: locator.to_string(),
        target_structure: structure.to_string(),
    })
}
