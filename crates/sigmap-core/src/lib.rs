//! Signal Mapping Validation and Unit Conversion
//!
//! This crate turns a declarative mapping document, which associates raw
//! instrument signal identifiers with locations inside a standardized
//! hierarchical data schema, into a verified, queryable in-memory model,
//! while computing the exact linear transform needed to convert each
//! signal's physical unit into the schema's required unit.
//!
//! ## Architecture
//!
//! - **Document**: restricted-YAML reader producing a node tree with source
//!   positions
//! - **Providers**: injected capability interfaces for the schema authority
//!   and the machine-description dataset
//! - **UnitRegistry**: affine unit algebra producing `scale`/`offset` pairs
//! - **SignalMap**: the immutable validated model, with derived
//!   streaming-metadata builders
//!
//! Validation is a one-shot synchronous transformation. Header and
//! structural errors fail fast; semantic errors are accumulated over the
//! whole walk and reported together.
//!
//! ## Example
//!
//! ```no_run
//! use sigmap_core::{MachineDescription, SchemaCatalog, SignalMap, StreamingMetadata};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = SchemaCatalog::from_file("schema.json".as_ref())?;
//! let md = MachineDescription::from_file("md.json".as_ref())?;
//! let map = SignalMap::from_yaml_file("mapping.yaml".as_ref(), &schema, &md)?;
//!
//! let metadata = StreamingMetadata::from_signal_map(&map);
//! let (scale, offset) = sigmap_core::conversion_arrays(&map);
//! assert_eq!(metadata.descriptors.len(), scale.len());
//! # let _ = offset;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod document;
pub mod error;
pub mod header;
pub mod mapping;
pub mod provider;
pub mod streaming;
pub mod units;

// Re-exports for convenience
pub use catalog::{CatalogError, MachineDescription, SchemaCatalog};
pub use document::{Document, Node, NodeKind, Position, SyntaxError};
pub use error::{HeaderError, MappingError, SemanticError, SemanticErrorKind, StructureError};
pub use header::{MappingHeader, MIN_SCHEMA_VERSION};
pub use mapping::{ChannelSignal, Signal, SignalMap};
pub use provider::{MachineDescriptionProvider, ProviderError, SchemaProvider};
pub use streaming::{conversion_arrays, SignalDescriptor, StreamingMetadata};
pub use units::{ConversionError, UnitConversion, UnitRegistry};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
