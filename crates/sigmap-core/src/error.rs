//! Error Taxonomy
//!
//! Two error regimes, on purpose. Structural problems (malformed document
//! shape, bad header) abort immediately: later checks are meaningless on a
//! malformed tree. Semantic problems found while walking the channel
//! mappings (uniqueness violations, unknown names, unit incompatibilities)
//! are accumulated across the whole walk and surfaced together, so one edit
//! cycle fixes them all. Nothing is ever downgraded to a warning: a document
//! either fully validates or yields no [`SignalMap`](crate::SignalMap).

use std::fmt;

use thiserror::Error;

use crate::document::SyntaxError;
use crate::provider::ProviderError;

/// Header validation failure. Fail-fast: everything downstream depends on a
/// valid header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("missing header field '{field}'")]
    MissingField { field: &'static str },

    #[error("header field '{field}' must be a scalar value (line {line})")]
    NotAScalar { field: &'static str, line: usize },

    #[error("'{value}' is not a valid semantic version (line {line})")]
    InvalidVersion { value: String, line: usize },

    #[error("schema version {version} is not supported, the minimum is {minimum} (line {line})")]
    UnsupportedVersion {
        version: String,
        minimum: String,
        line: usize,
    },

    #[error("schema version {version} is not known to the schema authority (line {line})")]
    UnknownVersion { version: String, line: usize },

    #[error("'{name}' is not a valid structure for schema version {version} (line {line})")]
    UnknownStructure {
        name: String,
        version: String,
        line: usize,
    },

    #[error("machine description '{locator}' could not be resolved: {reason} (line {line})")]
    UnresolvedMachineDescription {
        locator: String,
        reason: String,
        line: usize,
    },

    #[error("machine description '{locator}' holds no data for structure '{structure}' (line {line})")]
    StructureNotInMachineDescription {
        locator: String,
        structure: String,
        line: usize,
    },
}

/// Malformed `signals` shape. Fail-fast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("the document root must be a mapping (line {line})")]
    RootNotAMapping { line: usize },

    #[error("missing 'signals' section")]
    MissingSignals,

    #[error("the 'signals' section must be a non-empty mapping of slots (line {line})")]
    SignalsNotAMapping { line: usize },

    #[error("the 'signals' section is empty (line {line})")]
    SignalsEmpty { line: usize },

    #[error("slot '{slot}' must hold a sequence of channel entries (line {line})")]
    SlotNotASequence { slot: String, line: usize },

    #[error("channel entry in slot '{slot}' must be a mapping (line {line})")]
    ChannelNotAMapping { slot: String, line: usize },

    #[error("channel entry in slot '{slot}' is missing the 'name' key (line {line})")]
    MissingChannelName { slot: String, line: usize },

    #[error("'{key}' in slot '{slot}' must be a scalar value (line {line})")]
    ValueNotAScalar {
        slot: String,
        key: String,
        line: usize,
    },

    #[error("malformed signal '{value}': expected '<source_id> [<unit>]' (line {line})")]
    MalformedSignal { value: String, line: usize },
}

/// A single semantic violation found while walking the channel mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticError {
    /// Slot the violation was found in.
    pub slot: String,
    /// Channel name, when known at the point of failure.
    pub channel: Option<String>,
    /// Leaf path, for violations tied to a single signal.
    pub path: Option<String>,
    /// Source line of the offending node.
    pub line: usize,
    pub kind: SemanticErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticErrorKind {
    #[error("unknown slot '{0}'")]
    UnknownSlot(String),

    #[error("unknown leaf path '{0}'")]
    UnknownLeafPath(String),

    #[error("duplicate channel name '{0}'")]
    DuplicateChannelName(String),

    #[error("channel name '{0}' not found in the machine description")]
    UnknownElementName(String),

    #[error("duplicate source id '{0}'")]
    DuplicateSourceId(String),

    #[error("unknown unit [{0}]")]
    UnknownUnit(String),

    #[error("unit [{unit}] is not compatible with the expected unit [{expected}]")]
    IncompatibleUnit { unit: String, expected: String },

    #[error("unit [{0}] has no linear relation to the expected unit")]
    NonlinearUnit(String),
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot '{}'", self.slot)?;
        if let Some(channel) = &self.channel {
            write!(f, ", channel '{channel}'")?;
        }
        if let Some(path) = &self.path {
            write!(f, ", path '{path}'")?;
        }
        write!(f, " (line {}): {}", self.line, self.kind)
    }
}

/// The public error of the validation pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingError {
    /// Malformed restricted-YAML input.
    #[error("invalid document: {0}")]
    Syntax(#[from] SyntaxError),

    /// Invalid or incomplete header.
    #[error("invalid header: {0}")]
    Header(#[from] HeaderError),

    /// The schema backend has no definitions for the requested version.
    #[error("schema unavailable: {0}")]
    SchemaUnavailable(String),

    /// Malformed `signals` shape.
    #[error("invalid mapping structure: {0}")]
    Structure(#[from] StructureError),

    /// One or more semantic violations, collected across the full walk.
    #[error("{}", format_violations(.0))]
    Validation(Vec<SemanticError>),

    /// Lookup of a slot that is not present in the mapping.
    #[error("slot '{0}' is not present in the mapping")]
    SlotNotFound(String),
}

fn format_violations(errors: &[SemanticError]) -> String {
    let mut out = format!("mapping validation failed with {} error(s):", errors.len());
    for err in errors {
        out.push_str("\n  - ");
        out.push_str(&err.to_string());
    }
    out
}

impl From<ProviderError> for MappingError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::SchemaUnavailable(version) => MappingError::SchemaUnavailable(version),
            ProviderError::MachineDescription { locator, reason } => {
                MappingError::Header(HeaderError::UnresolvedMachineDescription {
                    locator,
                    reason,
                    line: 0,
                })
            }
        }
    }
}
