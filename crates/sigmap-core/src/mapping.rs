//! Signal Mapping - Validation Walk and Immutable Model
//!
//! [`SignalMap`] is constructed exactly once, through the validation
//! pipeline; no partial or invalid instance is ever observable. The walk
//! over the `signals` section cross-references the schema authority and the
//! machine description, computes a unit conversion per declared signal, and
//! accumulates every semantic violation before reporting. Declaration order
//! of slots, channels and leaves is preserved end to end: downstream
//! consumers rely on it for index-aligned conversion arrays.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::document::{Document, Node};
use crate::error::{MappingError, SemanticError, SemanticErrorKind, StructureError};
use crate::header::{validate_header, MappingHeader};
use crate::provider::{MachineDescriptionProvider, SchemaProvider};
use crate::units::{ConversionError, UnitConversion, UnitRegistry};

/// One mapped signal within a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    /// Leaf path inside the channel element, e.g. `flux/data`.
    pub path: String,
    /// Raw signal identifier in the data source.
    pub source_id: String,
    /// Declared unit of the source signal, as written in the document.
    pub unit: String,
    /// Unit the schema requires at this leaf path.
    pub expected_unit: String,
    /// Linear transform from the source unit into the schema unit.
    pub conversion: UnitConversion,
}

/// One uniquely named channel within a slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSignal {
    /// Element name, matched against the machine description.
    pub name: String,
    /// Mapped signals, in declaration order.
    pub signals: Vec<Signal>,
}

/// Validated, immutable signal map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalMap {
    header: MappingHeader,
    slots: IndexMap<String, Vec<ChannelSignal>>,
}

impl SignalMap {
    /// Validate a parsed document tree into a signal map.
    pub fn from_document(
        document: &Document,
        schema: &dyn SchemaProvider,
        machine_description: &dyn MachineDescriptionProvider,
    ) -> Result<SignalMap, MappingError> {
        let root = &document.root;
        if root.as_mapping().is_none() {
            return Err(StructureError::RootNotAMapping {
                line: root.pos.line,
            }
            .into());
        }
        let header = validate_header(root, schema, machine_description)?;
        let slots = validate_signals(root, &header, schema, machine_description)?;
        debug!(
            structure = %header.target_structure,
            slots = slots.len(),
            "signal map validated"
        );
        Ok(SignalMap { header, slots })
    }

    /// Parse and validate a mapping document from a string.
    pub fn from_yaml_str(
        text: &str,
        schema: &dyn SchemaProvider,
        machine_description: &dyn MachineDescriptionProvider,
    ) -> Result<SignalMap, MappingError> {
        let document = Document::parse(text)?;
        SignalMap::from_document(&document, schema, machine_description)
    }

    /// Parse and validate a mapping document from a file. Errors carry the
    /// filename via the document label.
    pub fn from_yaml_file(
        path: &Path,
        schema: &dyn SchemaProvider,
        machine_description: &dyn MachineDescriptionProvider,
    ) -> Result<SignalMap, MappingError> {
        let document = Document::parse_file(path)?;
        SignalMap::from_document(&document, schema, machine_description)
    }

    /// The validated header.
    pub fn header(&self) -> &MappingHeader {
        &self.header
    }

    /// Channels of one slot, in declaration order.
    pub fn signals(&self, slot: &str) -> Result<&[ChannelSignal], MappingError> {
        self.slots
            .get(slot)
            .map(Vec::as_slice)
            .ok_or_else(|| MappingError::SlotNotFound(slot.to_string()))
    }

    /// Slot names, in declaration order.
    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Iterate over `(slot, channels)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ChannelSignal])> {
        self.slots.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Total number of mapped signals.
    pub fn num_signals(&self) -> usize {
        self.slots
            .values()
            .flatten()
            .map(|channel| channel.signals.len())
            .sum()
    }

    /// Serialize back into the mapping document format. Re-validating the
    /// output yields an equivalent map.
    pub fn to_yaml_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "description: {}", self.header.description);
        let _ = writeln!(out, "schema_version: {}", self.header.schema_version);
        let _ = writeln!(
            out,
            "machine_description_locator: {}",
            self.header.machine_description_locator
        );
        let _ = writeln!(out, "target_structure: {}", self.header.target_structure);
        let _ = writeln!(out, "signals:");
        for (slot, channels) in &self.slots {
            let _ = writeln!(out, "  {slot}:");
            for channel in channels {
                let _ = writeln!(out, "  - name: {}", channel.name);
                for signal in &channel.signals {
                    let _ = writeln!(
                        out,
                        "    {}: {} [{}]",
                        signal.path, signal.source_id, signal.unit
                    );
                }
            }
        }
        out
    }
}

/// Split a leaf value into `(source_id, unit)` per the
/// `<source_id> [<unit>]` syntax.
fn parse_signal_expression(value: &str, line: usize) -> Result<(&str, &str), StructureError> {
    let malformed = || StructureError::MalformedSignal {
        value: value.to_string(),
        line,
    };
    let (source_id, bracketed) = value.split_once('[').ok_or_else(malformed)?;
    let unit = bracketed.strip_suffix(']').ok_or_else(malformed)?;
    let source_id = source_id.trim();
    if source_id.is_empty() || unit.trim().is_empty() {
        return Err(malformed());
    }
    Ok((source_id, unit.trim()))
}

/// Walk the `signals` section, aggregating semantic errors.
fn validate_signals(
    root: &Node,
    header: &MappingHeader,
    schema: &dyn SchemaProvider,
    machine_description: &dyn MachineDescriptionProvider,
) -> Result<IndexMap<String, Vec<ChannelSignal>>, MappingError> {
    let signals_entry = root
        .get("signals")
        .ok_or(StructureError::MissingSignals)?;
    let slot_entries = signals_entry.value.as_mapping().ok_or({
        StructureError::SignalsNotAMapping {
            line: signals_entry.value.pos.line,
        }
    })?;
    if slot_entries.is_empty() {
        return Err(StructureError::SignalsEmpty {
            line: signals_entry.key_pos.line,
        }
        .into());
    }

    let version = &header.schema_version;
    let structure = &header.target_structure;
    let registry = UnitRegistry::new();
    let valid_slots: HashSet<String> = schema
        .slot_names(version, structure)?
        .into_iter()
        .collect();

    let mut errors: Vec<SemanticError> = Vec::new();
    // Source ids must be unique across the whole document, not per slot.
    let mut seen_source_ids: HashSet<String> = HashSet::new();
    let mut slots: IndexMap<String, Vec<ChannelSignal>> = IndexMap::new();

    for slot_entry in slot_entries {
        let slot = &slot_entry.key;
        if !valid_slots.contains(slot.as_str()) {
            errors.push(SemanticError {
                slot: slot.clone(),
                channel: None,
                path: None,
                line: slot_entry.key_pos.line,
                kind: SemanticErrorKind::UnknownSlot(slot.clone()),
            });
            continue;
        }

        let channel_nodes =
            slot_entry
                .value
                .as_sequence()
                .ok_or_else(|| StructureError::SlotNotASequence {
                    slot: slot.clone(),
                    line: slot_entry.value.pos.line,
                })?;

        let leaf_paths: HashSet<String> = schema
            .leaf_paths(version, structure, slot)?
            .into_iter()
            .collect();
        let valid_names = machine_description.valid_names(
            &header.machine_description_locator,
            structure,
            slot,
        )?;

        let mut seen_names: HashSet<String> = HashSet::new();
        let mut channels: Vec<ChannelSignal> = Vec::new();

        for channel_node in channel_nodes {
            let entries =
                channel_node
                    .as_mapping()
                    .ok_or_else(|| StructureError::ChannelNotAMapping {
                        slot: slot.clone(),
                        line: channel_node.pos.line,
                    })?;
            let name_entry =
                channel_node
                    .get("name")
                    .ok_or_else(|| StructureError::MissingChannelName {
                        slot: slot.clone(),
                        line: channel_node.pos.line,
                    })?;
            let name = name_entry.value.as_scalar().ok_or_else(|| {
                StructureError::ValueNotAScalar {
                    slot: slot.clone(),
                    key: "name".to_string(),
                    line: name_entry.value.pos.line,
                }
            })?;

            if !seen_names.insert(name.to_string()) {
                errors.push(SemanticError {
                    slot: slot.clone(),
                    channel: Some(name.to_string()),
                    path: None,
                    line: name_entry.key_pos.line,
                    kind: SemanticErrorKind::DuplicateChannelName(name.to_string()),
                });
            }
            if !valid_names.contains(name) {
                errors.push(SemanticError {
                    slot: slot.clone(),
                    channel: Some(name.to_string()),
                    path: None,
                    line: name_entry.key_pos.line,
                    kind: SemanticErrorKind::UnknownElementName(name.to_string()),
                });
            }

            let mut channel_signals: Vec<Signal> = Vec::new();
            for entry in entries.iter().filter(|e| e.key != "name") {
                let path = &entry.key;
                let mut record = |path_line: usize, kind: SemanticErrorKind| {
                    errors.push(SemanticError {
                        slot: slot.clone(),
                        channel: Some(name.to_string()),
                        path: Some(path.clone()),
                        line: path_line,
                        kind,
                    });
                };

                if !leaf_paths.contains(path.as_str()) {
                    record(
                        entry.key_pos.line,
                        SemanticErrorKind::UnknownLeafPath(path.clone()),
                    );
                    continue;
                }

                let value = entry.value.as_scalar().ok_or_else(|| {
                    StructureError::ValueNotAScalar {
                        slot: slot.clone(),
                        key: path.clone(),
                        line: entry.value.pos.line,
                    }
                })?;
                let (source_id, unit) =
                    parse_signal_expression(value, entry.value.pos.line)?;

                if !seen_source_ids.insert(source_id.to_string()) {
                    record(
                        entry.key_pos.line,
                        SemanticErrorKind::DuplicateSourceId(source_id.to_string()),
                    );
                }

                let expected =
                    match schema.expected_unit(version, structure, slot, path)? {
                        Some(expected) => expected,
                        None => {
                            // Valid path but no declared unit: not mappable.
                            record(
                                entry.key_pos.line,
                                SemanticErrorKind::UnknownLeafPath(path.clone()),
                            );
                            continue;
                        }
                    };

                match registry.conversion(unit, &expected) {
                    Ok(conversion) => channel_signals.push(Signal {
                        path: path.clone(),
                        source_id: source_id.to_string(),
                        unit: unit.to_string(),
                        expected_unit: expected,
                        conversion,
                    }),
                    Err(err) => {
                        let kind = match err {
                            ConversionError::UnknownUnit(u) => SemanticErrorKind::UnknownUnit(u),
                            ConversionError::Malformed(u) => SemanticErrorKind::UnknownUnit(u),
                            ConversionError::Incompatible { unit, expected } => {
                                SemanticErrorKind::IncompatibleUnit { unit, expected }
                            }
                            ConversionError::Nonlinear(u) => SemanticErrorKind::NonlinearUnit(u),
                        };
                        record(entry.key_pos.line, kind);
                    }
                }
            }

            channels.push(ChannelSignal {
                name: name.to_string(),
                signals: channel_signals,
            });
        }

        slots.insert(slot.clone(), channels);
    }

    if errors.is_empty() {
        Ok(slots)
    } else {
        debug!(count = errors.len(), "mapping validation failed");
        Err(MappingError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_map_is_shareable() {
        // Validated maps are immutable and freely shared across threads.
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SignalMap>();
    }

    #[test]
    fn test_parse_signal_expression() {
        let (id, unit) = parse_signal_expression("test1 [Wb]", 1).unwrap();
        assert_eq!(id, "test1");
        assert_eq!(unit, "Wb");

        let (id, unit) = parse_signal_expression("A:B-C [mV.s]", 1).unwrap();
        assert_eq!(id, "A:B-C");
        assert_eq!(unit, "mV.s");

        for bad in ["test1", "test1 [Wb", "test1 []", "[Wb]"] {
            assert!(parse_signal_expression(bad, 1).is_err(), "{bad}");
        }
    }
}
