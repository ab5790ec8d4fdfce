//! Tests for the derived streaming-metadata builders: deterministic order
//! and index alignment between descriptors and conversion arrays.

use semver::Version;
use sigmap_core::{
    conversion_arrays, MachineDescription, SchemaCatalog, SignalMap, StreamingMetadata,
};

const LOCATOR: &str = "md://test/1";

fn schema() -> SchemaCatalog {
    SchemaCatalog::from_json(
        r#"{
        "versions": {
            "4.0.0": {
                "structures": {
                    "magnetics": {
                        "slots": {
                            "flux_loop": {
                                "leaves": { "flux/data": "Wb", "voltage/data": "V" }
                            },
                            "b_field_pol_probe": {
                                "leaves": { "field/data": "T" }
                            },
                            "thermocouple": {
                                "leaves": { "temperature/data": "K" }
                            }
                        }
                    }
                }
            }
        }
    }"#,
    )
    .unwrap()
}

fn machine_description() -> MachineDescription {
    MachineDescription::from_json(
        r#"{
        "locator": "md://test/1",
        "structures": {
            "magnetics": {
                "flux_loop": ["FL-1", "FL-2", "FL-3"],
                "b_field_pol_probe": ["BP-10", "BP-11"],
                "thermocouple": ["TC-1"]
            }
        }
    }"#,
    )
    .unwrap()
}

const MAPPING: &str = "\
description: Streaming test
schema_version: 4.0.0
machine_description_locator: md://test/1
target_structure: magnetics
signals:
  flux_loop:
  - name: FL-1
    flux/data: flux-0 [mV.s]
    voltage/data: voltage-0 [V]
  - name: FL-3
    voltage/data: voltage-3 [mV]
  b_field_pol_probe:
  - name: BP-11
    field/data: field-11 [T]
  thermocouple:
  - name: TC-1
    temperature/data: temp-1 [degC]
";

fn map() -> SignalMap {
    SignalMap::from_yaml_str(MAPPING, &schema(), &machine_description()).unwrap()
}

#[test]
fn test_descriptor_order_follows_declaration_order() {
    let map = map();
    let metadata = StreamingMetadata::from_signal_map(&map);
    assert_eq!(metadata.schema_version, Version::new(4, 0, 0));
    assert_eq!(metadata.target_structure, "magnetics");
    assert_eq!(metadata.machine_description_locator, LOCATOR);

    let flat: Vec<(&str, &str, &str, &str)> = metadata
        .descriptors
        .iter()
        .map(|d| {
            (
                d.slot.as_str(),
                d.channel.as_str(),
                d.path.as_str(),
                d.source_id.as_str(),
            )
        })
        .collect();
    assert_eq!(
        flat,
        [
            ("flux_loop", "FL-1", "flux/data", "flux-0"),
            ("flux_loop", "FL-1", "voltage/data", "voltage-0"),
            ("flux_loop", "FL-3", "voltage/data", "voltage-3"),
            ("b_field_pol_probe", "BP-11", "field/data", "field-11"),
            ("thermocouple", "TC-1", "temperature/data", "temp-1"),
        ]
    );
}

#[test]
fn test_conversion_arrays_align_with_descriptors() {
    let map = map();
    let metadata = StreamingMetadata::from_signal_map(&map);
    let (scale, offset) = conversion_arrays(&map);

    assert_eq!(scale.len(), metadata.descriptors.len());
    assert_eq!(offset.len(), metadata.descriptors.len());
    assert_eq!(map.num_signals(), scale.len());

    // mV.s -> Wb, V -> V, mV -> V, T -> T, degC -> K
    assert_eq!(scale, [1e-3, 1.0, 1e-3, 1.0, 1.0]);
    assert_eq!(offset, [0.0, 0.0, 0.0, 0.0, 273.15]);
}

#[test]
fn test_channels_keep_document_order_not_dataset_order() {
    // FL-3 is declared after FL-1 even though the dataset lists FL-2 in
    // between; the document order wins.
    let map = map();
    let channels = map.signals("flux_loop").unwrap();
    let names: Vec<&str> = channels.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["FL-1", "FL-3"]);
}

#[test]
fn test_metadata_serializes() {
    let metadata = StreamingMetadata::from_signal_map(&map());
    let json = serde_json::to_string(&metadata).unwrap();
    assert!(json.contains("\"flux-0\""));
    assert!(json.contains("\"target_structure\":\"magnetics\""));
}
