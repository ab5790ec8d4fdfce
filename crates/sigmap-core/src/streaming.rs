//! Streaming Metadata - Derived Arrays for Acquisition Consumers
//!
//! Builders that flatten a validated [`SignalMap`] into the deterministic
//! order streaming consumers rely on: slot declaration order, then channel
//! declaration order, then leaf declaration order. Index `i` in every
//! derived sequence refers to the same logical signal, so conversions apply
//! to an externally-read raw sample vector with plain elementwise
//! arithmetic.

use semver::Version;
use serde::Serialize;

use crate::mapping::SignalMap;

/// Where one signal's value belongs in the destination structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalDescriptor {
    /// Slot (array-of-structures) name.
    pub slot: String,
    /// Channel element name within the slot.
    pub channel: String,
    /// Leaf path inside the channel element.
    pub path: String,
    /// Raw signal identifier in the data source.
    pub source_id: String,
}

/// Destination-shape metadata plus the flat ordered descriptor list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamingMetadata {
    pub schema_version: Version,
    pub target_structure: String,
    pub machine_description_locator: String,
    pub descriptors: Vec<SignalDescriptor>,
}

impl StreamingMetadata {
    /// Build streaming metadata from a validated map.
    pub fn from_signal_map(map: &SignalMap) -> StreamingMetadata {
        let header = map.header();
        let descriptors = map
            .iter()
            .flat_map(|(slot, channels)| {
                channels.iter().flat_map(move |channel| {
                    channel.signals.iter().map(move |signal| SignalDescriptor {
                        slot: slot.to_string(),
                        channel: channel.name.clone(),
                        path: signal.path.clone(),
                        source_id: signal.source_id.clone(),
                    })
                })
            })
            .collect();
        StreamingMetadata {
            schema_version: header.schema_version.clone(),
            target_structure: header.target_structure.clone(),
            machine_description_locator: header.machine_description_locator.clone(),
            descriptors,
        }
    }
}

/// Parallel `scale` and `offset` sequences, in the exact traversal order of
/// [`StreamingMetadata::from_signal_map`].
pub fn conversion_arrays(map: &SignalMap) -> (Vec<f64>, Vec<f64>) {
    let mut scale = Vec::with_capacity(map.num_signals());
    let mut offset = Vec::with_capacity(map.num_signals());
    for (_, channels) in map.iter() {
        for channel in channels {
            for signal in &channel.signals {
                scale.push(signal.conversion.scale);
                offset.push(signal.conversion.offset);
            }
        }
    }
    (scale, offset)
}
