//! MMDB Binary Format Parsing
//!
//! Locates the trailing metadata block and derives the file layout from it:
//!
//! ```text
//! ┌──────────────────────────────┐ 0
//! │  Search tree                 │ node_count * node_bytes
//! ├──────────────────────────────┤
//! │  16 zero bytes               │
//! ├──────────────────────────────┤ data_section_start
//! │  Data section                │
//! ├──────────────────────────────┤ data_section_end
//! │  \xAB\xCD\xEFMaxMind.com     │
//! │  Metadata map                │
//! └──────────────────────────────┘ len
//! ```

use super::types::{
    IpVersion, RecordSize, DATA_SECTION_SEPARATOR_SIZE, METADATA_MARKER, METADATA_SEARCH_SIZE,
};
use crate::data_section::{DataDecoder, DataValue};
use crate::error::{GeoIpError, Result};
use crate::source::ByteSource;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Layout of an open MMDB file
///
/// Only what lookups need; everything else lives in [`Metadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmdbHeader {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits (16, 24, 28, or 32)
    pub record_size: RecordSize,
    /// IP version (4 or 6)
    pub ip_version: IpVersion,
    /// Size of the search tree in bytes
    pub tree_size: usize,
    /// Absolute offset of the first data section byte
    pub data_section_start: usize,
    /// Absolute offset one past the last data section byte (the marker)
    pub data_section_end: usize,
}

impl MmdbHeader {
    /// Parse the metadata of a source and derive its layout
    pub fn from_source<S: ByteSource + ?Sized>(source: &S) -> Result<(Self, Metadata)> {
        if source.is_empty() {
            return Err(GeoIpError::InvalidDatabase(
                "database source is empty".to_string(),
            ));
        }

        let marker_offset = find_metadata_marker(source)?;
        let metadata_start = marker_offset + METADATA_MARKER.len();

        let decoder = DataDecoder::new(source, metadata_start, source.len());
        let value = decoder.decode_value(0).map_err(|e| {
            GeoIpError::InvalidDatabase(format!("failed to decode metadata: {}", e))
        })?;
        let metadata = Metadata::from_value(value)?;

        let tree_size = metadata.tree_size();
        let data_section_start = tree_size + DATA_SECTION_SEPARATOR_SIZE;
        if data_section_start > marker_offset {
            return Err(GeoIpError::InvalidDatabase(format!(
                "search tree of {} nodes ({} bytes) does not fit before the metadata at {}",
                metadata.node_count, tree_size, marker_offset
            )));
        }

        let header = MmdbHeader {
            node_count: metadata.node_count,
            record_size: metadata.record_size,
            ip_version: metadata.ip_version,
            tree_size,
            data_section_start,
            data_section_end: marker_offset,
        };
        Ok((header, metadata))
    }
}

/// Database metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// Major version of the binary format (always 2)
    pub binary_format_major_version: u16,
    /// Minor version of the binary format
    pub binary_format_minor_version: u16,
    /// Build time, seconds since the Unix epoch
    pub build_epoch: u64,
    /// Database type, e.g. "GeoIP2-City"
    pub database_type: String,
    /// Descriptions keyed by locale code
    pub description: BTreeMap<String, String>,
    /// IP version of the search tree
    pub ip_version: IpVersion,
    /// Locale codes the database carries names for
    pub languages: Vec<String>,
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits
    pub record_size: RecordSize,
    raw: DataValue,
}

impl Metadata {
    /// Validate and extract the metadata map
    pub fn from_value(value: DataValue) -> Result<Self> {
        if value.as_map().is_none() {
            return Err(GeoIpError::InvalidDatabase(format!(
                "metadata is a {}, not a map",
                value.type_name()
            )));
        }

        let node_count = required_uint(&value, "node_count")?;
        let node_count = u32::try_from(node_count).map_err(|_| {
            GeoIpError::InvalidDatabase(format!("node count {} out of range", node_count))
        })?;
        let record_size = RecordSize::from_bits(required_uint(&value, "record_size")?)?;
        let ip_version = IpVersion::from_number(required_uint(&value, "ip_version")?)?;

        let binary_format_major_version = optional_u16(&value, "binary_format_major_version")?;
        if let Some(major) = binary_format_major_version {
            if major != 2 {
                return Err(GeoIpError::InvalidDatabase(format!(
                    "unsupported binary format major version {}",
                    major
                )));
            }
        }

        let languages = value
            .get("languages")
            .and_then(DataValue::as_array)
            .map(|langs| {
                langs
                    .iter()
                    .filter_map(DataValue::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let description = value
            .get("description")
            .and_then(DataValue::as_map)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_owned())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Metadata {
            binary_format_major_version: binary_format_major_version.unwrap_or(2),
            binary_format_minor_version: optional_u16(&value, "binary_format_minor_version")?
                .unwrap_or(0),
            build_epoch: value
                .get("build_epoch")
                .and_then(DataValue::as_u64)
                .unwrap_or(0),
            database_type: value
                .get("database_type")
                .and_then(DataValue::as_str)
                .unwrap_or_default()
                .to_owned(),
            description,
            ip_version,
            languages,
            node_count,
            record_size,
            raw: value,
        })
    }

    /// Size of the search tree in bytes
    pub fn tree_size(&self) -> usize {
        self.node_count as usize * self.record_size.node_bytes()
    }

    /// Build time as a `SystemTime`
    pub fn build_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.build_epoch)
    }

    /// The metadata map exactly as decoded
    pub fn as_value(&self) -> &DataValue {
        &self.raw
    }
}

/// Find the metadata marker, returning the offset of its first byte
///
/// Only the last 128KB of the file are searched. If the marker occurs more
/// than once, the LAST occurrence is the real one; earlier ones can be
/// coincidences inside binary data.
pub fn find_metadata_marker<S: ByteSource + ?Sized>(source: &S) -> Result<usize> {
    let len = source.len();
    let search_start = len.saturating_sub(METADATA_SEARCH_SIZE);
    let tail = source.read_bytes(search_start, len - search_start)?;

    memchr::memmem::rfind(&tail, METADATA_MARKER)
        .map(|pos| search_start + pos)
        .ok_or_else(|| {
            GeoIpError::InvalidDatabase("could not find MaxMind DB metadata in file".to_string())
        })
}

fn required_uint(map: &DataValue, key: &str) -> Result<u64> {
    match map.get(key) {
        Some(value) => value.as_u64().ok_or_else(|| {
            GeoIpError::InvalidDatabase(format!(
                "metadata field '{}' is a {}, not an unsigned integer",
                key,
                value.type_name()
            ))
        }),
        None => Err(GeoIpError::InvalidDatabase(format!(
            "required metadata field '{}' not found",
            key
        ))),
    }
}

fn optional_u16(map: &DataValue, key: &str) -> Result<Option<u16>> {
    match map.get(key) {
        None => Ok(None),
        Some(_) => {
            let n = required_uint(map, key)?;
            u16::try_from(n).map(Some).map_err(|_| {
                GeoIpError::InvalidDatabase(format!("metadata field '{}' out of range", key))
            })
        }
    }
}
