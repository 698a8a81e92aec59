//! MaxMind DB (MMDB) file layout
//!
//! The MMDB format uses a binary search tree for efficient IP address
//! lookups. Record data lives in the data section and is decoded with
//! `crate::data_section::DataDecoder`.
//!
//! ## Architecture
//!
//! - **types**: MMDB-specific types and constants
//! - **format**: Metadata location, parsing and file layout
//! - **tree**: Search tree traversal for IP lookups

pub mod format;
pub mod tree;
pub mod types;

pub use format::{find_metadata_marker, Metadata, MmdbHeader};
pub use tree::{SearchTree, TreeLookup};
pub use types::{IpVersion, RecordSize, METADATA_MARKER};
