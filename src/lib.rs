//! geoip2 - GeoIP2 and GeoLite2 Database Reader
//!
//! Reads MaxMind DB (MMDB) files and maps their records into typed GeoIP2
//! responses: City, Country, Enterprise, ISP, Domain, Anonymous IP,
//! Connection Type and ASN.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use geoip2::DatabaseReader;
//!
//! let reader = DatabaseReader::open("GeoIP2-City.mmdb")?;
//!
//! let response = reader.city("81.2.69.160")?;
//! println!("City: {:?}", response.city.name());
//! println!("Accuracy: {:?} km", response.location.accuracy_radius);
//! println!("Network: {}", response.traits.network);
//! # Ok::<(), geoip2::GeoIpError>(())
//! ```
//!
//! # Access Modes
//!
//! - [`FileAccessMode::MemoryMapped`] (default): the file is mapped and
//!   shared between processes
//! - [`FileAccessMode::Memory`]: the whole file is read into a buffer;
//!   `.gz` files are decompressed on the way in
//! - [`FileAccessMode::Stream`]: the file stays open and every read seeks
//!
//! Any `Read + Seek` value can be used directly with
//! [`DatabaseReader::from_stream`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  MMDB File                           │
//! ├──────────────────────────────────────┤
//! │  1. Search Tree (binary trie)        │
//! │  2. 16-byte separator                │
//! │  3. Data Section (typed, pointers)   │
//! │  4. Metadata marker + map            │
//! └──────────────────────────────────────┘
//!          ↓ ByteSource (mmap / Vec / stream)
//! ┌──────────────────────────────────────┐
//! │  Database: tree walk + decode        │
//! │  DatabaseReader: typed responses     │
//! └──────────────────────────────────────┘
//! ```
//!
//! Raw records are available through [`Database::lookup`] for database
//! types without a typed response.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Data section decoding
pub mod data_section;
/// Raw database handle
pub mod database;
/// Error types for reader operations
pub mod error;
pub mod file_reader;
pub mod locale;
pub mod mmap;
/// MMDB file layout: metadata and search tree
pub mod mmdb;
pub mod model;
pub mod reader;
pub mod responses;
/// Byte sources the reader can sit on
pub mod source;

// Re-exports for Rust consumers

pub use crate::data_section::DataValue;
pub use crate::database::{Database, FileAccessMode, LookupResult};
pub use crate::error::{ErrorKind, GeoIpError, Result};
pub use crate::mmdb::{IpVersion, Metadata, RecordSize};
pub use crate::reader::{DatabaseReader, LookupAddress, LookupMethod, ReaderBuilder, ReaderOptions};
pub use crate::responses::{
    AnonymousIpResponse, AsnResponse, CityResponse, ConnectionTypeResponse, CountryResponse,
    DomainResponse, EnterpriseResponse, IspResponse,
};
pub use crate::source::{ByteSource, ReadSeek, StreamSource};

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
