//! Raw MMDB Database Handle
//!
//! Owns the byte source and the parsed metadata and answers
//! "which record, if any, covers this address". Typed GeoIP2 responses are
//! built on top of this in [`crate::reader`].
//!
//! The byte source sits behind a read/write lock: lookups share the read
//! side, [`Database::close`] takes the write side and drops the source. A
//! close therefore waits for in-flight lookups instead of pulling the bytes
//! out from under them.

use crate::data_section::{DataDecoder, DataValue};
use crate::error::{GeoIpError, Result};
use crate::file_reader;
use crate::mmap::MmapSource;
use crate::mmdb::{IpVersion, Metadata, MmdbHeader, SearchTree};
use crate::source::{ByteSource, ReadSeek, StreamSource};
use ipnetwork::IpNetwork;
use log::{debug, trace, warn};
use std::fmt;
use std::fs::File;
use std::net::IpAddr;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

/// How a database file is brought into the process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileAccessMode {
    /// Map the file into memory (default)
    #[default]
    MemoryMapped,
    /// Read the whole file into a buffer, gunzipping `.gz` files
    Memory,
    /// Keep the file open and seek to every read
    Stream,
}

impl fmt::Display for FileAccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileAccessMode::MemoryMapped => write!(f, "memory-mapped"),
            FileAccessMode::Memory => write!(f, "memory"),
            FileAccessMode::Stream => write!(f, "stream"),
        }
    }
}

/// A record found for an address
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    /// The decoded record
    pub data: DataValue,
    /// Network prefix length (CIDR), IPv4-relative for IPv4 queries
    pub prefix_len: u8,
    /// The network the record was stored under
    pub network: IpNetwork,
}

/// An open MMDB database
///
/// # Examples
///
/// ```no_run
/// use geoip2::Database;
///
/// let db = Database::open("GeoIP2-City.mmdb")?;
/// if let Some(result) = db.lookup("81.2.69.160".parse().unwrap())? {
///     println!("{} -> {:?}", result.network, result.data.get_path(&["city", "names", "en"]));
/// }
/// db.close();
/// # Ok::<(), geoip2::GeoIpError>(())
/// ```
pub struct Database {
    source: RwLock<Option<Box<dyn ByteSource>>>,
    header: MmdbHeader,
    tree: SearchTree,
    metadata: Metadata,
}

impl Database {
    /// Open a database file with memory mapping
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, FileAccessMode::default())
    }

    /// Open a database file with the given access mode
    ///
    /// Gzip-compressed files (`*.gz`) cannot be mapped or seeked and are
    /// always read into memory.
    pub fn open_with<P: AsRef<Path>>(path: P, mode: FileAccessMode) -> Result<Self> {
        let path = path.as_ref();
        let mode = if mode != FileAccessMode::Memory && file_reader::is_gzip_path(path) {
            warn!(
                "{} is gzip-compressed; loading into memory instead of {} access",
                path.display(),
                mode
            );
            FileAccessMode::Memory
        } else {
            mode
        };

        let source: Box<dyn ByteSource> = match mode {
            FileAccessMode::MemoryMapped => Box::new(MmapSource::open(path)?),
            FileAccessMode::Memory => Box::new(file_reader::read_all(path)?),
            FileAccessMode::Stream => Box::new(StreamSource::new(File::open(path)?)?),
        };
        debug!("Opening {} ({} access)", path.display(), mode);
        Self::from_source(source)
    }

    /// Open a database already held in memory
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_source(Box::new(data))
    }

    /// Open a database from a seekable stream
    ///
    /// The stream is kept for the lifetime of the handle and every read
    /// seeks to its offset first.
    pub fn from_stream<R: ReadSeek + 'static>(stream: R) -> Result<Self> {
        Self::from_source(Box::new(StreamSource::new(stream)?))
    }

    /// Open a database over any byte source
    pub fn from_source(source: Box<dyn ByteSource>) -> Result<Self> {
        if source.is_empty() {
            return Err(GeoIpError::InvalidDatabase(
                "database source is empty".to_string(),
            ));
        }

        let (header, metadata) = MmdbHeader::from_source(&*source)?;
        let tree = SearchTree::new(&*source, header)?;

        debug!(
            "Opened {} database: {} nodes, {}-bit records, IPv{}",
            metadata.database_type,
            header.node_count,
            header.record_size.bits(),
            header.ip_version
        );

        Ok(Database {
            source: RwLock::new(Some(source)),
            header,
            tree,
            metadata,
        })
    }

    /// Look up an IP address
    ///
    /// Returns `Ok(None)` if the database has no record for the address.
    ///
    /// # Errors
    ///
    /// - [`GeoIpError::Disposed`] after [`close`](Self::close), whatever the
    ///   address
    /// - [`GeoIpError::AddressFamily`] for an IPv6 address against an
    ///   IPv4-only database
    /// - structural errors if the file is corrupt
    pub fn lookup(&self, ip: IpAddr) -> Result<Option<LookupResult>> {
        let guard = self.source.read().unwrap_or_else(PoisonError::into_inner);
        let source = guard.as_deref().ok_or(GeoIpError::Disposed)?;

        if ip.is_ipv6() && self.header.ip_version == IpVersion::V4 {
            return Err(GeoIpError::AddressFamily(format!(
                "Error looking up {}. You attempted to look up an IPv6 address in an IPv4-only database.",
                ip
            )));
        }

        let found = self.tree.lookup(source, ip)?;
        trace!(
            "{} -> data offset {:?}, prefix /{}",
            ip,
            found.data_offset,
            found.prefix_len
        );
        let Some(data_offset) = found.data_offset else {
            return Ok(None);
        };

        let decoder = DataDecoder::new(
            source,
            self.header.data_section_start,
            self.header.data_section_end,
        );
        let data = decoder.decode_value(data_offset)?;
        let network = IpNetwork::new(ip, found.prefix_len)
            .and_then(|net| IpNetwork::new(net.network(), found.prefix_len))
            .map_err(|_| {
                GeoIpError::InvalidDatabase(format!(
                    "prefix length {} is invalid for {}",
                    found.prefix_len, ip
                ))
            })?;

        Ok(Some(LookupResult {
            data,
            prefix_len: found.prefix_len,
            network,
        }))
    }

    /// Parsed metadata, available even after close
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The metadata map exactly as stored in the file
    pub fn raw_metadata(&self) -> &DataValue {
        self.metadata.as_value()
    }

    /// Layout of the file
    pub fn header(&self) -> &MmdbHeader {
        &self.header
    }

    /// Release the byte source
    ///
    /// Waits for in-flight lookups to finish. Closing twice is a no-op.
    pub fn close(&self) {
        let mut guard = self.source.write().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            debug!("Closed {} database", self.metadata.database_type);
        }
    }

    /// True once [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.source
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("database_type", &self.metadata.database_type)
            .field("node_count", &self.header.node_count)
            .field("record_size", &self.header.record_size)
            .field("ip_version", &self.header.ip_version)
            .field("closed", &self.is_closed())
            .finish()
    }
}
