//! Memory-mapped database files.
//!
//! Mapping is the default access mode: opening is a single `mmap()` call and
//! the pages are shared between every process that maps the same file.
//!
//! # Safety
//!
//! A mapped file can change underneath us if another process rewrites it.
//! The reader treats the mapping as immutable and every access is bounds
//! checked, so a concurrently truncated file surfaces as a decoding error
//! rather than undefined behaviour in safe code. Replace database files by
//! renaming a new file into place, never by writing over the old one.
//!
//! # Example
//!
//! ```no_run
//! use geoip2::mmap::MmapSource;
//! use geoip2::source::ByteSource;
//!
//! let source = MmapSource::open("GeoIP2-City.mmdb")?;
//! println!("Size: {} bytes", source.len());
//! # Ok::<(), geoip2::GeoIpError>(())
//! ```

use crate::error::Result;
use crate::source::{slice_at, ByteSource};
use memmap2::Mmap;
use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::path::Path;

/// A memory-mapped database file.
///
/// The file is unmapped when the `MmapSource` is dropped.
pub struct MmapSource {
    /// The memory-mapped file
    mmap: Mmap,
}

impl MmapSource {
    /// Open and memory-map a database file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GeoIpError::Io`] if the file cannot be opened or
    /// mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the mapping is read-only and all reads are bounds checked
        // against the length captured here.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(MmapSource { mmap })
    }

    /// Get a slice of the entire mapped memory.
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap[..]
    }
}

impl ByteSource for MmapSource {
    fn len(&self) -> usize {
        self.mmap.len()
    }

    fn read_bytes(&self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>> {
        slice_at(self.as_slice(), offset, len)
    }
}

impl fmt::Debug for MmapSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmapSource")
            .field("size", &self.mmap.len())
            .finish()
    }
}
