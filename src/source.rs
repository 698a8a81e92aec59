//! Byte sources backing an open database
//!
//! Every read the reader performs goes through [`ByteSource`]: "give me `len`
//! bytes at `offset`". Three implementations exist, chosen at open time:
//!
//! - owned buffers (`Vec<u8>`, or any `[u8]` slice)
//! - memory-mapped files ([`crate::mmap::MmapSource`])
//! - seekable streams ([`StreamSource`])
//!
//! Slice-backed sources hand out borrowed bytes. The stream source has a
//! single cursor, so it serialises reads behind a mutex and returns owned
//! copies.

use crate::error::{GeoIpError, Result};
use std::borrow::Cow;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Mutex;

/// Random-access, read-only view of a database file
pub trait ByteSource: Send + Sync {
    /// Total size of the source in bytes
    fn len(&self) -> usize;

    /// True if the source holds no bytes
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read exactly `len` bytes starting at `offset`
    ///
    /// Fails with [`GeoIpError::InvalidDatabase`] if the range runs past the
    /// end of the source.
    fn read_bytes(&self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>>;
}

/// Bounds-checked borrow of `data[offset..offset + len]`
pub(crate) fn slice_at(data: &[u8], offset: usize, len: usize) -> Result<Cow<'_, [u8]>> {
    let end = offset.checked_add(len).filter(|&end| end <= data.len());
    match end {
        Some(end) => Ok(Cow::Borrowed(&data[offset..end])),
        None => Err(out_of_bounds(offset, len, data.len())),
    }
}

fn out_of_bounds(offset: usize, len: usize, size: usize) -> GeoIpError {
    GeoIpError::InvalidDatabase(format!(
        "read of {} bytes at offset {} runs past the end of the {}-byte file",
        len, offset, size
    ))
}

impl ByteSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn read_bytes(&self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>> {
        slice_at(self, offset, len)
    }
}

impl ByteSource for Vec<u8> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn read_bytes(&self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>> {
        slice_at(self, offset, len)
    }
}

/// Anything the stream source can hold
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// A database read on demand from a seekable stream
///
/// Each read seeks to the requested offset and copies the bytes out. The
/// cursor is shared, so concurrent lookups take turns on the mutex.
pub struct StreamSource {
    inner: Mutex<Box<dyn ReadSeek>>,
    len: usize,
}

impl StreamSource {
    /// Wrap a stream, measuring its length by seeking to the end
    pub fn new<R: ReadSeek + 'static>(mut stream: R) -> Result<Self> {
        let len = stream.seek(SeekFrom::End(0))?;
        let len = usize::try_from(len).map_err(|_| {
            GeoIpError::InvalidDatabase(format!("stream of {} bytes is too large", len))
        })?;
        Ok(Self {
            inner: Mutex::new(Box::new(stream)),
            len,
        })
    }
}

impl ByteSource for StreamSource {
    fn len(&self) -> usize {
        self.len
    }

    fn read_bytes(&self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => {}
            _ => return Err(out_of_bounds(offset, len, self.len)),
        }

        let mut stream = self
            .inner
            .lock()
            .map_err(|_| GeoIpError::InvalidDatabase("stream lock poisoned".to_string()))?;
        stream.seek(SeekFrom::Start(offset as u64))?;
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf)?;
        Ok(Cow::Owned(buf))
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource")
            .field("len", &self.len)
            .finish()
    }
}
