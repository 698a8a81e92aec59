//! Whole-file loading with automatic gzip decompression
//!
//! Databases are frequently distributed gzip-compressed. Files ending in
//! `.gz` (case-insensitive) are decompressed while they are read into
//! memory; everything else is read verbatim.
//!
//! # Example
//!
//! ```rust,no_run
//! use geoip2::file_reader;
//!
//! let bytes = file_reader::read_all("GeoIP2-City.mmdb.gz")?;
//! println!("{} bytes after decompression", bytes.len());
//! # Ok::<(), std::io::Error>(())
//! ```

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Buffer size for file reading (128KB)
const BUFFER_SIZE: usize = 128 * 1024;

/// True if the path carries a `.gz` extension
pub fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Read an entire file into memory, gunzipping `.gz` files
///
/// # Errors
///
/// Returns an error if:
/// - The file doesn't exist
/// - Permission denied
/// - Invalid gzip data (for .gz files)
pub fn read_all<P: AsRef<Path>>(path: P) -> io::Result<Vec<u8>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let hint = file
        .metadata()
        .map(|m| m.len() as usize)
        .unwrap_or(BUFFER_SIZE);

    let mut bytes = Vec::with_capacity(hint);
    if is_gzip_path(path) {
        let mut decoder = GzDecoder::new(BufReader::with_capacity(BUFFER_SIZE, file));
        decoder.read_to_end(&mut bytes)?;
    } else {
        let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
        reader.read_to_end(&mut bytes)?;
    }
    Ok(bytes)
}
