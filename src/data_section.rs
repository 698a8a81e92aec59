//! Data section decoding
//!
//! Implements the complete MaxMind DB data type specification for reading:
//!
//! - **Pointer**: Reference to another data item, resolved transparently
//! - **String**: UTF-8 text data
//! - **Double**: 64-bit floating point (IEEE 754)
//! - **Bytes**: Raw byte arrays
//! - **Uint16 / Uint32 / Uint64 / Uint128**: Unsigned integers, big-endian,
//!   leading zero bytes omitted
//! - **Map**: Key-value pairs (string keys, source order kept)
//! - **Int32**: Signed 32-bit integers
//! - **Array**: Ordered lists of values
//! - **Bool**: Boolean values, stored in the control byte
//! - **Float**: 32-bit floating point (IEEE 754)
//!
//! # Format
//!
//! Every value starts with a control byte: 3 type bits and 5 size bits.
//! Type 0 means "extended"; the following byte holds the real type minus 7.
//! Sizes 29, 30 and 31 are followed by 1, 2 or 3 bytes extending the size.
//!
//! See: <https://maxmind.github.io/MaxMind-DB/>

use crate::error::{GeoIpError, Result};
use crate::source::ByteSource;
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;
use std::borrow::Cow;

/// Maximum nesting of maps, arrays and pointer hops in a single value
pub const MAX_DEPTH: usize = 512;

const TYPE_EXTENDED: u16 = 0;
const TYPE_POINTER: u16 = 1;
const TYPE_STRING: u16 = 2;
const TYPE_DOUBLE: u16 = 3;
const TYPE_BYTES: u16 = 4;
const TYPE_UINT16: u16 = 5;
const TYPE_UINT32: u16 = 6;
const TYPE_MAP: u16 = 7;
const TYPE_INT32: u16 = 8;
const TYPE_UINT64: u16 = 9;
const TYPE_UINT128: u16 = 10;
const TYPE_ARRAY: u16 = 11;
const TYPE_CONTAINER: u16 = 12;
const TYPE_END_MARKER: u16 = 13;
const TYPE_BOOL: u16 = 14;
const TYPE_FLOAT: u16 = 15;

/// A decoded data section value
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// UTF-8 string
    String(String),
    /// IEEE 754 double precision float
    Double(f64),
    /// Raw byte array
    Bytes(Vec<u8>),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value map in the order the keys appear in the file
    Map(Vec<(String, DataValue)>),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Array of values
    Array(Vec<DataValue>),
    /// Boolean value
    Bool(bool),
    /// IEEE 754 single precision float
    Float(f32),
}

impl DataValue {
    /// Look up a key if this value is a map
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Follow a chain of map keys
    pub fn get_path(&self, path: &[&str]) -> Option<&DataValue> {
        path.iter().try_fold(self, |value, key| value.get(key))
    }

    /// The string, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Any integer variant that fits in a `u64` without loss
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            DataValue::Uint16(n) => Some(n as u64),
            DataValue::Uint32(n) => Some(n as u64),
            DataValue::Uint64(n) => Some(n),
            DataValue::Uint128(n) => u64::try_from(n).ok(),
            DataValue::Int32(n) => u64::try_from(n).ok(),
            _ => None,
        }
    }

    /// Floating point variants widened to `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            DataValue::Double(d) => Some(d),
            DataValue::Float(f) => Some(f as f64),
            _ => None,
        }
    }

    /// The boolean, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            DataValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// The elements, if this is an array
    pub fn as_array(&self) -> Option<&[DataValue]> {
        match self {
            DataValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The entries, if this is a map
    pub fn as_map(&self) -> Option<&[(String, DataValue)]> {
        match self {
            DataValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Human readable name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::String(_) => "utf8_string",
            DataValue::Double(_) => "double",
            DataValue::Bytes(_) => "bytes",
            DataValue::Uint16(_) => "uint16",
            DataValue::Uint32(_) => "uint32",
            DataValue::Map(_) => "map",
            DataValue::Int32(_) => "int32",
            DataValue::Uint64(_) => "uint64",
            DataValue::Uint128(_) => "uint128",
            DataValue::Array(_) => "array",
            DataValue::Bool(_) => "boolean",
            DataValue::Float(_) => "float",
        }
    }
}

impl Serialize for DataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            DataValue::String(s) => serializer.serialize_str(s),
            DataValue::Double(d) => serializer.serialize_f64(*d),
            DataValue::Bytes(b) => serializer.serialize_bytes(b),
            DataValue::Uint16(n) => serializer.serialize_u16(*n),
            DataValue::Uint32(n) => serializer.serialize_u32(*n),
            DataValue::Int32(n) => serializer.serialize_i32(*n),
            DataValue::Uint64(n) => serializer.serialize_u64(*n),
            DataValue::Uint128(n) => serializer.serialize_u128(*n),
            DataValue::Bool(b) => serializer.serialize_bool(*b),
            DataValue::Float(f) => serializer.serialize_f32(*f),
            DataValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            DataValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// What one control byte introduced
enum Item {
    Value(DataValue),
    Pointer(usize),
    Map(usize),
    Array(usize),
}

/// A container or pointer still waiting on its children
enum Frame {
    /// Where decoding resumes once the pointed-to value is done
    Pointer { resume: usize },
    Array {
        items: Vec<DataValue>,
        remaining: usize,
    },
    /// `key` holds a decoded key whose value comes next
    Map {
        entries: Vec<(String, DataValue)>,
        remaining: usize,
        key: Option<String>,
    },
}

/// Data section decoder
///
/// Decodes values from a section `[section_start, section_end)` of a byte
/// source. Offsets passed to [`decode`](Self::decode) and pointer targets
/// are relative to `section_start`.
pub struct DataDecoder<'a, S: ByteSource + ?Sized> {
    source: &'a S,
    section_start: usize,
    section_end: usize,
}

impl<'a, S: ByteSource + ?Sized> DataDecoder<'a, S> {
    /// Create a decoder for one section of a source
    ///
    /// # Arguments
    /// * `source` - The bytes holding the section
    /// * `section_start` - Absolute offset pointers are relative to
    /// * `section_end` - Absolute offset one past the last readable byte
    pub fn new(source: &'a S, section_start: usize, section_end: usize) -> Self {
        Self {
            source,
            section_start,
            section_end: section_end.max(section_start),
        }
    }

    /// Decoder treating the whole source as one section
    pub fn whole(source: &'a S) -> Self {
        Self::new(source, 0, source.len())
    }

    /// Length of the section in bytes
    pub fn section_len(&self) -> usize {
        self.section_end - self.section_start
    }

    /// Decode the value at `offset`, returning it with the offset just past it
    ///
    /// When the value is a pointer, the returned offset is the one after the
    /// pointer itself, not after the pointed-to value.
    pub fn decode(&self, offset: usize) -> Result<(DataValue, usize)> {
        let mut cursor = offset;
        let value = self.decode_at(&mut cursor)?;
        Ok((value, cursor))
    }

    /// Decode the value at `offset`, discarding the next offset
    pub fn decode_value(&self, offset: usize) -> Result<DataValue> {
        self.decode(offset).map(|(value, _)| value)
    }

    /// Decode one value without recursing
    ///
    /// Open containers and followed pointers live on an explicit stack, so
    /// the depth limit holds however small the thread stack is.
    fn decode_at(&self, cursor: &mut usize) -> Result<DataValue> {
        let mut stack: Vec<Frame> = Vec::new();

        loop {
            if stack.len() > MAX_DEPTH {
                return Err(GeoIpError::Decoding(format!(
                    "exceeded maximum data structure depth of {}",
                    MAX_DEPTH
                )));
            }

            let mut value = match self.decode_item(cursor)? {
                Item::Value(value) => value,
                Item::Pointer(target) => {
                    stack.push(Frame::Pointer { resume: *cursor });
                    *cursor = target;
                    continue;
                }
                Item::Map(count) => {
                    let remaining = self.section_len().saturating_sub(*cursor);
                    stack.push(Frame::Map {
                        entries: Vec::with_capacity(count.min(remaining)),
                        remaining: count,
                        key: None,
                    });
                    continue;
                }
                Item::Array(count) => {
                    let remaining = self.section_len().saturating_sub(*cursor);
                    stack.push(Frame::Array {
                        items: Vec::with_capacity(count.min(remaining)),
                        remaining: count,
                    });
                    continue;
                }
            };

            // Hand the finished value to its parents until one still needs more
            loop {
                match stack.pop() {
                    None => return Ok(value),
                    Some(Frame::Pointer { resume }) => *cursor = resume,
                    Some(Frame::Array {
                        mut items,
                        remaining,
                    }) => {
                        items.push(value);
                        if remaining > 1 {
                            stack.push(Frame::Array {
                                items,
                                remaining: remaining - 1,
                            });
                            break;
                        }
                        value = DataValue::Array(items);
                    }
                    Some(Frame::Map {
                        entries,
                        remaining,
                        key: None,
                    }) => match value {
                        DataValue::String(key) => {
                            stack.push(Frame::Map {
                                entries,
                                remaining,
                                key: Some(key),
                            });
                            break;
                        }
                        other => {
                            return Err(GeoIpError::Decoding(format!(
                                "map key before offset {} is a {}, not a string",
                                *cursor,
                                other.type_name()
                            )))
                        }
                    },
                    Some(Frame::Map {
                        mut entries,
                        remaining,
                        key: Some(key),
                    }) => {
                        entries.push((key, value));
                        if remaining > 1 {
                            stack.push(Frame::Map {
                                entries,
                                remaining: remaining - 1,
                                key: None,
                            });
                            break;
                        }
                        value = DataValue::Map(entries);
                    }
                }
            }
        }
    }

    /// Read the control byte at the cursor and everything up to the children
    fn decode_item(&self, cursor: &mut usize) -> Result<Item> {
        let ctrl = self.read_byte(cursor)?;
        let mut type_id = (ctrl >> 5) as u16;

        if type_id == TYPE_POINTER {
            let target = self.decode_pointer(cursor, ctrl)?;
            if target >= self.section_len() {
                return Err(GeoIpError::Decoding(format!(
                    "pointer to {} is outside the {}-byte data section",
                    target,
                    self.section_len()
                )));
            }
            let mut target_cursor = target;
            let target_ctrl = self.read_byte(&mut target_cursor)?;
            if (target_ctrl >> 5) as u16 == TYPE_POINTER {
                return Err(GeoIpError::Decoding(format!(
                    "pointer at {} points to another pointer",
                    target
                )));
            }
            return Ok(Item::Pointer(target));
        }

        if type_id == TYPE_EXTENDED {
            let ext = self.read_byte(cursor)? as u16;
            type_id = ext + 7;
            if type_id < TYPE_INT32 {
                return Err(GeoIpError::Decoding(format!(
                    "invalid extended type byte {} at offset {}",
                    ext,
                    *cursor - 1
                )));
            }
        }

        let size = self.decode_size(cursor, ctrl & 0x1F)?;

        let value = match type_id {
            TYPE_MAP if size == 0 => DataValue::Map(Vec::new()),
            TYPE_MAP => return Ok(Item::Map(size)),
            TYPE_ARRAY if size == 0 => DataValue::Array(Vec::new()),
            TYPE_ARRAY => return Ok(Item::Array(size)),
            TYPE_STRING => self.decode_string(cursor, size)?,
            TYPE_DOUBLE => self.decode_double(cursor, size)?,
            TYPE_BYTES => DataValue::Bytes(self.read(cursor, size)?.into_owned()),
            TYPE_UINT16 => DataValue::Uint16(self.decode_uint(cursor, size, 2)? as u16),
            TYPE_UINT32 => DataValue::Uint32(self.decode_uint(cursor, size, 4)? as u32),
            TYPE_INT32 => DataValue::Int32(self.decode_uint(cursor, size, 4)? as u32 as i32),
            TYPE_UINT64 => DataValue::Uint64(self.decode_uint(cursor, size, 8)? as u64),
            TYPE_UINT128 => DataValue::Uint128(self.decode_uint(cursor, size, 16)?),
            TYPE_BOOL => match size {
                0 | 1 => DataValue::Bool(size == 1),
                _ => {
                    return Err(GeoIpError::Decoding(format!(
                        "boolean with invalid size {}",
                        size
                    )))
                }
            },
            TYPE_FLOAT => self.decode_float(cursor, size)?,
            TYPE_CONTAINER | TYPE_END_MARKER => {
                return Err(GeoIpError::Decoding(format!(
                    "unsupported type {} in data section",
                    type_id
                )))
            }
            _ => return Err(GeoIpError::Decoding(format!("unknown type {}", type_id))),
        };
        Ok(Item::Value(value))
    }

    /// Pointer value from a pointer control byte and its payload bytes
    ///
    /// Two size bits select 1 to 4 payload bytes. The three low control bits
    /// are the most significant bits of the value except in the 4-byte form.
    fn decode_pointer(&self, cursor: &mut usize, ctrl: u8) -> Result<usize> {
        let size = ((ctrl >> 3) & 0x3) as usize;
        let high = (ctrl & 0x7) as usize;
        let bytes = self.read(cursor, size + 1)?;
        let tail = bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);

        let pointer = match size {
            0 => (high << 8) | tail,
            1 => ((high << 16) | tail) + 2048,
            2 => ((high << 24) | tail) + 526_336,
            _ => tail,
        };
        Ok(pointer)
    }

    fn decode_string(&self, cursor: &mut usize, len: usize) -> Result<DataValue> {
        let start = *cursor;
        let bytes = self.read(cursor, len)?;
        let s = std::str::from_utf8(&bytes).map_err(|e| {
            GeoIpError::Decoding(format!("invalid UTF-8 in string at offset {}: {}", start, e))
        })?;
        Ok(DataValue::String(s.to_owned()))
    }

    fn decode_double(&self, cursor: &mut usize, size: usize) -> Result<DataValue> {
        if size != 8 {
            return Err(GeoIpError::Decoding(format!(
                "double of size {} (expected 8)",
                size
            )));
        }
        let bytes = self.read(cursor, 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes);
        Ok(DataValue::Double(f64::from_be_bytes(raw)))
    }

    fn decode_float(&self, cursor: &mut usize, size: usize) -> Result<DataValue> {
        if size != 4 {
            return Err(GeoIpError::Decoding(format!(
                "float of size {} (expected 4)",
                size
            )));
        }
        let bytes = self.read(cursor, 4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes);
        Ok(DataValue::Float(f32::from_be_bytes(raw)))
    }

    /// Big-endian unsigned integer of `size` bytes, at most `max` bytes wide
    fn decode_uint(&self, cursor: &mut usize, size: usize, max: usize) -> Result<u128> {
        if size > max {
            return Err(GeoIpError::Decoding(format!(
                "integer of {} bytes exceeds the {}-byte maximum",
                size, max
            )));
        }
        let bytes = self.read(cursor, size)?;
        Ok(bytes.iter().fold(0u128, |acc, &b| (acc << 8) | b as u128))
    }

    fn decode_size(&self, cursor: &mut usize, size_bits: u8) -> Result<usize> {
        match size_bits {
            0..=28 => Ok(size_bits as usize),
            29 => Ok(29 + self.read_byte(cursor)? as usize),
            30 => {
                let bytes = self.read(cursor, 2)?;
                Ok(285 + ((bytes[0] as usize) << 8 | bytes[1] as usize))
            }
            _ => {
                let bytes = self.read(cursor, 3)?;
                Ok(65_821
                    + ((bytes[0] as usize) << 16 | (bytes[1] as usize) << 8 | bytes[2] as usize))
            }
        }
    }

    fn read_byte(&self, cursor: &mut usize) -> Result<u8> {
        Ok(self.read(cursor, 1)?[0])
    }

    /// Read `len` bytes at the cursor, staying inside the section
    fn read(&self, cursor: &mut usize, len: usize) -> Result<Cow<'a, [u8]>> {
        let remaining = self.section_len().saturating_sub(*cursor);
        if len > remaining {
            return Err(GeoIpError::Decoding(format!(
                "{} bytes at offset {} run past the end of the {}-byte section",
                len,
                *cursor,
                self.section_len()
            )));
        }
        let bytes = self.source.read_bytes(self.section_start + *cursor, len)?;
        *cursor += len;
        Ok(bytes)
    }
}
