//! MMDB Search Tree Traversal
//!
//! Implements binary search tree traversal for IP address lookups.
//! The tree uses a compact binary representation where each node contains
//! two records (left and right) that point to either:
//! - Another node (continue traversal)
//! - A data section offset (found)
//! - A "not found" marker (the node count itself)

use super::format::MmdbHeader;
use super::types::{IpVersion, RecordSize, DATA_SECTION_SEPARATOR_SIZE};
use crate::error::{GeoIpError, Result};
use crate::source::ByteSource;
use std::net::IpAddr;
use zerocopy::byteorder::big_endian::{U16, U32};
use zerocopy::FromBytes;

/// Bits of zero prefix under which IPv6 trees keep the IPv4 space
const IPV4_SUBTREE_DEPTH: u8 = 96;

/// Outcome of walking the tree for one address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeLookup {
    /// Offset into the data section, `None` if the address has no record
    pub data_offset: Option<usize>,
    /// Bits consumed before the walk ended
    ///
    /// IPv4 queries report this relative to the 32-bit address, also when
    /// the tree is IPv6.
    pub prefix_len: u8,
}

/// Search tree for IP address lookups
///
/// Holds only the layout; the bytes are borrowed per lookup so the same
/// tree works over any [`ByteSource`].
#[derive(Debug, Clone, Copy)]
pub struct SearchTree {
    header: MmdbHeader,
    /// Record reached after following 96 zero bits, and how many bits that took
    ipv4_start: (u32, u8),
}

impl SearchTree {
    /// Create a search tree, resolving the IPv4 start node once
    pub fn new<S: ByteSource + ?Sized>(source: &S, header: MmdbHeader) -> Result<Self> {
        let mut tree = SearchTree {
            header,
            ipv4_start: (0, 0),
        };
        if header.ip_version == IpVersion::V6 {
            tree.ipv4_start = tree.find_ipv4_start_node(source)?;
        }
        Ok(tree)
    }

    /// Layout this tree was built from
    pub fn header(&self) -> &MmdbHeader {
        &self.header
    }

    /// Look up an IP address
    ///
    /// The caller is responsible for rejecting IPv6 addresses against an
    /// IPv4 tree; here they would simply walk the first 32 bits.
    pub fn lookup<S: ByteSource + ?Sized>(&self, source: &S, ip: IpAddr) -> Result<TreeLookup> {
        match ip {
            IpAddr::V4(addr) => {
                let bits = u128::from(u32::from(addr)) << 96;
                let (start, skipped) = self.ipv4_start;
                let (record, depth) = self.walk(source, start, bits, 32)?;
                let total = skipped + depth;
                let prefix_len = if self.header.ip_version == IpVersion::V6 {
                    total.saturating_sub(IPV4_SUBTREE_DEPTH)
                } else {
                    total
                };
                self.resolve(record, prefix_len)
            }
            IpAddr::V6(addr) => {
                let (record, depth) = self.walk(source, 0, u128::from(addr), 128)?;
                self.resolve(record, depth)
            }
        }
    }

    /// Follow `bit_count` bits of `bits` (MSB first) starting at `node`
    ///
    /// Returns the first record that is not a node index, with the number
    /// of bits consumed to reach it.
    fn walk<S: ByteSource + ?Sized>(
        &self,
        source: &S,
        mut node: u32,
        bits: u128,
        bit_count: u8,
    ) -> Result<(u32, u8)> {
        let node_count = self.header.node_count;
        let mut depth = 0u8;
        while node < node_count {
            if depth >= bit_count {
                return Err(GeoIpError::InvalidDatabase(format!(
                    "search tree is deeper than {} bits (still at node {} of {})",
                    bit_count, node, node_count
                )));
            }
            let bit = ((bits >> (127 - depth as u32)) & 1) as u8;
            node = self.read_record(source, node, bit)?;
            depth += 1;
        }
        Ok((node, depth))
    }

    fn resolve(&self, record: u32, prefix_len: u8) -> Result<TreeLookup> {
        if record == self.header.node_count {
            return Ok(TreeLookup {
                data_offset: None,
                prefix_len,
            });
        }
        Ok(TreeLookup {
            data_offset: Some(self.calculate_data_offset(record)?),
            prefix_len,
        })
    }

    /// Read a record from a node
    ///
    /// Each node contains two records. `side` determines which:
    /// - 0 = left record (for IP bit 0)
    /// - 1 = right record (for IP bit 1)
    fn read_record<S: ByteSource + ?Sized>(&self, source: &S, node: u32, side: u8) -> Result<u32> {
        let node_bytes = self.header.record_size.node_bytes();
        let bytes = source.read_bytes(node as usize * node_bytes, node_bytes)?;
        decode_record(&bytes, self.header.record_size, side)
    }

    /// Calculate data section offset from record value
    ///
    /// - Record value > node_count means it points to data
    /// - data_offset = (record_value - node_count) - 16
    /// - The 16 is the data section separator size
    fn calculate_data_offset(&self, record: u32) -> Result<usize> {
        let past_tree = record
            .checked_sub(self.header.node_count)
            .map(|n| n as usize)
            .unwrap_or(0);
        past_tree
            .checked_sub(DATA_SECTION_SEPARATOR_SIZE)
            .ok_or_else(|| {
                GeoIpError::InvalidDatabase(format!(
                    "record {} points into the data section separator (node_count = {})",
                    record, self.header.node_count
                ))
            })
    }

    /// Find the IPv4 start node in an IPv6 tree
    ///
    /// IPv4 addresses in IPv6 trees live under ::/96. Returns the record
    /// reached by following up to 96 zero bits and the number of bits taken.
    /// The record may already be a data pointer or the not-found marker if
    /// the tree ends early along that path.
    fn find_ipv4_start_node<S: ByteSource + ?Sized>(&self, source: &S) -> Result<(u32, u8)> {
        let mut node = 0u32;
        let mut depth = 0u8;
        while depth < IPV4_SUBTREE_DEPTH && node < self.header.node_count {
            node = self.read_record(source, node, 0)?;
            depth += 1;
        }
        Ok((node, depth))
    }
}

/// Extract one record from the bytes of a node
fn decode_record(bytes: &[u8], record_size: RecordSize, side: u8) -> Result<u32> {
    let side = side as usize;
    let record = match record_size {
        RecordSize::Bits16 => U16::read_from_bytes(&bytes[side * 2..side * 2 + 2])
            .map(|v| u32::from(v.get()))
            .map_err(|_| short_node())?,
        RecordSize::Bits24 => {
            let r = &bytes[side * 3..side * 3 + 3];
            (u32::from(r[0]) << 16) | (u32::from(r[1]) << 8) | u32::from(r[2])
        }
        // Layout: [left 24 bits][middle byte][right 24 bits]
        // The middle byte holds the high nibble of left, then of right
        RecordSize::Bits28 => {
            let (low, high) = if side == 0 {
                (&bytes[0..3], u32::from(bytes[3] >> 4))
            } else {
                (&bytes[4..7], u32::from(bytes[3] & 0x0F))
            };
            (high << 24) | (u32::from(low[0]) << 16) | (u32::from(low[1]) << 8) | u32::from(low[2])
        }
        RecordSize::Bits32 => U32::read_from_bytes(&bytes[side * 4..side * 4 + 4])
            .map(|v| v.get())
            .map_err(|_| short_node())?,
    };
    Ok(record)
}

fn short_node() -> GeoIpError {
    GeoIpError::InvalidDatabase("search tree node is truncated".to_string())
}
