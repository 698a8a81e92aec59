//! Test-only MMDB writer and GeoIP2 fixture databases
//!
//! The library is read-only; this writer exists so integration tests and
//! benches can build small databases with known contents.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use geoip2::mmdb::METADATA_MARKER;
use geoip2::{DataValue, IpVersion, RecordSize};
use std::collections::HashMap;
use std::io::Write;
use std::net::IpAddr;
use tempfile::NamedTempFile;

/// Node pointer while building
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodePointer {
    /// Points to another node
    Node(u32),
    /// Data section offset and the prefix length it was inserted with
    Data(u32, u8),
    /// Not found
    Empty,
}

#[derive(Debug, Clone)]
struct Node {
    left: NodePointer,
    right: NodePointer,
}

impl Node {
    fn new_empty() -> Self {
        Node {
            left: NodePointer::Empty,
            right: NodePointer::Empty,
        }
    }
}

/// Builds an MMDB file in memory
pub struct MmdbWriter {
    database_type: String,
    ip_version: IpVersion,
    record_size: RecordSize,
    languages: Vec<String>,
    description: Vec<(String, String)>,
    build_epoch: u64,
    nodes: Vec<Node>,
    data: Vec<u8>,
    /// Offsets of strings already in the data section, reused via pointers
    strings: HashMap<String, u32>,
}

impl MmdbWriter {
    pub fn new(database_type: &str, ip_version: IpVersion, record_size: RecordSize) -> Self {
        MmdbWriter {
            database_type: database_type.to_string(),
            ip_version,
            record_size,
            languages: vec!["en".to_string()],
            description: vec![(
                "en".to_string(),
                format!("{} test database", database_type),
            )],
            build_epoch: 1_700_000_000,
            nodes: vec![Node::new_empty()],
            data: Vec::new(),
            strings: HashMap::new(),
        }
    }

    pub fn languages(mut self, languages: &[&str]) -> Self {
        self.languages = languages.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Insert a network ("1.2.3.0/24", "2001:db8::/32" or a bare address)
    ///
    /// More specific networks win regardless of insertion order.
    pub fn insert(&mut self, network: &str, value: &DataValue) {
        let (addr, prefix_len) = match network.split_once('/') {
            Some((addr, len)) => (addr.parse::<IpAddr>().unwrap(), len.parse::<u8>().unwrap()),
            None => {
                let addr = network.parse::<IpAddr>().unwrap();
                (addr, if addr.is_ipv4() { 32 } else { 128 })
            }
        };

        let (bits, depth) = match (addr, self.ip_version) {
            (IpAddr::V4(v4), IpVersion::V4) => {
                assert!(prefix_len <= 32);
                (u128::from(u32::from(v4)) << 96, prefix_len)
            }
            (IpAddr::V4(v4), IpVersion::V6) => {
                assert!(prefix_len <= 32);
                (u128::from(u32::from(v4)), 96 + prefix_len)
            }
            (IpAddr::V6(v6), IpVersion::V6) => {
                assert!(prefix_len <= 128);
                (u128::from(v6), prefix_len)
            }
            (IpAddr::V6(_), IpVersion::V4) => panic!("IPv6 network in an IPv4 tree"),
        };
        assert!(depth > 0, "cannot insert a zero-length prefix");

        let offset = self.encode_record(value);
        self.insert_bits(bits, depth, offset);
    }

    fn insert_bits(&mut self, bits: u128, depth: u8, offset: u32) {
        let mut node = 0u32;
        for i in 0..depth {
            let bit = (bits >> (127 - i as u32)) & 1 == 1;
            let current = self.child(node, bit);

            if i + 1 == depth {
                match current {
                    NodePointer::Node(child) => self.backfill(child, offset, depth),
                    NodePointer::Data(_, existing) if existing > depth => {}
                    _ => self.set_child(node, bit, NodePointer::Data(offset, depth)),
                }
                return;
            }

            node = match current {
                NodePointer::Node(child) => child,
                other => {
                    // Split: the new node inherits the less specific data on both sides
                    let child = self.nodes.len() as u32;
                    self.nodes.push(Node {
                        left: other,
                        right: other,
                    });
                    self.set_child(node, bit, NodePointer::Node(child));
                    child
                }
            };
        }
    }

    fn backfill(&mut self, node: u32, offset: u32, depth: u8) {
        for bit in [false, true] {
            match self.child(node, bit) {
                NodePointer::Empty => self.set_child(node, bit, NodePointer::Data(offset, depth)),
                NodePointer::Data(_, existing) if existing < depth => {
                    self.set_child(node, bit, NodePointer::Data(offset, depth))
                }
                NodePointer::Data(..) => {}
                NodePointer::Node(child) => self.backfill(child, offset, depth),
            }
        }
    }

    fn child(&self, node: u32, bit: bool) -> NodePointer {
        let node = &self.nodes[node as usize];
        if bit {
            node.right
        } else {
            node.left
        }
    }

    fn set_child(&mut self, node: u32, bit: bool, pointer: NodePointer) {
        let node = &mut self.nodes[node as usize];
        if bit {
            node.right = pointer;
        } else {
            node.left = pointer;
        }
    }

    fn encode_record(&mut self, value: &DataValue) -> u32 {
        let offset = self.data.len() as u32;
        let mut data = std::mem::take(&mut self.data);
        encode_value(value, &mut data, Some(&mut self.strings));
        self.data = data;
        offset
    }

    /// Serialize the database
    pub fn build(&self) -> Vec<u8> {
        let node_count = self.nodes.len() as u32;
        let mut out = Vec::new();

        for node in &self.nodes {
            let left = pointer_value(node.left, node_count);
            let right = pointer_value(node.right, node_count);
            write_node(&mut out, self.record_size, left, right);
        }
        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&self.data);
        out.extend_from_slice(METADATA_MARKER);
        encode_value(&self.metadata(node_count), &mut out, None);
        out
    }

    fn metadata(&self, node_count: u32) -> DataValue {
        let ip_version = match self.ip_version {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        };
        map(vec![
            ("binary_format_major_version", DataValue::Uint16(2)),
            ("binary_format_minor_version", DataValue::Uint16(0)),
            ("build_epoch", DataValue::Uint64(self.build_epoch)),
            ("database_type", s(&self.database_type)),
            (
                "description",
                DataValue::Map(
                    self.description
                        .iter()
                        .map(|(k, v)| (k.clone(), s(v)))
                        .collect(),
                ),
            ),
            ("ip_version", DataValue::Uint16(ip_version)),
            (
                "languages",
                DataValue::Array(self.languages.iter().map(|l| s(l)).collect()),
            ),
            ("node_count", DataValue::Uint32(node_count)),
            ("record_size", DataValue::Uint16(self.record_size.bits())),
        ])
    }
}

fn pointer_value(pointer: NodePointer, node_count: u32) -> u32 {
    match pointer {
        NodePointer::Empty => node_count,
        NodePointer::Node(id) => id,
        NodePointer::Data(offset, _) => node_count + 16 + offset,
    }
}

fn write_node(out: &mut Vec<u8>, record_size: RecordSize, left: u32, right: u32) {
    match record_size {
        RecordSize::Bits16 => {
            assert!(left <= 0xFFFF && right <= 0xFFFF, "record too large for 16 bits");
            out.extend_from_slice(&(left as u16).to_be_bytes());
            out.extend_from_slice(&(right as u16).to_be_bytes());
        }
        RecordSize::Bits24 => {
            out.extend_from_slice(&left.to_be_bytes()[1..]);
            out.extend_from_slice(&right.to_be_bytes()[1..]);
        }
        RecordSize::Bits28 => {
            out.extend_from_slice(&left.to_be_bytes()[1..]);
            out.push((((left >> 24) & 0x0F) << 4) as u8 | ((right >> 24) & 0x0F) as u8);
            out.extend_from_slice(&right.to_be_bytes()[1..]);
        }
        RecordSize::Bits32 => {
            out.extend_from_slice(&left.to_be_bytes());
            out.extend_from_slice(&right.to_be_bytes());
        }
    }
}

/// Encode a control byte (plus extended type and size bytes)
pub fn write_control(out: &mut Vec<u8>, type_id: u8, size: usize) {
    let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, Vec::new())
    } else if size < 285 {
        (29, vec![(size - 29) as u8])
    } else if size < 65_821 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        (31, ((size - 65_821) as u32).to_be_bytes()[1..].to_vec())
    };

    if type_id <= 7 {
        out.push((type_id << 5) | size_bits);
    } else {
        out.push(size_bits);
        out.push(type_id - 7);
    }
    out.extend_from_slice(&extra);
}

/// Encode a pointer to a data section offset
pub fn write_pointer(out: &mut Vec<u8>, offset: u32) {
    if offset < 2048 {
        out.push(0x20 | ((offset >> 8) & 0x07) as u8);
        out.push(offset as u8);
    } else if offset < 526_336 {
        let v = offset - 2048;
        out.push(0x28 | ((v >> 16) & 0x07) as u8);
        out.extend_from_slice(&v.to_be_bytes()[2..]);
    } else if offset < 134_744_064 {
        let v = offset - 526_336;
        out.push(0x30 | ((v >> 24) & 0x07) as u8);
        out.extend_from_slice(&v.to_be_bytes()[1..]);
    } else {
        out.push(0x38);
        out.extend_from_slice(&offset.to_be_bytes());
    }
}

fn minimal_be(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Encode a value; with a string cache, repeated strings become pointers
pub fn encode_value(
    value: &DataValue,
    out: &mut Vec<u8>,
    mut strings: Option<&mut HashMap<String, u32>>,
) {
    match value {
        DataValue::String(text) => {
            if let Some(cache) = strings.as_deref_mut() {
                if let Some(&offset) = cache.get(text) {
                    write_pointer(out, offset);
                    return;
                }
                if text.len() >= 4 {
                    cache.insert(text.clone(), out.len() as u32);
                }
            }
            write_control(out, 2, text.len());
            out.extend_from_slice(text.as_bytes());
        }
        DataValue::Double(d) => {
            write_control(out, 3, 8);
            out.extend_from_slice(&d.to_be_bytes());
        }
        DataValue::Bytes(b) => {
            write_control(out, 4, b.len());
            out.extend_from_slice(b);
        }
        DataValue::Uint16(n) => {
            let bytes = n.to_be_bytes();
            let payload = minimal_be(&bytes);
            write_control(out, 5, payload.len());
            out.extend_from_slice(payload);
        }
        DataValue::Uint32(n) => {
            let bytes = n.to_be_bytes();
            let payload = minimal_be(&bytes);
            write_control(out, 6, payload.len());
            out.extend_from_slice(payload);
        }
        DataValue::Map(entries) => {
            write_control(out, 7, entries.len());
            for (key, v) in entries {
                encode_value(&DataValue::String(key.clone()), out, strings.as_deref_mut());
                encode_value(v, out, strings.as_deref_mut());
            }
        }
        DataValue::Int32(n) => {
            write_control(out, 8, 4);
            out.extend_from_slice(&n.to_be_bytes());
        }
        DataValue::Uint64(n) => {
            let bytes = n.to_be_bytes();
            let payload = minimal_be(&bytes);
            write_control(out, 9, payload.len());
            out.extend_from_slice(payload);
        }
        DataValue::Uint128(n) => {
            let bytes = n.to_be_bytes();
            let payload = minimal_be(&bytes);
            write_control(out, 10, payload.len());
            out.extend_from_slice(payload);
        }
        DataValue::Array(items) => {
            write_control(out, 11, items.len());
            for item in items {
                encode_value(item, out, strings.as_deref_mut());
            }
        }
        DataValue::Bool(b) => write_control(out, 14, usize::from(*b)),
        DataValue::Float(f) => {
            write_control(out, 15, 4);
            out.extend_from_slice(&f.to_be_bytes());
        }
    }
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

pub fn s(text: &str) -> DataValue {
    DataValue::String(text.to_string())
}

pub fn map(entries: Vec<(&str, DataValue)>) -> DataValue {
    DataValue::Map(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

pub fn names(entries: &[(&str, &str)]) -> DataValue {
    DataValue::Map(entries.iter().map(|(k, v)| (k.to_string(), s(v))).collect())
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn write_temp(bytes: &[u8], suffix: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(suffix).unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

// ---------------------------------------------------------------------------
// GeoIP2 fixtures
// ---------------------------------------------------------------------------

pub const CITY_LANGUAGES: &[&str] = &["de", "en", "es", "fr", "ja", "pt-BR", "ru", "zh-CN"];

fn united_kingdom() -> DataValue {
    map(vec![
        ("geoname_id", DataValue::Uint32(2635167)),
        ("is_in_european_union", DataValue::Bool(false)),
        ("iso_code", s("GB")),
        (
            "names",
            names(&[
                ("de", "Vereinigtes Königreich"),
                ("en", "United Kingdom"),
                ("es", "Reino Unido"),
                ("fr", "Royaume-Uni"),
                ("ja", "イギリス"),
                ("pt-BR", "Reino Unido"),
                ("ru", "Великобритания"),
                ("zh-CN", "英国"),
            ]),
        ),
    ])
}

fn europe() -> DataValue {
    map(vec![
        ("code", s("EU")),
        ("geoname_id", DataValue::Uint32(6255148)),
        (
            "names",
            names(&[("de", "Europa"), ("en", "Europe"), ("ru", "Европа")]),
        ),
    ])
}

fn japan() -> DataValue {
    map(vec![
        ("geoname_id", DataValue::Uint32(1861060)),
        ("iso_code", s("JP")),
        (
            "names",
            names(&[("en", "Japan"), ("ja", "日本"), ("ru", "Япония")]),
        ),
    ])
}

fn asia() -> DataValue {
    map(vec![
        ("code", s("AS")),
        ("geoname_id", DataValue::Uint32(6255147)),
        ("names", names(&[("en", "Asia"), ("ja", "アジア")])),
    ])
}

fn london_record() -> DataValue {
    map(vec![
        (
            "city",
            map(vec![
                ("geoname_id", DataValue::Uint32(2643743)),
                (
                    "names",
                    names(&[
                        ("de", "London"),
                        ("en", "London"),
                        ("es", "Londres"),
                        ("fr", "Londres"),
                        ("ja", "ロンドン"),
                        ("pt-BR", "Londres"),
                        ("ru", "Лондон"),
                    ]),
                ),
            ]),
        ),
        ("continent", europe()),
        ("country", united_kingdom()),
        (
            "location",
            map(vec![
                ("accuracy_radius", DataValue::Uint16(100)),
                ("latitude", DataValue::Double(51.5142)),
                ("longitude", DataValue::Double(-0.0931)),
                ("time_zone", s("Europe/London")),
            ]),
        ),
        ("registered_country", united_kingdom()),
        (
            "subdivisions",
            DataValue::Array(vec![map(vec![
                ("geoname_id", DataValue::Uint32(6269131)),
                ("iso_code", s("ENG")),
                (
                    "names",
                    names(&[("en", "England"), ("es", "Inglaterra"), ("pt-BR", "Inglaterra")]),
                ),
            ])]),
        ),
    ])
}

fn japan_record() -> DataValue {
    map(vec![
        ("continent", asia()),
        ("country", japan()),
        (
            "location",
            map(vec![
                ("accuracy_radius", DataValue::Uint16(100)),
                ("latitude", DataValue::Double(35.68536)),
                ("longitude", DataValue::Double(139.75309)),
                ("time_zone", s("Asia/Tokyo")),
            ]),
        ),
        ("registered_country", japan()),
    ])
}

/// GeoIP2-City: 81.2.69.160/27 London, 81.2.69.192/28 Milton Keynes,
/// 2001:218::/32 Japan
pub fn city_db() -> Vec<u8> {
    let mut writer =
        MmdbWriter::new("GeoIP2-City", IpVersion::V6, RecordSize::Bits28).languages(CITY_LANGUAGES);
    writer.insert("81.2.69.160/27", &london_record());
    writer.insert(
        "81.2.69.192/28",
        &map(vec![
            (
                "city",
                map(vec![
                    ("geoname_id", DataValue::Uint32(2642465)),
                    ("names", names(&[("en", "Milton Keynes")])),
                ]),
            ),
            ("continent", europe()),
            ("country", united_kingdom()),
            (
                "location",
                map(vec![
                    ("accuracy_radius", DataValue::Uint16(100)),
                    ("latitude", DataValue::Double(52.0417)),
                    ("longitude", DataValue::Double(-0.7558)),
                    ("time_zone", s("Europe/London")),
                ]),
            ),
            ("postal", map(vec![("code", s("MK9"))])),
            ("registered_country", united_kingdom()),
        ]),
    );
    writer.insert("2001:218::/32", &japan_record());
    writer.build()
}

/// GeoIP2-Country: 81.2.69.160/27 GB, 2001:218::/32 JP
pub fn country_db() -> Vec<u8> {
    let mut writer = MmdbWriter::new("GeoIP2-Country", IpVersion::V6, RecordSize::Bits24)
        .languages(CITY_LANGUAGES);
    writer.insert(
        "81.2.69.160/27",
        &map(vec![
            ("continent", europe()),
            ("country", united_kingdom()),
            ("registered_country", united_kingdom()),
        ]),
    );
    writer.insert(
        "2001:218::/32",
        &map(vec![
            ("continent", asia()),
            ("country", japan()),
            ("registered_country", japan()),
        ]),
    );
    writer.build()
}

/// GeoIP2-Enterprise: 74.209.16.0/20 Chatham, NY
pub fn enterprise_db() -> Vec<u8> {
    let united_states = |confidence: Option<u16>| {
        let mut entries = vec![
            ("geoname_id", DataValue::Uint32(6252001)),
            ("iso_code", s("US")),
            ("names", names(&[("en", "United States"), ("ru", "США")])),
        ];
        if let Some(c) = confidence {
            entries.insert(0, ("confidence", DataValue::Uint16(c)));
        }
        map(entries)
    };

    let mut writer = MmdbWriter::new("GeoIP2-Enterprise", IpVersion::V6, RecordSize::Bits28)
        .languages(CITY_LANGUAGES);
    writer.insert(
        "74.209.16.0/20",
        &map(vec![
            (
                "city",
                map(vec![
                    ("confidence", DataValue::Uint16(11)),
                    ("geoname_id", DataValue::Uint32(5112335)),
                    ("names", names(&[("en", "Chatham")])),
                ]),
            ),
            (
                "continent",
                map(vec![
                    ("code", s("NA")),
                    ("geoname_id", DataValue::Uint32(6255149)),
                    ("names", names(&[("en", "North America")])),
                ]),
            ),
            ("country", united_states(Some(99))),
            (
                "location",
                map(vec![
                    ("accuracy_radius", DataValue::Uint16(27)),
                    ("latitude", DataValue::Double(42.3478)),
                    ("longitude", DataValue::Double(-73.5549)),
                    ("metro_code", DataValue::Uint16(532)),
                    ("time_zone", s("America/New_York")),
                ]),
            ),
            (
                "postal",
                map(vec![
                    ("code", s("12037")),
                    ("confidence", DataValue::Uint16(11)),
                ]),
            ),
            ("registered_country", united_states(None)),
            (
                "subdivisions",
                DataValue::Array(vec![map(vec![
                    ("confidence", DataValue::Uint16(93)),
                    ("geoname_id", DataValue::Uint32(5128638)),
                    ("iso_code", s("NY")),
                    ("names", names(&[("en", "New York")])),
                ])]),
            ),
            (
                "traits",
                map(vec![
                    ("autonomous_system_number", DataValue::Uint32(14671)),
                    (
                        "autonomous_system_organization",
                        s("FairPoint Communications"),
                    ),
                    ("connection_type", s("Cable/DSL")),
                    ("domain", s("frpt.net")),
                    ("is_legitimate_proxy", DataValue::Bool(true)),
                    ("isp", s("Fairpoint Communications")),
                    ("organization", s("Fairpoint Communications")),
                    ("user_type", s("residential")),
                ]),
            ),
        ]),
    );
    writer.build()
}

/// GeoIP2-ISP: 1.128.0.0/11 Telstra
pub fn isp_db() -> Vec<u8> {
    let mut writer = MmdbWriter::new("GeoIP2-ISP", IpVersion::V6, RecordSize::Bits32);
    writer.insert(
        "1.128.0.0/11",
        &map(vec![
            ("autonomous_system_number", DataValue::Uint32(1221)),
            ("autonomous_system_organization", s("Telstra Pty Ltd")),
            ("isp", s("Telstra Internet")),
            ("organization", s("Telstra Internet")),
        ]),
    );
    writer.build()
}

/// GeoIP2-Domain: 1.2.0.0/16 maxmind.com
pub fn domain_db() -> Vec<u8> {
    let mut writer = MmdbWriter::new("GeoIP2-Domain", IpVersion::V6, RecordSize::Bits24);
    writer.insert("1.2.0.0/16", &map(vec![("domain", s("maxmind.com"))]));
    writer.build()
}

/// GeoIP2-Anonymous-IP: 1.2.0.0/16 anonymous VPN
pub fn anonymous_ip_db() -> Vec<u8> {
    let mut writer = MmdbWriter::new("GeoIP2-Anonymous-IP", IpVersion::V6, RecordSize::Bits24);
    writer.insert(
        "1.2.0.0/16",
        &map(vec![
            ("is_anonymous", DataValue::Bool(true)),
            ("is_anonymous_vpn", DataValue::Bool(true)),
        ]),
    );
    writer.insert(
        "81.2.69.0/24",
        &map(vec![
            ("is_anonymous", DataValue::Bool(true)),
            ("is_hosting_provider", DataValue::Bool(true)),
            ("is_public_proxy", DataValue::Bool(true)),
            ("is_tor_exit_node", DataValue::Bool(true)),
        ]),
    );
    writer.build()
}

/// GeoIP2-Connection-Type: 1.0.0.0/24 Dialup, 1.0.1.0/24 Cable/DSL
pub fn connection_type_db() -> Vec<u8> {
    let mut writer = MmdbWriter::new("GeoIP2-Connection-Type", IpVersion::V6, RecordSize::Bits24);
    writer.insert("1.0.0.0/24", &map(vec![("connection_type", s("Dialup"))]));
    writer.insert("1.0.1.0/24", &map(vec![("connection_type", s("Cable/DSL"))]));
    writer.build()
}

/// GeoLite2-ASN, IPv4 only: 1.128.0.0/11 AS1221
pub fn asn_db() -> Vec<u8> {
    let mut writer = MmdbWriter::new("GeoLite2-ASN", IpVersion::V4, RecordSize::Bits24);
    writer.insert(
        "1.128.0.0/11",
        &map(vec![
            ("autonomous_system_number", DataValue::Uint32(1221)),
            ("autonomous_system_organization", s("Telstra Pty Ltd")),
        ]),
    );
    writer.build()
}
