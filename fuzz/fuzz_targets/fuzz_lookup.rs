#![no_main]
use geoip2::mmdb::METADATA_MARKER;
use geoip2::Database;
use libfuzzer_sys::fuzz_target;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::OnceLock;

/// One-node IPv6 tree whose data section and metadata are fixed
fn database() -> &'static Database {
    static DB: OnceLock<Database> = OnceLock::new();
    DB.get_or_init(|| {
        let mut bytes = vec![0x00, 0x00, 0x01, 0x00, 0x00, 17];
        bytes.extend_from_slice(&[0u8; 16]);
        bytes.extend_from_slice(&[0xe1, 0x43, b'k', b'e', b'y', 0x43, b'v', b'a', b'l']);
        bytes.extend_from_slice(METADATA_MARKER);
        bytes.extend_from_slice(&[0xe3, 0x4a]);
        bytes.extend_from_slice(b"ip_version");
        bytes.extend_from_slice(&[0xa1, 0x06, 0x4a]);
        bytes.extend_from_slice(b"node_count");
        bytes.extend_from_slice(&[0xc1, 0x01, 0x4b]);
        bytes.extend_from_slice(b"record_size");
        bytes.extend_from_slice(&[0xa1, 24]);
        Database::from_bytes(bytes).expect("fixture database is valid")
    })
}

fuzz_target!(|data: &[u8]| {
    // Arbitrary addresses, as text and as raw bits
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(ip) = text.parse::<IpAddr>() {
            let _ = database().lookup(ip);
        }
    }
    if data.len() >= 16 {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&data[..16]);
        let _ = database().lookup(IpAddr::V6(Ipv6Addr::from(octets)));
    }
});
