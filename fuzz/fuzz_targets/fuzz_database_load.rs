#![no_main]
use libfuzzer_sys::fuzz_target;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

fuzz_target!(|data: &[u8]| {
    // Opening and querying garbage must fail cleanly, never panic
    if let Ok(db) = geoip2::Database::from_bytes(data.to_vec()) {
        let _ = db.lookup(IpAddr::V4(Ipv4Addr::new(81, 2, 69, 160)));
        let _ = db.lookup(IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)));
    }
});
