#![no_main]
use geoip2::data_section::DataDecoder;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decode every offset of an arbitrary data section
    let decoder = DataDecoder::whole(data);
    for offset in 0..data.len().min(64) {
        let _ = decoder.decode(offset);
    }
});
