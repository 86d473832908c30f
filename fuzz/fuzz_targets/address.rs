#![no_main]
use libfuzzer_sys::fuzz_target;
use vsmtp_common::Address;

fuzz_target!(|data: &[u8]| {
    if let Ok(Ok(address)) = std::str::from_utf8(data).map(str::parse::<Address>) {
        assert_eq!(address.full().parse::<Address>().ok(), Some(address));
    }
});
