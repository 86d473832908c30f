#![no_main]
use libfuzzer_sys::fuzz_target;
use vsmtp_mailing_list::category::Category;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        let category = Category::classify(Some(raw));
        assert_eq!(Category::classify(Some(raw.to_ascii_uppercase().as_str())), category);
    }
});
