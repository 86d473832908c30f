#![no_main]
use libfuzzer_sys::fuzz_target;
use vsmtp_common::mail_context::MailContext;
use vsmtp_mailing_list::{directory::MemoryDirectory, Config, MailingListService};

const CONFIG: &str = r#"
version_requirement = ">=2.1.0"

[server]
domains = ["example.org"]

[mailing_list]
base_dn = "dc=example,dc=org"

[directory]
type = "static"
path = "./directory.json"
"#;

fuzz_target!(|data: &[u8]| {
    let Some((directory, rcpt)) = std::str::from_utf8(data)
        .ok()
        .and_then(|data| data.split_once('\n'))
    else {
        return;
    };
    let Ok(directory) = serde_json::from_str::<MemoryDirectory>(directory) else {
        return;
    };

    let config = Config::from_toml(CONFIG).unwrap();
    let service = MailingListService::new(&config, std::sync::Arc::new(directory));

    let mut mail = MailContext::new(
        "fuzz",
        "bob@example.org".parse().ok(),
        rcpt.split(',').filter_map(|rcpt| rcpt.parse().ok()),
    );
    let _ = service.service(&mut mail);
});
