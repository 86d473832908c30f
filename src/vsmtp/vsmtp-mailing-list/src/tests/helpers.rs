/*
 * vSMTP mail transfer agent
 * Copyright (C) 2022 viridIT SAS
 *
 * This program is free software: you can redistribute it and/or modify it under
 * the terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or any later version.
 *
 * This program is distributed in the hope that it will be useful, but WITHOUT
 * ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
 * FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * this program. If not, see https://www.gnu.org/licenses/.
 *
*/

use crate::{
    classifier::{AddressClassifier, Predicate},
    directory::MemoryDirectory,
    Config, MailingListService,
};
use vsmtp_common::{
    directory::{DirectoryError, DirectorySource, GroupEntry},
    mail_context::MailContext,
    Address,
};

pub fn classifier() -> AddressClassifier {
    AddressClassifier::new(Predicate::ListsPrefix, "lists", ["example.org"])
}

pub fn addresses(addresses: &[&str]) -> std::collections::BTreeSet<Address> {
    addresses
        .iter()
        .map(|address| vsmtp_common::addr!(address))
        .collect()
}

pub fn group(category: &str, members: &[&str], owners: &[&str]) -> GroupEntry {
    GroupEntry {
        location: "cn=group,ou=lists,dc=example,dc=org".to_string(),
        category: Some(category.to_string()),
        members: addresses(members),
        owners: addresses(owners),
    }
}

pub fn new_mail(sender: Option<&str>, rcpt: &[&str]) -> MailContext {
    MailContext::new(
        "msg",
        sender.map(|sender| vsmtp_common::addr!(sender)),
        rcpt.iter().map(|rcpt| vsmtp_common::addr!(rcpt)),
    )
}

pub fn config() -> Config {
    config_with("")
}

/// The test configuration with additional `[mailing_list]` options.
pub fn config_with(mailing_list: &str) -> Config {
    Config::from_toml(&format!(
        r#"
version_requirement = ">=2.1.0"

[server]
domains = ["example.org"]

[mailing_list]
base_dn = "dc=example,dc=org"
{mailing_list}

[directory]
type = "static"
path = "./directory.json"
"#
    ))
    .unwrap()
}

pub fn service(directory: impl DirectorySource + 'static) -> MailingListService {
    MailingListService::new(&config(), std::sync::Arc::new(directory))
}

/// A directory counting the lookups, or always unavailable.
#[derive(Debug)]
pub struct CountingDirectory {
    inner: Option<MemoryDirectory>,
    failure: Option<u32>,
    lookups: std::sync::atomic::AtomicUsize,
}

impl CountingDirectory {
    pub const fn new(inner: MemoryDirectory) -> Self {
        Self {
            inner: Some(inner),
            failure: None,
            lookups: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub const fn unavailable() -> Self {
        Self {
            inner: None,
            failure: None,
            lookups: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub const fn failing(code: u32) -> Self {
        Self {
            inner: None,
            failure: Some(code),
            lookups: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl DirectorySource for CountingDirectory {
    fn lookup(
        &self,
        base: &str,
        attribute: &str,
        value: &str,
    ) -> Result<Option<GroupEntry>, DirectoryError> {
        self.lookups
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        match (&self.inner, self.failure) {
            (Some(inner), _) => inner.lookup(base, attribute, value),
            (None, Some(code)) => Err(DirectoryError::Failure {
                code,
                message: "insufficient access rights".to_string(),
            }),
            (None, None) => Err(DirectoryError::unavailable("connection timed out")),
        }
    }
}
