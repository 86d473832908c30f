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

use vsmtp_common::Address;

/// How the recipients that may be mailing lists are recognized.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
    serde_with::SerializeDisplay,
    serde_with::DeserializeFromStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum Predicate {
    /// The domain of the recipient starts with the list label, `lists.example.org`.
    ListsPrefix,
    /// The domain of the recipient is served locally.
    AnyLocal,
}

/// Screen the recipients of a mail to find the candidate list addresses.
#[derive(Debug, Clone)]
pub struct AddressClassifier {
    predicate: Predicate,
    list_domain_prefix: String,
    local_domains: std::collections::BTreeSet<String>,
}

fn normalize_domain(domain: &str) -> String {
    domain.trim_end_matches('.').to_ascii_lowercase()
}

impl AddressClassifier {
    /// Build a classifier, domains are compared ignoring the case.
    #[must_use]
    pub fn new<D: AsRef<str>>(
        predicate: Predicate,
        list_domain_prefix: &str,
        local_domains: impl IntoIterator<Item = D>,
    ) -> Self {
        Self {
            predicate,
            list_domain_prefix: normalize_domain(list_domain_prefix),
            local_domains: local_domains
                .into_iter()
                .map(|domain| normalize_domain(domain.as_ref()))
                .collect(),
        }
    }

    /// The domain with the list label removed, if the domain starts with it.
    fn strip_list_label<'a>(&self, domain: &'a str) -> Option<&'a str> {
        domain
            .split_once('.')
            .filter(|(label, rest)| *label == self.list_domain_prefix && !rest.is_empty())
            .map(|(_, rest)| rest)
    }

    /// Is the recipient possibly a mailing list ?
    #[must_use]
    pub fn is_candidate(&self, address: &Address) -> bool {
        match self.predicate {
            Predicate::ListsPrefix => self.strip_list_label(address.domain()).is_some(),
            Predicate::AnyLocal => self.is_local(address),
        }
    }

    /// Is the domain of this address served by this server ?
    #[must_use]
    pub fn is_local(&self, address: &Address) -> bool {
        self.local_domains
            .contains(address.domain().trim_end_matches('.'))
    }

    /// Domain on behalf of which the list is served, `example.org` for
    /// `mygroup@lists.example.org`.
    #[must_use]
    pub fn serving_domain<'a>(&self, list: &'a Address) -> &'a str {
        match self.predicate {
            Predicate::ListsPrefix => self
                .strip_list_label(list.domain())
                .unwrap_or_else(|| list.domain()),
            Predicate::AnyLocal => list.domain(),
        }
    }
}
