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

use crate::api::{Ldap, LdapParameters};
use ldap3::{
    controls::{ProxyAuth, RawControl},
    LdapError, Scope, SearchEntry,
};
use vsmtp_common::{
    directory::{DirectoryError, DirectorySource, GroupEntry},
    Address,
};

/// ldap result code returned when the base of a search does not exist.
const NO_SUCH_OBJECT: u32 = 32;

/// Names of the object class and attributes used to read groups.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct LdapSchema {
    /// object class of the group entries.
    #[serde(default = "LdapSchema::default_group_object_class")]
    pub group_object_class: String,
    /// attribute holding the DNs of the members.
    #[serde(default = "LdapSchema::default_member_attribute")]
    pub member_attribute: String,
    /// attribute holding the DNs of the owners.
    #[serde(default = "LdapSchema::default_owner_attribute")]
    pub owner_attribute: String,
    /// attribute holding the address of a member or owner entry.
    #[serde(default = "LdapSchema::default_mail_attribute")]
    pub mail_attribute: String,
}

impl Default for LdapSchema {
    fn default() -> Self {
        Self {
            group_object_class: Self::default_group_object_class(),
            member_attribute: Self::default_member_attribute(),
            owner_attribute: Self::default_owner_attribute(),
            mail_attribute: Self::default_mail_attribute(),
        }
    }
}

impl LdapSchema {
    fn default_group_object_class() -> String {
        "groupOfNames".to_string()
    }

    fn default_member_attribute() -> String {
        "member".to_string()
    }

    fn default_owner_attribute() -> String {
        "owner".to_string()
    }

    fn default_mail_attribute() -> String {
        "mail".to_string()
    }
}

/// A [`DirectorySource`] backed by a ldap server.
#[derive(Debug)]
pub struct LdapDirectory {
    ldap: Ldap,
    schema: LdapSchema,
    category_attribute: String,
    administrator_id: Option<String>,
    max_references: usize,
}

impl LdapDirectory {
    /// Build the directory with its connection pool, reading the category
    /// from the `businessCategory` attribute.
    #[must_use]
    pub fn with_parameters(parameters: &LdapParameters) -> Self {
        Self {
            ldap: Ldap::with_parameters(parameters),
            schema: parameters.schema.clone(),
            category_attribute: "businessCategory".to_string(),
            administrator_id: None,
            max_references: usize::MAX,
        }
    }

    /// Read the category of the groups from another attribute.
    #[must_use]
    pub fn with_category_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.category_attribute = attribute.into();
        self
    }

    /// Run every query on behalf of this identity (RFC 4370).
    #[must_use]
    pub fn with_administrator(mut self, administrator_id: Option<String>) -> Self {
        self.administrator_id = administrator_id;
        self
    }

    /// Stop reading the members (or owners) of a group once `max` of them
    /// have been resolved.
    #[must_use]
    pub const fn with_max_references(mut self, max: usize) -> Self {
        self.max_references = max;
        self
    }

    fn controls(&self) -> Vec<RawControl> {
        self.administrator_id
            .iter()
            .map(|id| {
                ProxyAuth {
                    authzid: authzid(id),
                }
                .into()
            })
            .collect()
    }

    /// Read the address of the entry located at `dn`.
    ///
    /// Groups are addressed by `group_attribute`, so that a nested group
    /// can be looked up again, other entries by the mail attribute.
    fn resolve_reference(
        &self,
        dn: &str,
        group_attribute: &str,
    ) -> Result<Option<Address>, DirectoryError> {
        let entries = match self
            .ldap
            .search(
                dn,
                Scope::Base,
                "(objectClass=*)",
                vec![
                    "objectClass",
                    self.schema.mail_attribute.as_str(),
                    group_attribute,
                ],
                self.controls(),
            )
            .and_then(|result| result.success())
        {
            Ok((entries, _)) => entries,
            Err(LdapError::LdapResult { result }) if result.rc == NO_SUCH_OBJECT => {
                tracing::warn!(%dn, "Referenced entry does not exist, skipping.");
                return Ok(None);
            }
            Err(error) => return Err(map_error(error)),
        };

        let entry = match entries.into_iter().next() {
            Some(entry) => SearchEntry::construct(entry),
            None => return Ok(None),
        };

        match reference_address(&entry, &self.schema, group_attribute) {
            None => {
                tracing::warn!(%dn, "Referenced entry has no address, skipping.");
                Ok(None)
            }
            Some(mail) => match mail.parse::<Address>() {
                Ok(address) => Ok(Some(address)),
                Err(error) => {
                    tracing::warn!(%dn, %mail, %error, "Referenced entry has an invalid address, skipping.");
                    Ok(None)
                }
            },
        }
    }

    fn resolve_all(
        &self,
        entry: &SearchEntry,
        attribute: &str,
        group_attribute: &str,
    ) -> Result<std::collections::BTreeSet<Address>, DirectoryError> {
        resolve_capped(
            all_values(entry, attribute),
            self.max_references,
            |dn| self.resolve_reference(dn, group_attribute),
        )
    }
}

impl DirectorySource for LdapDirectory {
    #[tracing::instrument(skip(self), ret, err)]
    fn lookup(
        &self,
        base: &str,
        attribute: &str,
        value: &str,
    ) -> Result<Option<GroupEntry>, DirectoryError> {
        let filter = group_filter(&self.schema.group_object_class, attribute, value);

        let entries = match self
            .ldap
            .search(
                base,
                Scope::Subtree,
                &filter,
                vec![
                    self.category_attribute.as_str(),
                    self.schema.member_attribute.as_str(),
                    self.schema.owner_attribute.as_str(),
                ],
                self.controls(),
            )
            .and_then(|result| result.success())
        {
            Ok((entries, _)) => entries,
            Err(LdapError::LdapResult { result }) if result.rc == NO_SUCH_OBJECT => return Ok(None),
            Err(error) => return Err(map_error(error)),
        };

        let mut entries = entries.into_iter().map(SearchEntry::construct);
        let entry = match entries.next() {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if entries.next().is_some() {
            tracing::warn!(%filter, location = %entry.dn, "Several groups match, using the first one.");
        }

        Ok(Some(GroupEntry {
            category: first_value(&entry, &self.category_attribute).map(str::to_string),
            members: self.resolve_all(&entry, &self.schema.member_attribute, attribute)?,
            owners: self.resolve_all(&entry, &self.schema.owner_attribute, attribute)?,
            location: entry.dn,
        }))
    }
}

/// Resolve the referenced DNs one by one, until `max` addresses are found.
fn resolve_capped<'a, E>(
    dns: impl IntoIterator<Item = &'a str>,
    max: usize,
    mut resolve: impl FnMut(&'a str) -> Result<Option<Address>, E>,
) -> Result<std::collections::BTreeSet<Address>, E> {
    let mut out = std::collections::BTreeSet::new();

    for dn in dns {
        if out.len() >= max {
            tracing::warn!(
                max,
                next = %dn,
                "Too many references in the group, the remaining ones are not read."
            );
            break;
        }
        if let Some(address) = resolve(dn)? {
            out.insert(address);
        }
    }

    Ok(out)
}

/// The address a referenced entry is known by.
fn reference_address<'a>(
    entry: &'a SearchEntry,
    schema: &'a LdapSchema,
    group_attribute: &'a str,
) -> Option<&'a str> {
    let is_group = all_values(entry, "objectClass")
        .any(|class| class.eq_ignore_ascii_case(&schema.group_object_class));

    if is_group {
        first_value(entry, group_attribute).or_else(|| first_value(entry, &schema.mail_attribute))
    } else {
        first_value(entry, &schema.mail_attribute)
    }
}

/// Build the filter matching a group by one of its attributes.
#[must_use]
pub fn group_filter(object_class: &str, attribute: &str, value: &str) -> String {
    format!(
        "(&(objectClass={})({attribute}={}))",
        ldap3::ldap_escape(object_class),
        ldap3::ldap_escape(value)
    )
}

fn authzid(id: &str) -> String {
    if id.starts_with("dn:") || id.starts_with("u:") {
        id.to_string()
    } else {
        format!("dn:{id}")
    }
}

fn map_error(error: LdapError) -> DirectoryError {
    match error {
        LdapError::LdapResult { result } => DirectoryError::Failure {
            code: result.rc,
            message: result.text,
        },
        otherwise => DirectoryError::unavailable(otherwise.to_string()),
    }
}

// attribute names are case insensitive, the server may answer with another case.
fn all_values<'a>(
    entry: &'a SearchEntry,
    attribute: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    entry
        .attrs
        .iter()
        .filter(move |(name, _)| name.eq_ignore_ascii_case(attribute))
        .flat_map(|(_, values)| values.iter().map(String::as_str))
}

fn first_value<'a>(entry: &'a SearchEntry, attribute: &'a str) -> Option<&'a str> {
    all_values(entry, attribute).next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(attrs: &[(&str, &[&str])]) -> SearchEntry {
        SearchEntry {
            dn: "cn=mygroup,ou=lists,dc=example,dc=org".to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| {
                    (
                        (*k).to_string(),
                        v.iter().map(|i| (*i).to_string()).collect(),
                    )
                })
                .collect(),
            bin_attrs: std::collections::HashMap::new(),
        }
    }

    #[test]
    fn filter() {
        assert_eq!(
            group_filter("groupOfNames", "mail", "mygroup@lists.example.org"),
            "(&(objectClass=groupOfNames)(mail=mygroup@lists.example.org))"
        );
    }

    #[test]
    fn filter_is_escaped() {
        assert_eq!(
            group_filter("groupOfNames", "mail", "*)(uid=*"),
            "(&(objectClass=groupOfNames)(mail=\\2a\\29\\28uid=\\2a))"
        );
    }

    #[test]
    fn proxy_identity() {
        assert_eq!(authzid("cn=admin,dc=example,dc=org"), "dn:cn=admin,dc=example,dc=org");
        assert_eq!(authzid("dn:cn=admin,dc=example,dc=org"), "dn:cn=admin,dc=example,dc=org");
        assert_eq!(authzid("u:admin"), "u:admin");
    }

    #[test]
    fn result_code_is_a_failure() {
        let error = map_error(LdapError::LdapResult {
            result: ldap3::LdapResult {
                rc: 50,
                matched: String::new(),
                text: "insufficient access".to_string(),
                refs: vec![],
                ctrls: vec![],
            },
        });

        assert!(matches!(
            error,
            DirectoryError::Failure { code: 50, ref message } if message == "insufficient access"
        ));
    }

    #[test]
    fn io_is_unavailable() {
        let error = map_error(LdapError::Io {
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"),
        });

        assert!(error.is_transient());
    }

    #[test]
    fn attributes_are_case_insensitive() {
        let entry = entry(&[
            ("businessCategory", &["internalList"]),
            ("Member", &["uid=u1,dc=example,dc=org", "uid=u2,dc=example,dc=org"]),
        ]);

        assert_eq!(first_value(&entry, "businesscategory"), Some("internalList"));
        assert_eq!(
            all_values(&entry, "member").collect::<Vec<_>>(),
            vec!["uid=u1,dc=example,dc=org", "uid=u2,dc=example,dc=org"]
        );
        assert_eq!(first_value(&entry, "owner"), None);
    }

    #[test]
    fn references_stop_at_the_cap() {
        let dns = (0..1000).map(|i| format!("uid=u{i},dc=example,dc=org")).collect::<Vec<_>>();
        let mut reads = 0;

        let addresses = resolve_capped(dns.iter().map(String::as_str), 10, |dn| {
            reads += 1;
            let uid = dn.trim_start_matches("uid=").split(',').next().unwrap_or_default();
            Ok::<_, DirectoryError>(Some(format!("{uid}@example.org").parse().unwrap()))
        })
        .unwrap();

        assert_eq!(addresses.len(), 10);
        assert_eq!(reads, 10);
    }

    #[test]
    fn references_without_address_do_not_count() {
        let dns = ["uid=ghost,dc=example,dc=org", "uid=u1,dc=example,dc=org"];

        let addresses = resolve_capped(dns, 1, |dn| {
            Ok::<_, DirectoryError>(
                dn.starts_with("uid=u1").then(|| "u1@example.org".parse().unwrap()),
            )
        })
        .unwrap();

        assert_eq!(
            addresses.into_iter().map(|i| i.to_string()).collect::<Vec<_>>(),
            vec!["u1@example.org".to_string()]
        );
    }

    #[test]
    fn reference_errors_are_returned() {
        let error = resolve_capped(["uid=u1,dc=example,dc=org"], 10, |_| {
            Err(DirectoryError::unavailable("timed out"))
        })
        .unwrap_err();

        assert!(error.is_transient());
    }

    #[test]
    fn nested_group_is_addressed_by_the_group_attribute() {
        let schema = LdapSchema::default();
        let group = entry(&[
            ("objectClass", &["top", "GroupOfNames"]),
            ("mail", &["staff@example.org"]),
            ("proxyAddresses", &["staff@lists.example.org"]),
        ]);
        let person = entry(&[
            ("objectClass", &["inetOrgPerson"]),
            ("mail", &["u1@example.org"]),
            ("proxyAddresses", &["u1@lists.example.org"]),
        ]);

        assert_eq!(
            reference_address(&group, &schema, "proxyAddresses"),
            Some("staff@lists.example.org")
        );
        assert_eq!(
            reference_address(&person, &schema, "proxyAddresses"),
            Some("u1@example.org")
        );
        assert_eq!(
            reference_address(&group, &schema, "mail"),
            Some("staff@example.org")
        );
    }

    #[test]
    fn schema_defaults() {
        let schema = serde_json::from_str::<LdapSchema>(r#"{ "group_object_class": "groupOfUniqueNames" }"#)
            .unwrap();

        assert_eq!(
            schema,
            LdapSchema {
                group_object_class: "groupOfUniqueNames".to_string(),
                ..LdapSchema::default()
            }
        );
    }

    #[test]
    fn unreachable_lookup_is_transient() {
        let directory = LdapDirectory::with_parameters(&LdapParameters {
            url: "ldap://127.0.0.1:1".to_string(),
            timeout: std::time::Duration::from_millis(200),
            connections: 1,
            tls: None,
            bind: None,
            schema: LdapSchema::default(),
        })
        .with_administrator(Some("cn=admin,dc=example,dc=org".to_string()))
        .with_max_references(10);

        let error = directory
            .lookup("ou=lists,dc=example,dc=org", "mail", "mygroup@lists.example.org")
            .unwrap_err();

        assert!(error.is_transient());
    }
}
