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

/// The configuration of the mailing lists expansion.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Version requirement of the program, checked when the configuration is read.
    pub version_requirement: semver::VersionReq,
    /// see [`field::FieldServer`]
    #[serde(default)]
    pub server: field::FieldServer,
    /// see [`field::FieldMailingList`]
    pub mailing_list: field::FieldMailingList,
    /// see [`field::FieldDirectory`]
    pub directory: field::FieldDirectory,
    /// see [`field::FieldLogs`]
    #[serde(default)]
    pub logs: field::FieldLogs,
}

/// The inner field of the configuration.
#[allow(clippy::module_name_repetitions)]
pub mod field {
    use crate::{category::Category, classifier::Predicate};
    use vsmtp_common::state::ProcessingState;

    /// The domains served by this server.
    #[derive(Debug, Default, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
    #[serde(deny_unknown_fields)]
    pub struct FieldServer {
        /// Domains whose addresses are local, compared ignoring the case.
        #[serde(default)]
        pub domains: std::collections::BTreeSet<String>,
    }

    /// How the mailing lists are recognized, looked up and authorized.
    #[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
    #[serde(deny_unknown_fields)]
    pub struct FieldMailingList {
        /// Root of the directory under which the groups are searched.
        #[serde(alias = "baseDN")]
        pub base_dn: String,
        /// State of the pipeline the rejected recipients are sent to.
        #[serde(
            alias = "rejectedSenderProcessor",
            default = "FieldMailingList::default_rejected_sender_processor"
        )]
        pub rejected_sender_processor: ProcessingState,
        /// see [`Predicate`]
        #[serde(
            alias = "mailingListPredicate",
            default = "FieldMailingList::default_mailing_list_predicate"
        )]
        pub mailing_list_predicate: Predicate,
        /// Attribute of the groups matched against the recipient address.
        #[serde(
            alias = "mailAttributeForGroups",
            default = "FieldMailingList::default_mail_attribute_for_groups"
        )]
        pub mail_attribute_for_groups: String,
        /// Overrides `category_attribute` when set.
        #[serde(alias = "businessCategoryExtractAttribute", default)]
        pub business_category_extract_attribute: Option<String>,
        /// Identity the directory queries are run on behalf of.
        #[serde(alias = "administratorId", default)]
        pub administrator_id: Option<String>,
        /// First label of the domain of the list addresses.
        #[serde(default = "FieldMailingList::default_list_domain_prefix")]
        pub list_domain_prefix: String,
        /// Attribute holding the category of the groups.
        #[serde(default = "FieldMailingList::default_category_attribute")]
        pub category_attribute: String,
        /// Maximum number of nested groups followed.
        #[serde(default = "FieldMailingList::default_max_depth")]
        pub max_depth: usize,
        /// Maximum number of addresses a list expands to.
        #[serde(default = "FieldMailingList::default_max_members")]
        pub max_members: usize,
        /// Policy of the lists whose category is not recognized,
        /// every sender is rejected if not set.
        #[serde(default)]
        pub unrecognized_category: Option<Category>,
    }

    impl FieldMailingList {
        pub(crate) fn default_rejected_sender_processor() -> ProcessingState {
            ProcessingState::Custom("rejectedSender".to_string())
        }

        pub(crate) const fn default_mailing_list_predicate() -> Predicate {
            Predicate::ListsPrefix
        }

        pub(crate) fn default_mail_attribute_for_groups() -> String {
            "mail".to_string()
        }

        pub(crate) fn default_list_domain_prefix() -> String {
            "lists".to_string()
        }

        pub(crate) fn default_category_attribute() -> String {
            "businessCategory".to_string()
        }

        pub(crate) const fn default_max_depth() -> usize {
            10
        }

        pub(crate) const fn default_max_members() -> usize {
            10_000
        }

        /// The attribute the category of the groups is read from.
        #[must_use]
        pub fn effective_category_attribute(&self) -> &str {
            self.business_category_extract_attribute
                .as_deref()
                .unwrap_or(&self.category_attribute)
        }
    }

    /// The directory the groups are read from.
    #[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
    #[serde(deny_unknown_fields, tag = "type", rename_all = "lowercase")]
    pub enum FieldDirectory {
        /// A ldap server.
        Ldap(vsmtp_plugin_ldap::LdapParameters),
        /// A json file, see [`crate::directory::MemoryDirectory`].
        Static {
            /// Path of the file.
            path: std::path::PathBuf,
        },
    }

    /// The logs of the program.
    #[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
    #[serde(deny_unknown_fields)]
    pub struct FieldLogs {
        /// Customize the log level of the different part of the program.
        ///
        /// See <https://docs.rs/tracing-subscriber/0.3.15/tracing_subscriber/filter/struct.EnvFilter.html>
        #[serde(
            default = "FieldLogs::default_level",
            serialize_with = "crate::parser::tracing_directive::serialize",
            deserialize_with = "crate::parser::tracing_directive::deserialize"
        )]
        pub level: Vec<tracing_subscriber::filter::Directive>,
        /// File the logs are written to.
        #[serde(default)]
        pub filepath: Option<std::path::PathBuf>,
    }

    impl Default for FieldLogs {
        fn default() -> Self {
            Self {
                level: Self::default_level(),
                filepath: None,
            }
        }
    }

    impl FieldLogs {
        pub(crate) fn default_level() -> Vec<tracing_subscriber::filter::Directive> {
            vec![tracing::Level::WARN.into()]
        }
    }
}

impl Config {
    /// Parse a [`Config`] with [TOML] format
    ///
    /// # Errors
    ///
    /// * data is not a valid [TOML]
    /// * one field is unknown
    /// * the version requirement are not fulfilled
    /// * a mandatory field is not provided (no default value)
    /// * see [`Config::ensure`]
    ///
    /// [TOML]: https://github.com/toml-lang/toml
    pub fn from_toml(input: &str) -> anyhow::Result<Self> {
        #[derive(serde::Deserialize)]
        struct VersionRequirement {
            version_requirement: semver::VersionReq,
        }

        let version_requirement = toml::from_str::<VersionRequirement>(input)?.version_requirement;
        let pkg_version = semver::Version::parse(env!("CARGO_PKG_VERSION"))?;

        if !version_requirement.matches(&pkg_version) {
            anyhow::bail!(
                "Version requirement not fulfilled: expected '{version_requirement}' but got '{pkg_version}'"
            );
        }

        toml::from_str::<Self>(input)
            .map(Self::ensure)
            .map_err(anyhow::Error::new)?
    }

    /// Check the consistency of the configuration, and normalize the domains.
    ///
    /// # Errors
    ///
    /// * a limit is set to 0.
    /// * the list label is empty or contains a dot.
    /// * the rejected recipients would be processed again from the root.
    /// * the rejected sender processor is empty.
    /// * the lists are any local addresses but no domain is served.
    /// * the fallback of the unrecognized category is itself unrecognized.
    pub fn ensure(mut config: Self) -> anyhow::Result<Self> {
        let mailing_list = &config.mailing_list;

        anyhow::ensure!(
            mailing_list.max_depth != 0 && mailing_list.max_members != 0,
            "`max_depth` and `max_members` cannot be set to 0"
        );
        anyhow::ensure!(
            !mailing_list.list_domain_prefix.is_empty()
                && !mailing_list.list_domain_prefix.contains('.'),
            "`list_domain_prefix` must be a single domain label, got '{}'",
            mailing_list.list_domain_prefix
        );
        anyhow::ensure!(
            mailing_list.rejected_sender_processor
                != vsmtp_common::state::ProcessingState::Root,
            "`rejected_sender_processor` cannot be the root state"
        );
        anyhow::ensure!(
            !mailing_list.rejected_sender_processor.to_string().is_empty(),
            "`rejected_sender_processor` cannot be empty"
        );
        anyhow::ensure!(
            mailing_list.mailing_list_predicate != crate::classifier::Predicate::AnyLocal
                || !config.server.domains.is_empty(),
            "the `any-local` predicate requires at least one domain in `server.domains`"
        );
        anyhow::ensure!(
            mailing_list.unrecognized_category != Some(crate::category::Category::Unrecognized),
            "`unrecognized_category` cannot be `unrecognized`"
        );

        config.server.domains = std::mem::take(&mut config.server.domains)
            .into_iter()
            .map(|domain| domain.trim_end_matches('.').to_ascii_lowercase())
            .collect();

        if config.server.domains.is_empty() {
            tracing::warn!("No local domain configured, no sender will be considered local.");
        }

        Ok(config)
    }
}
