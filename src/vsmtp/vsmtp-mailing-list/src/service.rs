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
    authorization::{AuthorizationEngine, ListMembership, Posting, ResolutionResult},
    category::Category,
    classifier::AddressClassifier,
    config::{field::FieldDirectory, Config},
    directory::{GroupResolver, MemoryDirectory},
    expand::{MembershipExpander, Role},
    loop_guard::LoopGuard,
    rewrite::{RecipientOutcome, RecipientRewriter},
    Error,
};
use vsmtp_common::{
    directory::{DirectoryError, DirectorySource, GroupEntry},
    mail_context::MailContext,
    Address,
};

/// Expand the mailing lists of the mails, see [`MailingListService::service`].
///
/// The service holds no state about the mails, it can be shared between
/// workers and called concurrently for distinct mails.
pub struct MailingListService {
    directory: std::sync::Arc<dyn DirectorySource>,
    classifier: AddressClassifier,
    expander: MembershipExpander,
    engine: AuthorizationEngine,
    rewriter: RecipientRewriter,
    base_dn: String,
    attribute: String,
}

impl std::fmt::Debug for MailingListService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailingListService")
            .field("directory", &self.directory)
            .field("classifier", &self.classifier)
            .field("base_dn", &self.base_dn)
            .field("attribute", &self.attribute)
            .finish_non_exhaustive()
    }
}

/// What the directory knows about a list, see [`MailingListService::describe`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ListReport {
    /// address of the list.
    pub address: Address,
    /// location of the group in the directory.
    pub location: String,
    /// raw value of the category marker.
    pub category_raw: Option<String>,
    /// category read from the marker.
    pub category: Category,
    /// policy applied, `None` if every sender is rejected.
    pub policy: Option<Category>,
    /// flattened members.
    pub members: std::collections::BTreeSet<Address>,
    /// flattened owners.
    pub owners: std::collections::BTreeSet<Address>,
}

/// Members and owners of a list, expanded on demand.
struct LazyMembership<'s, 'r> {
    expander: &'s MembershipExpander,
    resolver: &'s mut GroupResolver<'r>,
    entry: &'s GroupEntry,
    guard: &'s LoopGuard,
    members: Option<(std::collections::BTreeSet<Address>, LoopGuard)>,
    owners: Option<std::collections::BTreeSet<Address>>,
}

impl<'s, 'r> LazyMembership<'s, 'r> {
    fn new(
        expander: &'s MembershipExpander,
        resolver: &'s mut GroupResolver<'r>,
        entry: &'s GroupEntry,
        guard: &'s LoopGuard,
    ) -> Self {
        Self {
            expander,
            resolver,
            entry,
            guard,
            members: None,
            owners: None,
        }
    }

    /// The lists recorded while expanding the members.
    fn into_visited(self) -> LoopGuard {
        self.members
            .map_or_else(|| self.guard.clone(), |(_, visited)| visited)
    }
}

impl ListMembership for LazyMembership<'_, '_> {
    type Error = DirectoryError;

    fn members(&mut self) -> Result<&std::collections::BTreeSet<Address>, Self::Error> {
        let members = match self.members.take() {
            Some(members) => members,
            None => {
                let mut visited = self.guard.clone();
                let members =
                    self.expander
                        .expand(self.resolver, self.entry, Role::Members, &mut visited)?;
                (members, visited)
            }
        };
        Ok(&self.members.insert(members).0)
    }

    fn owners(&mut self) -> Result<&std::collections::BTreeSet<Address>, Self::Error> {
        let owners = match self.owners.take() {
            Some(owners) => owners,
            None => {
                // owners expansion never records anything for the mail.
                let mut scratch = self.guard.clone();
                self.expander
                    .expand(self.resolver, self.entry, Role::Owners, &mut scratch)?
            }
        };
        Ok(self.owners.insert(owners))
    }
}

impl MailingListService {
    /// Create the service reading the groups from `directory`.
    #[must_use]
    pub fn new(config: &Config, directory: std::sync::Arc<dyn DirectorySource>) -> Self {
        let mailing_list = &config.mailing_list;

        Self {
            directory,
            classifier: AddressClassifier::new(
                mailing_list.mailing_list_predicate,
                &mailing_list.list_domain_prefix,
                &config.server.domains,
            ),
            expander: MembershipExpander::new(mailing_list.max_depth, mailing_list.max_members),
            engine: AuthorizationEngine::new(mailing_list.unrecognized_category),
            rewriter: RecipientRewriter::new(mailing_list.rejected_sender_processor.clone()),
            base_dn: mailing_list.base_dn.clone(),
            attribute: mailing_list.mail_attribute_for_groups.clone(),
        }
    }

    /// Create the service with the directory of the configuration.
    ///
    /// # Errors
    ///
    /// * the static directory cannot be read.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let directory: std::sync::Arc<dyn DirectorySource> = match &config.directory {
            FieldDirectory::Ldap(parameters) => std::sync::Arc::new(
                vsmtp_plugin_ldap::LdapDirectory::with_parameters(parameters)
                    .with_category_attribute(
                        config.mailing_list.effective_category_attribute(),
                    )
                    .with_administrator(config.mailing_list.administrator_id.clone())
                    .with_max_references(config.mailing_list.max_members),
            ),
            FieldDirectory::Static { path } => {
                std::sync::Arc::new(MemoryDirectory::from_json_file(path)?)
            }
        };

        Ok(Self::new(config, directory))
    }

    /// Expand the mailing lists among the recipients of `mail`.
    ///
    /// Every recipient is resolved before the mail is modified. The lists the
    /// sender can post to are replaced by their members, the others are moved
    /// to the returned copy of the mail, handled by the rejected sender state.
    ///
    /// # Errors
    ///
    /// * the directory failed, the mail is left untouched.
    #[tracing::instrument(name = "mailing-list", skip_all, fields(message_id = %mail.message_id))]
    pub fn service(&self, mail: &mut MailContext) -> Result<Option<MailContext>, Error> {
        let guard = LoopGuard::load(mail);
        let mut recorded = guard.clone();
        let mut resolver = GroupResolver::new(
            &*self.directory,
            &self.classifier,
            &self.base_dn,
            &self.attribute,
        );

        let sender = mail.reverse_path.as_ref();
        let outcomes = mail
            .rcpt
            .iter()
            .map(|rcpt| {
                self.resolve_recipient(&rcpt.address, sender, &guard, &mut resolver, &mut recorded)
                    .map_err(|error| Error::from_directory(&rcpt.address, error))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if outcomes
            .iter()
            .all(|outcome| *outcome == RecipientOutcome::PassThrough)
        {
            return Ok(None);
        }

        let rejected = self.rewriter.rewrite(mail, outcomes);
        recorded.store(mail);

        Ok(rejected)
    }

    fn resolve_recipient(
        &self,
        address: &Address,
        sender: Option<&Address>,
        guard: &LoopGuard,
        resolver: &mut GroupResolver<'_>,
        recorded: &mut LoopGuard,
    ) -> Result<RecipientOutcome, DirectoryError> {
        if !self.classifier.is_candidate(address) {
            return Ok(RecipientOutcome::PassThrough);
        }

        if guard.was_visited(address) {
            tracing::info!(list = %address, "List already expanded for this mail, loop cut.");
            return Ok(RecipientOutcome::Dropped);
        }

        let Some(entry) = resolver.resolve(address)? else {
            tracing::debug!(%address, "Not a mailing list.");
            return Ok(RecipientOutcome::PassThrough);
        };

        let category = self.classify(address, &entry);

        let mut list_guard = guard.clone();
        list_guard.record_visited(address.clone());

        let posting = Posting {
            list: address,
            sender,
            sender_is_local: sender.map_or(false, |sender| self.classifier.is_local(sender)),
            serving_domain: self.classifier.serving_domain(address),
        };

        let mut membership = LazyMembership::new(&self.expander, resolver, &entry, &list_guard);

        match self.engine.authorize(category, &posting, &mut membership)? {
            ResolutionResult::Resolved(members) => {
                tracing::info!(
                    list = %address,
                    %category,
                    members = members.len(),
                    "Mailing list expanded."
                );
                recorded.extend(membership.into_visited());
                Ok(RecipientOutcome::Expanded(members))
            }
            ResolutionResult::Rejected(_) => {
                tracing::info!(
                    list = %address,
                    %category,
                    sender = ?sender.map(Address::full),
                    "Sender is not allowed to post to the list."
                );
                Ok(RecipientOutcome::Rejected)
            }
        }
    }

    fn classify(&self, address: &Address, entry: &GroupEntry) -> Category {
        let category = Category::classify(entry.category.as_deref());

        if category == Category::Unrecognized {
            tracing::warn!(
                list = %address,
                location = %entry.location,
                raw = ?entry.category,
                fallback = ?self.engine.effective(category),
                "Category of the list is not recognized."
            );
        }

        category
    }

    /// Resolve a list without posting to it.
    ///
    /// Returns `None` if the address is not a candidate or not a group.
    ///
    /// # Errors
    ///
    /// * the directory failed.
    pub fn describe(&self, address: &Address) -> Result<Option<ListReport>, Error> {
        let mut resolver = GroupResolver::new(
            &*self.directory,
            &self.classifier,
            &self.base_dn,
            &self.attribute,
        );

        let entry = match resolver.resolve(address) {
            Ok(Some(entry)) => entry,
            Ok(None) => return Ok(None),
            Err(error) => return Err(Error::from_directory(address, error)),
        };

        let category = self.classify(address, &entry);

        let mut guard = LoopGuard::default();
        guard.record_visited(address.clone());

        let mut membership = LazyMembership::new(&self.expander, &mut resolver, &entry, &guard);
        let members = membership
            .members()
            .map_err(|error| Error::from_directory(address, error))?
            .clone();
        let owners = membership
            .owners()
            .map_err(|error| Error::from_directory(address, error))?
            .clone();

        Ok(Some(ListReport {
            address: address.clone(),
            location: entry.location.clone(),
            category_raw: entry.category.clone(),
            category,
            policy: self.engine.effective(category),
            members,
            owners,
        }))
    }
}
