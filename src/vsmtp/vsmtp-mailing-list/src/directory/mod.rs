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

use crate::classifier::AddressClassifier;
use vsmtp_common::{
    directory::{DirectoryError, DirectorySource, GroupEntry},
    Address,
};

mod memory;

pub use memory::MemoryDirectory;

/// Resolve the candidate list addresses of one mail.
///
/// Only the candidates of the classifier are looked up. Answers are memoized
/// for the lifetime of the resolver, which must not outlive the mail it has
/// been created for.
pub struct GroupResolver<'a> {
    directory: &'a dyn DirectorySource,
    classifier: &'a AddressClassifier,
    base: &'a str,
    attribute: &'a str,
    memo: std::collections::HashMap<Address, Option<std::rc::Rc<GroupEntry>>>,
}

impl<'a> GroupResolver<'a> {
    /// Search the groups under `base` by their `attribute`.
    #[must_use]
    pub fn new(
        directory: &'a dyn DirectorySource,
        classifier: &'a AddressClassifier,
        base: &'a str,
        attribute: &'a str,
    ) -> Self {
        Self {
            directory,
            classifier,
            base,
            attribute,
            memo: std::collections::HashMap::new(),
        }
    }

    /// Get the group denoted by `address`, `None` if it is not a group.
    ///
    /// # Errors
    ///
    /// * see [`DirectorySource::lookup`]
    pub fn resolve(
        &mut self,
        address: &Address,
    ) -> Result<Option<std::rc::Rc<GroupEntry>>, DirectoryError> {
        if !self.classifier.is_candidate(address) {
            return Ok(None);
        }

        if let Some(entry) = self.memo.get(address) {
            return Ok(entry.clone());
        }

        let entry = self
            .directory
            .lookup(self.base, self.attribute, address.full())?
            .map(std::rc::Rc::new);

        tracing::trace!(
            %address,
            location = ?entry.as_ref().map(|entry| entry.location.as_str()),
            "Group looked up."
        );

        self.memo.insert(address.clone(), entry.clone());
        Ok(entry)
    }
}

impl std::fmt::Debug for GroupResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupResolver")
            .field("base", &self.base)
            .field("attribute", &self.attribute)
            .field("memoized", &self.memo.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{classifier, group, CountingDirectory};
    use vsmtp_common::addr;

    #[test]
    fn memoized() {
        let directory = CountingDirectory::new(MemoryDirectory::default().with_group(
            addr!("mygroup@lists.example.org"),
            group("internal", &["u1@example.org"], &[]),
        ));
        let classifier = classifier();
        let mut resolver = GroupResolver::new(&directory, &classifier, "dc=example,dc=org", "mail");

        for _ in 0..3 {
            assert!(resolver
                .resolve(&addr!("mygroup@lists.example.org"))
                .unwrap()
                .is_some());
            assert!(resolver
                .resolve(&addr!("nobody@lists.example.org"))
                .unwrap()
                .is_none());
            assert!(resolver
                .resolve(&addr!("u1@example.org"))
                .unwrap()
                .is_none());
        }

        assert_eq!(directory.lookups(), 2);
    }

    #[test]
    fn error_is_not_memoized() {
        let directory = CountingDirectory::unavailable();
        let classifier = classifier();
        let mut resolver = GroupResolver::new(&directory, &classifier, "dc=example,dc=org", "mail");

        assert!(resolver.resolve(&addr!("mygroup@lists.example.org")).is_err());
        assert!(resolver.resolve(&addr!("mygroup@lists.example.org")).is_err());
        assert_eq!(directory.lookups(), 2);
    }
}
