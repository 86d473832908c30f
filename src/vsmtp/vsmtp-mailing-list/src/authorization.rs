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

use crate::category::Category;
use vsmtp_common::Address;

/// Outcome of the resolution of a list address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionResult {
    /// The sender can post, the mail goes to these addresses.
    Resolved(std::collections::BTreeSet<Address>),
    /// The sender cannot post to these addresses.
    Rejected(std::collections::BTreeSet<Address>),
}

/// Lazily expanded members and owners of a list.
pub trait ListMembership {
    /// Error produced by the expansion.
    type Error;

    /// The flattened members of the list.
    ///
    /// # Errors
    ///
    /// * the expansion failed.
    fn members(&mut self) -> Result<&std::collections::BTreeSet<Address>, Self::Error>;

    /// The flattened owners of the list.
    ///
    /// # Errors
    ///
    /// * the expansion failed.
    fn owners(&mut self) -> Result<&std::collections::BTreeSet<Address>, Self::Error>;
}

/// What is known about a posting to a list.
#[derive(Debug, Clone, Copy)]
pub struct Posting<'a> {
    /// the list address.
    pub list: &'a Address,
    /// the sender of the mail, `None` for the null reverse path.
    pub sender: Option<&'a Address>,
    /// is the domain of the sender served locally ?
    pub sender_is_local: bool,
    /// domain on behalf of which the list is served.
    pub serving_domain: &'a str,
}

/// Decide if a sender can post to a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthorizationEngine {
    unrecognized: Option<Category>,
}

impl AuthorizationEngine {
    /// Lists with an unrecognized category follow the `unrecognized` policy,
    /// or reject every sender if `None`.
    #[must_use]
    pub const fn new(unrecognized: Option<Category>) -> Self {
        Self { unrecognized }
    }

    /// The policy actually applied for `category`, `None` if every sender is rejected.
    #[must_use]
    pub fn effective(&self, category: Category) -> Option<Category> {
        match category {
            Category::Unrecognized => self
                .unrecognized
                .filter(|fallback| *fallback != Category::Unrecognized),
            otherwise => Some(otherwise),
        }
    }

    /// Can the sender of `posting` post to a list of this `category` ?
    ///
    /// The members and owners are expanded only if the policy requires them.
    ///
    /// # Errors
    ///
    /// * see [`ListMembership`]
    pub fn is_allowed<M: ListMembership>(
        &self,
        category: Category,
        posting: &Posting<'_>,
        membership: &mut M,
    ) -> Result<bool, M::Error> {
        let Some(category) = self.effective(category) else {
            return Ok(false);
        };
        let Some(sender) = posting.sender else {
            return Ok(category == Category::Open);
        };

        Ok(match category {
            Category::Open => true,
            Category::Internal | Category::AnyLocal => posting.sender_is_local,
            Category::DomainRestricted => sender.is_in_domain(posting.serving_domain),
            Category::MemberRestricted => membership.members()?.contains(sender),
            Category::OwnerRestricted => {
                let owners = membership.owners()?;
                !owners.is_empty() && owners.contains(sender)
            }
            Category::Unrecognized => false,
        })
    }

    /// Resolve the list of `posting` to its members, or reject it.
    ///
    /// # Errors
    ///
    /// * see [`ListMembership`]
    pub fn authorize<M: ListMembership>(
        &self,
        category: Category,
        posting: &Posting<'_>,
        membership: &mut M,
    ) -> Result<ResolutionResult, M::Error> {
        if self.is_allowed(category, posting, membership)? {
            Ok(ResolutionResult::Resolved(membership.members()?.clone()))
        } else {
            Ok(ResolutionResult::Rejected(
                std::iter::once(posting.list.clone()).collect(),
            ))
        }
    }
}
