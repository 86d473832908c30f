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

use crate::{directory::GroupResolver, loop_guard::LoopGuard};
use vsmtp_common::{
    directory::{DirectoryError, GroupEntry},
    Address,
};

/// Which attribute of a group is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// the members of the list.
    Members,
    /// the owners of the list.
    Owners,
}

impl Role {
    fn of(self, entry: &GroupEntry) -> &std::collections::BTreeSet<Address> {
        match self {
            Self::Members => &entry.members,
            Self::Owners => &entry.owners,
        }
    }
}

/// Flatten the members or owners of a group, following the nested groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipExpander {
    max_depth: usize,
    max_members: usize,
}

#[derive(Default)]
struct Walk {
    out: std::collections::BTreeSet<Address>,
    too_deep: usize,
    truncated: bool,
}

impl MembershipExpander {
    /// Nested groups deeper than `max_depth` and the addresses beyond the
    /// first `max_members` are dropped.
    #[must_use]
    pub const fn new(max_depth: usize, max_members: usize) -> Self {
        Self {
            max_depth,
            max_members,
        }
    }

    /// Expand the `role` of `entry`.
    ///
    /// The nested groups contribute their members whatever the role, they are
    /// recorded in `guard` and the ones already recorded are skipped.
    ///
    /// # Errors
    ///
    /// * a nested group could not be looked up.
    #[tracing::instrument(level = "debug", skip_all, fields(location = %entry.location, ?role))]
    pub fn expand(
        &self,
        resolver: &mut GroupResolver<'_>,
        entry: &GroupEntry,
        role: Role,
        guard: &mut LoopGuard,
    ) -> Result<std::collections::BTreeSet<Address>, DirectoryError> {
        let mut walk = Walk::default();
        self.walk(resolver, role.of(entry), 1, guard, &mut walk)?;

        if walk.too_deep != 0 {
            tracing::warn!(
                max_depth = self.max_depth,
                dropped = walk.too_deep,
                "Groups are nested too deeply, the deepest ones are dropped."
            );
        }
        if walk.truncated {
            tracing::warn!(
                max_members = self.max_members,
                "Too many addresses, the expansion is truncated."
            );
        }

        Ok(walk.out)
    }

    fn walk(
        &self,
        resolver: &mut GroupResolver<'_>,
        references: &std::collections::BTreeSet<Address>,
        depth: usize,
        guard: &mut LoopGuard,
        walk: &mut Walk,
    ) -> Result<(), DirectoryError> {
        for address in references {
            if walk.truncated {
                return Ok(());
            }

            if guard.was_visited(address) {
                tracing::debug!(%address, "Group already expanded, loop cut.");
                continue;
            }

            if let Some(group) = resolver.resolve(address)? {
                if depth >= self.max_depth {
                    walk.too_deep += 1;
                    continue;
                }
                guard.record_visited(address.clone());
                self.walk(resolver, &group.members, depth + 1, guard, walk)?;
            } else if walk.out.len() < self.max_members {
                walk.out.insert(address.clone());
            } else if !walk.out.contains(address) {
                walk.truncated = true;
            }
        }

        Ok(())
    }
}
