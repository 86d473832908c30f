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

use anyhow::Context;
use vsmtp_common::{
    directory::{DirectoryError, DirectorySource, GroupEntry},
    Address,
};

/// A directory held in memory, indexed by the address of the groups.
///
/// Can be read from a json file of the form:
///
/// ```json
/// {
///   "groups": {
///     "mygroup@lists.example.org": {
///       "location": "cn=mygroup,ou=lists,dc=example,dc=org",
///       "category": "internal",
///       "members": ["u1@example.org", "u2@example.org"],
///       "owners": []
///     }
///   }
/// }
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryDirectory {
    #[serde(default)]
    groups: std::collections::BTreeMap<Address, GroupEntry>,
}

impl MemoryDirectory {
    /// Add a group to the directory, replacing the one with the same address.
    #[must_use]
    pub fn with_group(mut self, address: Address, entry: GroupEntry) -> Self {
        self.groups.insert(address, entry);
        self
    }

    /// Read the directory from a json file.
    ///
    /// # Errors
    ///
    /// * the file cannot be read.
    /// * the content is not a valid directory.
    pub fn from_json_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read file '{}'", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Cannot deserialize directory '{}'", path.display()))
    }
}

/// Is the entry at `location` in the subtree of `base` ?
fn is_under(location: &str, base: &str) -> bool {
    let (location, base) = (location.to_ascii_lowercase(), base.to_ascii_lowercase());

    base.is_empty()
        || location == base
        || location
            .strip_suffix(&base)
            .map_or(false, |rest| rest.ends_with(','))
}

impl DirectorySource for MemoryDirectory {
    fn lookup(
        &self,
        base: &str,
        _attribute: &str,
        value: &str,
    ) -> Result<Option<GroupEntry>, DirectoryError> {
        let Ok(address) = value.parse::<Address>() else {
            return Ok(None);
        };

        Ok(self
            .groups
            .get(&address)
            .filter(|entry| is_under(&entry.location, base))
            .cloned())
    }
}
