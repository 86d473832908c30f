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

use crate::Address;

/// A group entry of the directory, denoting a mailing list.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupEntry {
    /// location of the entry in the directory (its DN for LDAP).
    pub location: String,
    /// raw value of the category marker attribute, if any.
    #[serde(default)]
    pub category: Option<String>,
    /// addresses referenced by the member attribute(s).
    #[serde(default)]
    pub members: std::collections::BTreeSet<Address>,
    /// addresses referenced by the owner attribute(s).
    #[serde(default)]
    pub owners: std::collections::BTreeSet<Address>,
}

/// Error produced by a directory lookup.
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The directory could not be reached in time (connection, timeout, pool exhausted).
    #[error("directory is unavailable: `{source}`")]
    Unavailable {
        /// underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The directory answered with an error.
    #[error("directory returned an error (code {code}): {message}")]
    Failure {
        /// result code returned by the directory.
        code: u32,
        /// diagnostic message returned by the directory.
        message: String,
    },
}

impl DirectoryError {
    /// Create a [`DirectoryError::Unavailable`] from any error.
    pub fn unavailable(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Unavailable {
            source: source.into(),
        }
    }

    /// Is the error transient, meaning that the same lookup could succeed later ?
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// A directory in which mailing lists are looked up.
///
/// Implementations perform blocking calls and must bound them in time,
/// reporting any timeout as [`DirectoryError::Unavailable`].
#[allow(clippy::module_name_repetitions)]
pub trait DirectorySource: std::fmt::Debug + Send + Sync {
    /// Search under `base` for the group entry whose `attribute` equals `value`.
    ///
    /// # Errors
    ///
    /// * the directory is unavailable.
    /// * the directory answered with an error.
    fn lookup(
        &self,
        base: &str,
        attribute: &str,
        value: &str,
    ) -> Result<Option<GroupEntry>, DirectoryError>;
}

impl<T: DirectorySource + ?Sized> DirectorySource for std::sync::Arc<T> {
    fn lookup(
        &self,
        base: &str,
        attribute: &str,
        value: &str,
    ) -> Result<Option<GroupEntry>, DirectoryError> {
        (**self).lookup(base, attribute, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr;
    use pretty_assertions::assert_eq;

    #[test]
    fn group_entry_from_json() {
        let entry = serde_json::from_str::<GroupEntry>(
            r#"{
                "location": "cn=mygroup,ou=lists,dc=example,dc=org",
                "category": "internalList",
                "members": ["u2@example.org", "u1@example.org", "u1@EXAMPLE.org"]
            }"#,
        )
        .unwrap();

        assert_eq!(entry.category.as_deref(), Some("internalList"));
        assert_eq!(
            entry.members.into_iter().collect::<Vec<_>>(),
            vec![addr!("u1@example.org"), addr!("u2@example.org")]
        );
        assert!(entry.owners.is_empty());
    }

    #[test]
    fn transient() {
        assert!(DirectoryError::unavailable("timed out").is_transient());
        assert!(!DirectoryError::Failure {
            code: 50,
            message: "insufficient access rights".to_string()
        }
        .is_transient());
    }
}
