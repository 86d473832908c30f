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

use vsmtp_common::{directory::DirectoryError, Address};

/// Error returned to the pipeline when a mail could not be processed.
///
/// The mail is left untouched whenever an error is returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The directory could not be reached, the mail should be processed again later.
    #[error("the directory is unavailable while resolving `{address}`: `{source}`")]
    DirectoryUnavailable {
        /// the recipient being resolved.
        address: Address,
        /// underlying error.
        source: DirectoryError,
    },
    /// The directory refused the query.
    #[error("the directory failed to resolve `{address}`: `{source}`")]
    Directory {
        /// the recipient being resolved.
        address: Address,
        /// underlying error.
        source: DirectoryError,
    },
}

impl Error {
    pub(crate) fn from_directory(address: &Address, source: DirectoryError) -> Self {
        if source.is_transient() {
            Self::DirectoryUnavailable {
                address: address.clone(),
                source,
            }
        } else {
            Self::Directory {
                address: address.clone(),
                source,
            }
        }
    }

    /// Could the same mail be processed successfully later ?
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::DirectoryUnavailable { .. })
    }
}
