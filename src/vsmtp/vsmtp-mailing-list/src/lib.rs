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

//! Directory backed mailing lists for vSMTP.
//!
//! The recipients of a mail that denote a group of the directory are replaced
//! by the members of the group, if the sender is allowed to post to it.
//!
//! * [`classifier`] screens the recipients that may be lists.
//! * [`directory`] looks the lists up, with the [`DirectorySource`] of the configuration.
//! * [`category`] reads the posting policy of a list.
//! * [`expand`] flattens the members and owners of a list, following nested groups.
//! * [`loop_guard`] records the lists already expanded for a mail.
//! * [`authorization`] decides if the sender can post.
//! * [`rewrite`] replaces the lists by their members, or splits the mail.
//!
//! [`MailingListService`] runs all of them once per mail. Lookups are blocking,
//! async callers should run the service in `tokio::task::spawn_blocking`.
//!
//! [`DirectorySource`]: vsmtp_common::directory::DirectorySource

#![doc(html_no_source)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]
//
#![warn(rust_2018_idioms)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
//
#![allow(clippy::multiple_crate_versions)]

#[cfg(test)]
mod tests;

mod parser {
    pub mod tracing_directive;
}

/// Command line of `vlist`.
pub mod cli {
    /// Arguments of the command line.
    pub mod args;
    mod command;
}

/// Posting rules of the lists.
pub mod authorization;
/// Posting policies.
pub mod category;
/// Recognition of the list addresses.
pub mod classifier;
/// Configuration of the expansion.
pub mod config;
/// Lookup of the lists.
pub mod directory;
/// Expansion of the members and owners.
pub mod expand;
/// Lists already expanded for a mail.
pub mod loop_guard;
/// Rewriting of the recipients.
pub mod rewrite;
/// Initialization of the logs of `vlist`.
pub mod tracing_subscriber;

mod error;
mod service;

pub use config::Config;
pub use error::Error;
pub use service::{ListReport, MailingListService};
