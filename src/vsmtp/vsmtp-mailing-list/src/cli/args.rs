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

use vsmtp_common::Address;

///
#[non_exhaustive]
#[derive(clap::Parser)]
#[cfg_attr(test, derive(Debug, PartialEq, Eq))]
#[clap(about, author)]
pub struct Args {
    /// Print the version and exit.
    #[clap(short, long, action)]
    pub version: bool,

    /// Path of the configuration file (toml format)
    #[clap(short, long, action, default_value = "/etc/vsmtp/vlist.toml")]
    pub config: String,

    /// Print the logs on the standard error
    #[clap(short, long, action)]
    pub stderr: bool,

    ///
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

///
#[non_exhaustive]
#[derive(clap::Subcommand)]
#[cfg_attr(test, derive(Debug, PartialEq, Eq))]
pub enum Commands {
    /// Expand the mailing lists of a mail (json) and print the resulting mails
    Run {
        /// Path of the mail
        #[clap(value_parser)]
        mail: std::path::PathBuf,
    },
    /// Show the loaded config (as serialized json format)
    ConfigShow,
    /// Show what the directory knows about a list
    Lookup {
        /// Address of the list
        #[clap(value_parser)]
        address: Address,
    },
}
