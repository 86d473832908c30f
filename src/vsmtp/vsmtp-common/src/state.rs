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

/// Name of the processing state (processor) a mail is handled by.
///
/// The pipeline owns the states, the mail only carries the name of the
/// one it must be processed by next.
#[derive(
    Debug,
    Default,
    Clone,
    PartialEq,
    Eq,
    Hash,
    strum::EnumString,
    serde_with::SerializeDisplay,
    serde_with::DeserializeFromStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum ProcessingState {
    /// Entry point of the pipeline.
    #[default]
    Root,
    /// The mail has no recipient left, nothing will be delivered.
    Ghost,
    /// A fatal error happened while processing the mail.
    Error,
    /// A user defined processor.
    #[strum(default)]
    Custom(String),
}

// a user defined processor is displayed by its own name.
impl std::fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Root => "root",
            Self::Ghost => "ghost",
            Self::Error => "error",
            Self::Custom(name) => name,
        })
    }
}
