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

use vsmtp_common::{mail_context::MailContext, rcpt::Rcpt, state::ProcessingState, Address};

/// What happens to one recipient of the mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientOutcome {
    /// Not a list, kept as is.
    PassThrough,
    /// A list already expanded for this mail, removed.
    Dropped,
    /// A list replaced by these addresses.
    Expanded(std::collections::BTreeSet<Address>),
    /// A list the sender cannot post to, moved to the rejected copy.
    Rejected,
}

/// Attach the list headers to the recipients resolved from a list.
///
/// A recipient carries the headers of one list only: the first one it was
/// resolved from, in the order of the recipients of the mail.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderAnnotator;

impl HeaderAnnotator {
    /// Set `List-Id` and `List-Post` of `rcpt` to the address of `list`.
    pub fn annotate(rcpt: &mut Rcpt, list: &Address) {
        rcpt.set_header("List-Id", &format!("<{list}>"));
        rcpt.set_header("List-Post", &format!("<mailto:{list}>"));
    }

    /// Annotate `rcpt` with `list`, unless it already belongs to a list.
    pub fn annotate_once(rcpt: &mut Rcpt, list: &Address) {
        if rcpt.get_header("List-Id").is_none() {
            Self::annotate(rcpt, list);
        }
    }
}

/// Apply the outcomes of the recipients to the mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientRewriter {
    rejected_state: ProcessingState,
}

impl RecipientRewriter {
    /// The rejected copies are handled by `rejected_state`.
    #[must_use]
    pub const fn new(rejected_state: ProcessingState) -> Self {
        Self { rejected_state }
    }

    /// Rewrite the recipients of `mail`, `outcomes` holding one entry per recipient.
    ///
    /// The expanded lists are replaced in place by their members, skipping the
    /// addresses already present. Every recipient resolved from a list is
    /// annotated with it, including the ones that were already present. Returns the copy of the mail sent to the
    /// rejected recipients, if any. The mail becomes [`ProcessingState::Ghost`]
    /// if no recipient remains.
    pub fn rewrite(
        &self,
        mail: &mut MailContext,
        outcomes: Vec<RecipientOutcome>,
    ) -> Option<MailContext> {
        debug_assert_eq!(mail.rcpt.len(), outcomes.len());

        let original = std::mem::take(&mut mail.rcpt);

        let mut present = original
            .iter()
            .zip(&outcomes)
            .filter(|(_, outcome)| **outcome == RecipientOutcome::PassThrough)
            .map(|(rcpt, _)| rcpt.address.clone())
            .collect::<std::collections::HashSet<_>>();

        let mut rejected = Vec::<Rcpt>::new();
        let mut lists = std::collections::HashMap::<Address, Address>::new();

        for (rcpt, outcome) in original.into_iter().zip(outcomes) {
            match outcome {
                RecipientOutcome::PassThrough => mail.rcpt.push(rcpt),
                RecipientOutcome::Dropped => {
                    tracing::debug!(list = %rcpt.address, "List already expanded, dropped.");
                }
                RecipientOutcome::Rejected => {
                    if !rejected.iter().any(|i| i.address == rcpt.address) {
                        rejected.push(rcpt);
                    }
                }
                RecipientOutcome::Expanded(members) => {
                    for member in members {
                        lists
                            .entry(member.clone())
                            .or_insert_with(|| rcpt.address.clone());
                        if present.insert(member.clone()) {
                            mail.rcpt.push(Rcpt::new(member));
                        }
                    }
                }
            }
        }

        for rcpt in &mut mail.rcpt {
            if let Some(list) = lists.get(&rcpt.address) {
                HeaderAnnotator::annotate_once(rcpt, list);
            }
        }

        let copy = if rejected.is_empty() {
            None
        } else {
            Some(mail.duplicate(rejected, self.rejected_state.clone()))
        };

        if mail.rcpt.is_empty() {
            mail.state = ProcessingState::Ghost;
        }

        copy
    }
}
