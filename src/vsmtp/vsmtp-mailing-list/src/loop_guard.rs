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

use vsmtp_common::{mail_context::MailContext, Address};

/// Key of the mail's attributes under which the expanded lists are recorded.
pub const RECORDED_RECIPIENTS: &str = "vsmtp.mailing-list.recorded-recipients";

/// The list addresses already expanded for one mail.
///
/// The set only grows and is stored in the attributes of the mail, so it
/// follows the mail in the pipeline and is dropped with it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoopGuard {
    recorded: std::collections::BTreeSet<Address>,
}

impl LoopGuard {
    /// Read the recorded list addresses from the mail.
    #[must_use]
    pub fn load(mail: &MailContext) -> Self {
        let Some(value) = mail.attributes.get(RECORDED_RECIPIENTS) else {
            return Self::default();
        };

        match serde_json::from_value(value.clone()) {
            Ok(recorded) => Self { recorded },
            Err(error) => {
                tracing::warn!(
                    message_id = %mail.message_id,
                    %error,
                    "Recorded recipients are malformed, ignoring them."
                );
                Self::default()
            }
        }
    }

    /// Write the recorded list addresses in the mail.
    pub fn store(&self, mail: &mut MailContext) {
        if self.recorded.is_empty() {
            return;
        }
        mail.attributes.insert(
            RECORDED_RECIPIENTS.to_string(),
            serde_json::Value::Array(
                self.recorded
                    .iter()
                    .map(|address| serde_json::Value::String(address.to_string()))
                    .collect(),
            ),
        );
    }

    /// Record a list as expanded, recording it twice has no effect.
    pub fn record_visited(&mut self, address: Address) {
        self.recorded.insert(address);
    }

    /// Has this list already been expanded ?
    #[must_use]
    pub fn was_visited(&self, address: &Address) -> bool {
        self.recorded.contains(address)
    }
}

impl Extend<Address> for LoopGuard {
    fn extend<T: IntoIterator<Item = Address>>(&mut self, iter: T) {
        self.recorded.extend(iter);
    }
}

impl IntoIterator for LoopGuard {
    type Item = Address;
    type IntoIter = std::collections::btree_set::IntoIter<Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.recorded.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsmtp_common::addr;

    #[test]
    fn idempotent() {
        let mut guard = LoopGuard::default();
        assert!(!guard.was_visited(&addr!("mygroup@lists.example.org")));

        guard.record_visited(addr!("mygroup@lists.example.org"));
        guard.record_visited(addr!("mygroup@LISTS.example.org"));

        assert!(guard.was_visited(&addr!("mygroup@lists.example.org")));
        assert_eq!(guard.into_iter().count(), 1);
    }

    #[test]
    fn follows_the_mail() {
        let mut mail = MailContext::new("msg", None, [addr!("mygroup@lists.example.org")]);
        assert_eq!(LoopGuard::load(&mail), LoopGuard::default());

        let mut guard = LoopGuard::default();
        guard.record_visited(addr!("b@lists.example.org"));
        guard.record_visited(addr!("a@lists.example.org"));
        guard.store(&mut mail);

        assert_eq!(
            mail.attributes[RECORDED_RECIPIENTS],
            serde_json::json!(["a@lists.example.org", "b@lists.example.org"])
        );
        assert_eq!(LoopGuard::load(&mail), guard);
    }

    #[test]
    fn empty_is_not_stored() {
        let mut mail = MailContext::new("msg", None, [addr!("u1@example.org")]);
        LoopGuard::default().store(&mut mail);
        assert!(mail.attributes.is_empty());
    }

    #[test]
    fn malformed() {
        let mut mail = MailContext::new("msg", None, [addr!("u1@example.org")]);
        mail.attributes
            .insert(RECORDED_RECIPIENTS.to_string(), serde_json::json!("oops"));

        assert_eq!(LoopGuard::load(&mail), LoopGuard::default());
    }
}
