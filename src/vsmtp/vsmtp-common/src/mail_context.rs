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

use crate::{rcpt::Rcpt, state::ProcessingState, Address};
use anyhow::Context;

/// Message body of the mail, as received.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct MessageBody {
    /// The headers of the top level message
    pub headers: Vec<String>,
    /// Complete body of the message
    pub body: Option<String>,
}

/// A mail handled by the processing pipeline.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct MailContext {
    /// unique id of the mail in the pipeline.
    pub message_id: String,
    /// processor that must handle the mail next.
    #[serde(default)]
    pub state: ProcessingState,
    /// the sender of the mail, `None` for the null reverse path `<>`.
    pub reverse_path: Option<Address>,
    /// the recipients of the mail.
    pub rcpt: Vec<Rcpt>,
    /// the message itself.
    #[serde(default)]
    pub body: MessageBody,
    /// transient attributes attached by the processors, they
    /// follow the mail in the pipeline but are never delivered.
    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub attributes: std::collections::BTreeMap<String, serde_json::Value>,
}

impl MailContext {
    /// Create a mail in the [`ProcessingState::Root`] state.
    #[must_use]
    pub fn new(
        message_id: impl Into<String>,
        reverse_path: Option<Address>,
        rcpt: impl IntoIterator<Item = Address>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            state: ProcessingState::default(),
            reverse_path,
            rcpt: rcpt.into_iter().map(Rcpt::new).collect(),
            body: MessageBody::default(),
            attributes: std::collections::BTreeMap::default(),
        }
    }

    fn from_json(content: &str) -> anyhow::Result<Self> {
        serde_json::from_str::<MailContext>(content)
            .with_context(|| format!("Cannot deserialize: '{content:?}'"))
    }

    /// Return a mail context from a file path.
    ///
    /// # Errors
    ///
    /// * file not found.
    /// * file found but failed to read.
    /// * file read but failed to serialize.
    pub fn from_file_path_sync(file: &std::path::Path) -> anyhow::Result<MailContext> {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("Cannot read file '{}'", file.display()))?;

        Self::from_json(&content)
    }

    /// Iterate over the addresses of the recipients.
    pub fn recipients(&self) -> impl Iterator<Item = &Address> {
        self.rcpt.iter().map(|rcpt| &rcpt.address)
    }

    /// Create a copy of this mail, sent to `rcpt` only and handled by `state`.
    ///
    /// The sender, the message and the attributes are kept, the id is derived
    /// from the original one.
    #[must_use]
    pub fn duplicate(&self, rcpt: Vec<Rcpt>, state: ProcessingState) -> Self {
        Self {
            message_id: format!("{}-{state}", self.message_id),
            state,
            reverse_path: self.reverse_path.clone(),
            rcpt,
            body: self.body.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr;
    use pretty_assertions::assert_eq;

    #[test]
    fn duplicate() {
        let mut mail = MailContext::new(
            "msg",
            Some(addr!("bob@example.org")),
            [addr!("a@example.org"), addr!("b@example.org")],
        );
        mail.attributes
            .insert("key".to_string(), serde_json::json!(["value"]));

        let copy = mail.duplicate(
            vec![Rcpt::new(addr!("b@example.org"))],
            ProcessingState::Custom("rejectedSender".to_string()),
        );

        assert_eq!(copy.message_id, "msg-rejectedSender");
        assert_eq!(copy.reverse_path, mail.reverse_path);
        assert_eq!(copy.body, mail.body);
        assert_eq!(copy.attributes, mail.attributes);
        assert_eq!(
            copy.recipients().cloned().collect::<Vec<_>>(),
            vec![addr!("b@example.org")]
        );
    }

    #[test]
    fn from_json() {
        let mail = MailContext::from_json(
            r#"{
                "message_id": "1",
                "reverse_path": null,
                "rcpt": [ { "address": "mygroup@lists.example.org" } ]
            }"#,
        )
        .unwrap();

        assert_eq!(mail.state, ProcessingState::Root);
        assert_eq!(mail.reverse_path, None);
        assert_eq!(
            mail.recipients().cloned().collect::<Vec<_>>(),
            vec![addr!("mygroup@lists.example.org")]
        );
    }
}
