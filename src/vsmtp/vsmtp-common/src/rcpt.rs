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

/// representation of a recipient with the headers added for it only.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rcpt {
    /// Email address of the recipient.
    pub address: Address,
    /// Headers specific to this recipient, prepended to the message
    /// when it is delivered to this address.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
}

impl Rcpt {
    /// create a new recipient from it's address, without specific headers.
    #[must_use]
    pub const fn new(address: Address) -> Self {
        Self {
            address,
            headers: Vec::new(),
        }
    }

    /// get the value of a recipient header.
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// rewrite a recipient header with a new value or add it.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some((_, old)) => *old = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr;

    #[test]
    fn set_header_overwrite() {
        let mut rcpt = Rcpt::new(addr!("u1@example.org"));
        rcpt.set_header("List-Id", "<a@lists.example.org>");
        rcpt.set_header("list-id", "<b@lists.example.org>");

        assert_eq!(rcpt.headers.len(), 1);
        assert_eq!(rcpt.get_header("LIST-ID"), Some("<b@lists.example.org>"));
        assert_eq!(rcpt.get_header("List-Post"), None);
    }

    #[test]
    fn serde_without_headers() {
        let rcpt = Rcpt::new(addr!("u1@example.org"));
        let json = serde_json::to_string(&rcpt).unwrap();

        assert_eq!(json, r#"{"address":"u1@example.org"}"#);
        assert_eq!(serde_json::from_str::<Rcpt>(&json).unwrap(), rcpt);
    }
}
