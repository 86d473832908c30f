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

use super::args::Commands;
use crate::{Config, MailingListService};
use anyhow::Context;
use vsmtp_common::mail_context::MailContext;

#[derive(serde::Serialize)]
struct RunOutput {
    mail: MailContext,
    rejected: Option<MailContext>,
}

impl Commands {
    /// Execute the command, writing its result to `output`.
    ///
    /// # Errors
    ///
    /// * the directory cannot be built.
    /// * the mail cannot be read.
    /// * the mail could not be processed.
    pub fn execute(self, config: &Config, output: &mut impl std::io::Write) -> anyhow::Result<()> {
        match self {
            Self::ConfigShow => {
                serde_json::to_writer_pretty(&mut *output, config)?;
            }
            Self::Run { mail } => {
                let service = MailingListService::from_config(config)?;
                let mut mail = MailContext::from_file_path_sync(&mail)?;

                let rejected = service
                    .service(&mut mail)
                    .with_context(|| format!("Cannot process mail '{}'", mail.message_id))?;

                serde_json::to_writer_pretty(&mut *output, &RunOutput { mail, rejected })?;
            }
            Self::Lookup { address } => {
                let service = MailingListService::from_config(config)?;

                match service.describe(&address)? {
                    Some(report) => serde_json::to_writer_pretty(&mut *output, &report)?,
                    None => write!(output, "'{address}' is not a mailing list")?,
                }
            }
        }

        writeln!(output)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsmtp_common::addr;

    fn config() -> Config {
        Config::from_toml(
            r#"
version_requirement = ">=2.1.0"

[server]
domains = ["example.org"]

[mailing_list]
baseDN = "dc=example,dc=org"

[directory]
type = "static"
path = "../../../demos/directory.json"
"#,
        )
        .unwrap()
    }

    fn execute(command: Commands) -> serde_json::Value {
        let mut output = Vec::new();
        command.execute(&config(), &mut output).unwrap();
        serde_json::from_slice(&output).unwrap()
    }

    #[test]
    fn config_show() {
        let output = execute(Commands::ConfigShow);

        assert_eq!(output["mailing_list"]["base_dn"], "dc=example,dc=org");
        assert_eq!(output["mailing_list"]["rejected_sender_processor"], "rejectedSender");
        assert_eq!(output["directory"]["type"], "static");
    }

    #[test]
    fn run() {
        let output = execute(Commands::Run {
            mail: "../../../demos/mail.json".into(),
        });

        assert_eq!(
            output["mail"]["rcpt"],
            serde_json::json!([
                { "address": "john@example.com" },
                {
                    "address": "u1@example.org",
                    "headers": [
                        ["List-Id", "<mygroup@lists.example.org>"],
                        ["List-Post", "<mailto:mygroup@lists.example.org>"]
                    ]
                },
                {
                    "address": "u2@example.org",
                    "headers": [
                        ["List-Id", "<mygroup@lists.example.org>"],
                        ["List-Post", "<mailto:mygroup@lists.example.org>"]
                    ]
                }
            ])
        );
        assert_eq!(
            output["rejected"]["rcpt"],
            serde_json::json!([{ "address": "board@lists.example.org" }])
        );
        assert_eq!(output["rejected"]["state"], "rejectedSender");
    }

    #[test]
    fn lookup() {
        let output = execute(Commands::Lookup {
            address: addr!("mygroup@lists.example.org"),
        });

        assert_eq!(output["category"], "internal");
        assert_eq!(
            output["members"],
            serde_json::json!(["u1@example.org", "u2@example.org"])
        );
    }

    #[test]
    fn lookup_not_a_list() {
        let mut output = Vec::new();
        Commands::Lookup {
            address: addr!("u1@example.org"),
        }
        .execute(&config(), &mut output)
        .unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "'u1@example.org' is not a mailing list\n"
        );
    }
}
