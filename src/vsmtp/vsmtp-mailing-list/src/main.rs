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

use anyhow::Context;
use vsmtp_mailing_list::{cli::args::Args, Config};

fn main() {
    if let Err(err) = try_main() {
        let error = format!("vlist terminating error: '{err}'");

        eprintln!("{error}");
        tracing::error!(error);
        err.chain().skip(1).for_each(|cause| {
            let reason = format!("because: {cause}");

            eprintln!("{reason}");
            tracing::error!(reason);
        });
        std::process::exit(1);
    }
}

fn try_main() -> anyhow::Result<()> {
    let args = <Args as clap::Parser>::parse();

    if args.version {
        println!("{} v{}", clap::crate_name!(), clap::crate_version!());
        return Ok(());
    }

    let config = std::fs::read_to_string(&args.config)
        .context(format!("Cannot read file '{}'", args.config))
        .and_then(|f| Config::from_toml(&f).context("File contains format error"))
        .context("Cannot parse the configuration")?;

    vsmtp_mailing_list::tracing_subscriber::initialize(&args, &config)?;

    tracing::info!(
        file = ?config.logs.filepath,
        config = %args.config,
        "vlist logs initialized."
    );

    let command = args
        .command
        .ok_or_else(|| anyhow::anyhow!("no commands where specified"))?;

    command.execute(&config, &mut std::io::stdout().lock())
}
