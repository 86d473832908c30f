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

use crate::{cli::args::Args, Config};

#[cfg(debug_assertions)]
macro_rules! get_fmt {
    () => {
        tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_target(true)
            .with_ansi(false)
    };
}

#[cfg(not(debug_assertions))]
macro_rules! get_fmt {
    () => {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_thread_ids(false)
            .with_target(false)
            .with_ansi(false)
    };
}

/// Initialize the tracing subsystem.
///
/// # Errors
///
/// * The logs path in the configuration file is invalid.
/// * Failed to initialize the tracing subsystem.
pub fn initialize(args: &Args, config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let writer_file = match &config.logs.filepath {
        None => None,
        Some(filepath) => {
            if let (Some(directory), Some(file_name)) = (
                filepath.parent(),
                filepath.file_name().and_then(std::ffi::OsStr::to_str),
            ) {
                Some(tracing_appender::rolling::never(directory, file_name))
            } else {
                anyhow::bail!(
                    "filepath for logs at {filepath:?} does not have a parent or is not valid"
                )
            }
        }
    };

    let subscriber = tracing_subscriber::registry()
        .with({
            let mut e = tracing_subscriber::EnvFilter::default();
            for i in &config.logs.level {
                e = e.add_directive(i.clone());
            }
            e
        })
        .with(writer_file.map(|writer| get_fmt!().with_writer(writer)));

    if args.stderr {
        subscriber
            .with(get_fmt!().with_writer(std::io::stderr).with_ansi(true))
            .try_init()
    } else {
        subscriber.try_init()
    }
    .map_err(|e| anyhow::anyhow!("{e}"))
}
