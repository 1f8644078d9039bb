// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "smsnet")]
#[command(author, version, about = "SMSnet water utility portal poller")]
#[command(
    long_about = "Signs in to an SMSnet water utility portal, polls readings, consumption and \
    billing data on a fixed interval and logs the extracted values.\n\
    \nConfiguration is read from /data/options.json, config.toml or config.json, \
    with SMSNET_* environment variables taking precedence.\n\
    \nExamples:\n  \
    smsnet                               # Poll until Ctrl-C\n  \
    smsnet validate                      # Check credentials only\n  \
    smsnet fetch --config smsnet.toml    # One cycle, print JSON"
)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Poll the portal until interrupted (default)
    Run,

    /// Sign in once and print the account id
    Validate,

    /// Run a single update cycle and print the snapshot as JSON
    Fetch,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Run)
    }
}
