// SPDX-License-Identifier: MIT

//! Command-line entry point, in the template's `clap`-derive style.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ldreplicad", about = "Directory replication agent", version)]
pub struct Cli {
    /// Path to the TOML config file. Defaults to `LDREPL_CONFIG`, then
    /// `<state_dir>/ldrepl.toml`.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run one pump iteration and exit, instead of looping forever.
    #[arg(long)]
    pub once: bool,
}
