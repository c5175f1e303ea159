//! # Config Subcommand
//!
//! - `check`: load a YAML or JSON configuration and report whether it is valid.
//! - `init`: write the commented default configuration.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use custody_arbitration::{EngineConfig, EXAMPLE_CONFIG_YAML};

/// Arguments for the `custody config` subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate a configuration file.
    Check {
        /// Path to the configuration (`.json` is read as JSON, anything else as YAML).
        path: PathBuf,
    },

    /// Write the default configuration.
    Init {
        /// Destination file. Prints to stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config subcommand.
pub fn run_config(args: &ConfigArgs) -> Result<u8> {
    match &args.command {
        ConfigCommand::Check { path } => cmd_check(path),
        ConfigCommand::Init { output, force } => cmd_init(output.as_deref(), *force),
    }
}

fn cmd_check(path: &Path) -> Result<u8> {
    let config = EngineConfig::load(path)
        .with_context(|| format!("invalid configuration: {}", path.display()))?;
    tracing::info!(path = %path.display(), "configuration valid");

    println!("OK: {}", path.display());
    println!("  Beneficiary: {}", config.beneficiary);
    println!("  Attestor: {}", config.attestor);
    println!(
        "  Guarantors: {}, {}",
        config.guarantors[0], config.guarantors[1]
    );
    println!("  Execution delay: {}s", config.execution_delay_secs);
    println!("  Dispute delay: {}s", config.dispute_delay_secs);
    Ok(0)
}

fn cmd_init(output: Option<&Path>, force: bool) -> Result<u8> {
    let Some(path) = output else {
        print!("{EXAMPLE_CONFIG_YAML}");
        return Ok(0);
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    std::fs::write(path, EXAMPLE_CONFIG_YAML)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("OK: wrote {}", path.display());
    Ok(0)
}
