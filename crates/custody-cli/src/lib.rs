//! # custody-cli: Command Line Interface for the Custody Engine
//!
//! Provides the `custody` binary.
//!
//! ## Subcommands
//!
//! - `custody config check <path>`: load and validate an engine configuration.
//! - `custody config init [--output <path>]`: write the default configuration.
//! - `custody run --config <path> --script <path>`: replay a scripted session
//!   against a manual clock, printing every notification as a JSON line and a
//!   summary line at the end.
//!
//! ```bash
//! custody config init --output engine.yaml
//! custody -v run --config engine.yaml --script session.yaml
//! ```

pub mod config;
pub mod replay;
pub mod script;
