//! Command-line interface definitions for the `lazydb` binary.

use clap::{Parser, Subcommand};

/// Command-line interface for the lazydb plugin host.
///
/// Configuration flags such as `--plugin-dir` precede the subcommand and are
/// consumed by the configuration loader before this parser runs.
#[derive(Parser, Debug)]
#[command(name = "lazydb", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// The action to perform.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Actions supported by the host.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Loads every plugin and prints which started and which failed.
    Plugins,
    /// Runs one query through a plugin and prints the result.
    Query {
        /// Registry name of the plugin (its executable file name).
        #[arg(long)]
        plugin: String,
        /// Connection target handed to the plugin's `connect`.
        #[arg(long)]
        target: String,
        /// Query text passed to the plugin unchanged.
        #[arg(value_name = "QUERY")]
        query: String,
    },
}
