//! Command-line host for lazydb plugins.
//!
//! The runtime splits configuration flags from the subcommand, loads the
//! layered configuration, installs telemetry, and then drives a
//! [`PluginManager`] for exactly one command. Every command shuts the
//! plugins down before returning, whether it succeeded or not. Results are
//! written to standard output as single-line JSON documents; diagnostics go
//! to standard error.

use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use lazydb_config::Config;
use lazydb_plugins::{DatabasePlugin, LoadReport, ManagerSettings, PluginError, PluginManager};
use tracing::{debug, info, warn};

mod cli;
mod config;
mod errors;
mod output;
pub mod telemetry;

use cli::{Cli, CliCommand};
use config::{ConfigLoader, OrthoConfigLoader, split_arguments};
use errors::AppError;
use output::{PluginsView, write_json};

const CLI_TARGET: &str = "lazydb_cli";

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

fn run_with_loader<I, W, E, L>(args: I, stdout: &mut W, stderr: &mut E, loader: &L) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let split = split_arguments(args.into_iter().collect());
    let cli = match Cli::try_parse_from(&split.command_arguments) {
        Ok(cli) => cli,
        Err(error) if !error.use_stderr() => {
            write!(stdout, "{error}").ok();
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            writeln!(stderr, "{}", AppError::CliUsage(error)).ok();
            return ExitCode::FAILURE;
        }
    };

    let result = loader.load(&split.config_arguments).and_then(|config| {
        telemetry::initialise(&config)?;
        execute(&cli.command, &config, stdout)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            writeln!(stderr, "lazydb: {error}").ok();
            ExitCode::FAILURE
        }
    }
}

fn settings(config: &Config) -> ManagerSettings {
    ManagerSettings {
        handshake_timeout: config.handshake_timeout(),
        shutdown_grace: config.shutdown_grace(),
        call_timeout: config.call_timeout(),
        ..ManagerSettings::default()
    }
}

fn execute<W: Write>(command: &CliCommand, config: &Config, stdout: &mut W) -> Result<(), AppError> {
    let manager = PluginManager::new(settings(config));
    let outcome = match command {
        CliCommand::Plugins => list_plugins(&manager, config.plugin_dir(), stdout),
        CliCommand::Query {
            plugin,
            target,
            query,
        } => run_query(&manager, config.plugin_dir(), plugin, target, query, stdout),
    };

    let report = manager.shutdown();
    debug!(
        target: CLI_TARGET,
        closed = report.closed.len(),
        killed = report.killed.len(),
        "plugins shut down"
    );
    for (plugin, error) in &report.errors {
        warn!(target: CLI_TARGET, plugin, %error, "plugin reported an error during shutdown");
    }
    outcome
}

fn load(manager: &PluginManager, dir: &Path) -> Result<LoadReport, AppError> {
    let report = manager.load_plugins(dir)?;
    for failure in &report.failures {
        warn!(
            target: CLI_TARGET,
            plugin = %failure.candidate,
            stage = %failure.stage,
            error = %failure.error,
            "plugin failed to load"
        );
    }
    info!(target: CLI_TARGET, loaded = report.loaded_count(), "plugins loaded");
    Ok(report)
}

fn list_plugins<W: Write>(
    manager: &PluginManager,
    dir: &Path,
    stdout: &mut W,
) -> Result<(), AppError> {
    let report = load(manager, dir)?;
    write_json(stdout, &PluginsView::new(manager.plugins(), &report))
}

fn run_query<W: Write>(
    manager: &PluginManager,
    dir: &Path,
    plugin: &str,
    target: &str,
    query: &str,
    stdout: &mut W,
) -> Result<(), AppError> {
    let report = load(manager, dir)?;
    report.ensure_loaded(plugin)?;
    let mut client = manager
        .get_plugin(plugin)
        .ok_or_else(|| PluginError::NotLoaded {
            name: plugin.to_owned(),
            cause: None,
        })?;

    client.connect(target)?;
    let outcome = client.run(query);
    if let Err(error) = client.close() {
        warn!(target: CLI_TARGET, plugin, %error, "close failed");
    }
    write_json(stdout, &outcome?)
}
