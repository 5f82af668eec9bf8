//! Configuration loading for the CLI.
//!
//! Flags understood by `lazydb-config` are peeled off the front of the
//! argument list and handed to the loader; everything from the first
//! unrecognised token onwards belongs to the command parser.

use std::ffi::{OsStr, OsString};

use lazydb_config::Config;
use ortho_config::OrthoConfig;

use crate::errors::AppError;

/// Flags owned by the configuration loader.
///
/// Keep in sync with the fields of [`Config`]; `ortho_config` derives one
/// kebab-case flag per field plus `--config-path`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--plugin-dir",
    "--handshake-timeout-ms",
    "--shutdown-grace-ms",
    "--call-timeout-ms",
    "--log-filter",
    "--log-format",
];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the program name plus configuration flags.
    ///
    /// Configuration flags must precede the subcommand.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify_flag(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Stop;
    }
    let (flag, has_inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (&*text, false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !has_inline_value,
        }
    } else {
        FlagAction::Stop
    }
}

/// Arguments split between the configuration loader and the command parser.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_arguments: Vec<OsString>,
}

pub(crate) fn split_arguments(args: Vec<OsString>) -> ArgumentSplit {
    let mut remaining = args.into_iter();
    let Some(program) = remaining.next() else {
        return ArgumentSplit::default();
    };

    let mut config_arguments = vec![program.clone()];
    let mut command_arguments = vec![program];
    let mut pending_value = false;

    for argument in remaining.by_ref() {
        if pending_value {
            config_arguments.push(argument);
            pending_value = false;
            continue;
        }
        match classify_flag(&argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument);
                pending_value = needs_value;
            }
            FlagAction::Stop => {
                command_arguments.push(argument);
                break;
            }
        }
    }
    command_arguments.extend(remaining);

    ArgumentSplit {
        config_arguments,
        command_arguments,
    }
}
