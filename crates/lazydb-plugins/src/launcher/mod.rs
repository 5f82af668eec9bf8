//! Plugin discovery and process launch.
//!
//! Every non-directory entry of the plugin directory is a candidate. Each
//! candidate is spawned with piped output, must announce itself through the
//! handshake within the configured timeout, and is then connected and asked
//! for its backend name. A candidate that fails any step is killed and
//! reported; it never affects its siblings.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;

use tracing::{debug, info, warn};

use crate::client::PluginClient;
use crate::error::PluginError;
use crate::handshake::{HANDSHAKE, await_handshake, relay_lines};
use crate::lifecycle::kill_and_reap;
use crate::registry::{LoadFailure, ManagerSettings};
use crate::state::PluginState;

pub(crate) const LAUNCHER_TARGET: &str = "lazydb_plugins::launcher";

/// A plugin executable found in the plugin directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
}

/// A plugin process that completed its handshake.
#[derive(Debug)]
pub(crate) struct Launched {
    pub(crate) candidate: Candidate,
    pub(crate) child: Child,
    pub(crate) client: PluginClient,
}

/// Lists candidates sorted by file name.
///
/// The order `read_dir` reports is platform-dependent and is discarded, so
/// launch order and load reports are the same on every run. Directories are
/// skipped.
pub(crate) fn discover(dir: &Path) -> Result<Vec<Candidate>, PluginError> {
    let discovery = |source: std::io::Error| PluginError::Discovery {
        path: dir.to_path_buf(),
        source: source.into(),
    };
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir).map_err(discovery)? {
        let path = entry.map_err(discovery)?.path();
        if path.is_dir() {
            debug!(target: LAUNCHER_TARGET, path = %path.display(), "skipping directory");
            continue;
        }
        let Some(name) = path.file_name().map(|name| name.to_string_lossy().into_owned()) else {
            continue;
        };
        candidates.push(Candidate { name, path });
    }
    candidates.sort_by(|left, right| left.name.cmp(&right.name));
    debug!(
        target: LAUNCHER_TARGET,
        dir = %dir.display(),
        count = candidates.len(),
        "discovered plugin candidates"
    );
    Ok(candidates)
}

/// Spawns a candidate and drives it to `Ready`.
pub(crate) fn launch(
    candidate: &Candidate,
    settings: &ManagerSettings,
) -> Result<Launched, LoadFailure> {
    let name = candidate.name.as_str();
    let failure = |stage: PluginState, error: PluginError| LoadFailure {
        candidate: candidate.name.clone(),
        path: candidate.path.clone(),
        stage,
        error,
    };

    debug!(target: LAUNCHER_TARGET, plugin = name, path = %candidate.path.display(), "launching plugin");
    let mut child = Command::new(&candidate.path)
        .env(HANDSHAKE.cookie_key, HANDSHAKE.cookie_value)
        .envs(settings.env.iter().map(|(key, value)| (key, value)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| {
            failure(
                PluginState::Launching,
                PluginError::Spawn {
                    name: name.to_owned(),
                    message: source.to_string(),
                    source: Some(source.into()),
                },
            )
        })?;

    let pid = child.id();
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        kill_and_reap(&mut child, name);
        return Err(failure(
            PluginState::Launching,
            PluginError::Spawn {
                name: name.to_owned(),
                message: String::from("plugin output pipes were not captured"),
                source: None,
            },
        ));
    };
    relay_stderr(name, stderr);

    let negotiated = await_handshake(name, stdout, settings.handshake_timeout).and_then(|address| {
        PluginClient::open(name, address, settings.handshake_timeout, settings.call_timeout)
    });
    match negotiated {
        Ok(client) => {
            info!(
                target: LAUNCHER_TARGET,
                plugin = name,
                backend = client.backend(),
                pid,
                "plugin ready"
            );
            Ok(Launched {
                candidate: candidate.clone(),
                child,
                client,
            })
        }
        Err(error) => {
            warn!(target: LAUNCHER_TARGET, plugin = name, pid, %error, "plugin failed to start");
            kill_and_reap(&mut child, name);
            Err(failure(PluginState::HandshakeNegotiating, error))
        }
    }
}

fn relay_stderr(plugin: &str, stderr: std::process::ChildStderr) {
    let owner = plugin.to_owned();
    let spawned = thread::Builder::new()
        .name(format!("{plugin}-stderr"))
        .spawn(move || relay_lines(BufReader::new(stderr), &owner, "stderr"));
    if let Err(error) = spawned {
        warn!(target: LAUNCHER_TARGET, plugin, %error, "plugin stderr will not be relayed");
    }
}
