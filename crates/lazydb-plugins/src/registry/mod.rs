//! The plugin registry.
//!
//! [`PluginManager`] is the single owner of every plugin process and its
//! connection. The name-to-record map is only touched under its lock, and
//! only by the manager's own methods.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Child;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::PluginClient;
use crate::error::PluginError;
use crate::launcher::{self, Candidate, LAUNCHER_TARGET, Launched};
use crate::lifecycle::{self, ShutdownReport};
use crate::state::PluginState;

/// Default time a plugin has to write its handshake line.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time a plugin has to close and exit during shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Tunables for launching and stopping plugins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    /// Bound on the handshake wait, also used as the connect timeout.
    pub handshake_timeout: Duration,
    /// Bound on a graceful close during shutdown, and on the exit that
    /// follows it.
    pub shutdown_grace: Duration,
    /// Bound on each RPC call; `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
    /// Extra environment variables passed to every plugin.
    pub env: Vec<(String, String)>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            call_timeout: None,
            env: Vec::new(),
        }
    }
}

impl ManagerSettings {
    /// Sets the call timeout; a zero duration disables it.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Adds an environment variable for every plugin process.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// A candidate that could not be brought to `Ready`.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    /// File name of the candidate.
    pub candidate: String,
    /// Full path of the candidate.
    pub path: PathBuf,
    /// State in which the launch failed.
    pub stage: PluginState,
    /// What went wrong.
    pub error: PluginError,
}

/// Outcome of [`PluginManager::load_plugins`].
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Names registered by this load, in listing order.
    pub loaded: Vec<String>,
    /// Candidates that failed. Launch failures come in listing order,
    /// followed by duplicates of already registered names.
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    /// Returns the number of plugins registered by this load.
    #[must_use]
    pub const fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Returns `true` when every candidate loaded.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the recorded failure for `candidate`, if any.
    #[must_use]
    pub fn failure(&self, candidate: &str) -> Option<&LoadFailure> {
        self.failures
            .iter()
            .find(|failure| failure.candidate == candidate)
    }

    /// Confirms that `name` was loaded.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotLoaded`] carrying the candidate's recorded
    /// failure when it was attempted.
    pub fn ensure_loaded(&self, name: &str) -> Result<(), PluginError> {
        if self.loaded.iter().any(|loaded| loaded == name) {
            return Ok(());
        }
        Err(PluginError::NotLoaded {
            name: name.to_owned(),
            cause: self
                .failure(name)
                .map(|failure| Box::new(failure.error.clone())),
        })
    }
}

/// Read-only snapshot of a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    /// Registry name.
    pub name: String,
    /// Backend identifier reported by the plugin.
    pub backend: String,
    /// Executable path.
    pub path: PathBuf,
    /// Process id.
    pub pid: u32,
    /// Current lifecycle state.
    pub state: PluginState,
}

/// Host-side bookkeeping for one plugin process.
#[derive(Debug)]
pub(crate) struct PluginRecord {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
    pub(crate) child: Child,
    pub(crate) client: PluginClient,
    pub(crate) state: PluginState,
}

impl PluginRecord {
    fn from_launched(launched: Launched) -> Self {
        let Launched {
            candidate: Candidate { name, path },
            child,
            client,
        } = launched;
        Self {
            name,
            path,
            child,
            client,
            state: PluginState::Ready,
        }
    }

    /// Moves to `next` when the state machine allows it.
    pub(crate) fn transition(&mut self, next: PluginState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        debug!(
            target: LAUNCHER_TARGET,
            plugin = %self.name,
            from = %self.state,
            to = %next,
            "plugin state change"
        );
        self.state = next;
        true
    }

    /// Marks a `Ready` record `Failed` when its process or connection died.
    fn refresh(&mut self) {
        if self.state != PluginState::Ready {
            return;
        }
        let exited = matches!(self.child.try_wait(), Ok(Some(_)));
        if exited || !self.client.is_alive() {
            warn!(
                target: LAUNCHER_TARGET,
                plugin = %self.name,
                exited,
                "plugin connection lost"
            );
            self.client.sever();
            self.transition(PluginState::Failed);
        }
    }

    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: self.name.clone(),
            backend: self.client.backend().to_owned(),
            path: self.path.clone(),
            pid: self.child.id(),
            state: self.state,
        }
    }
}

/// Owns and tracks all plugin processes.
///
/// Dropping the manager shuts every plugin down.
///
/// # Example
///
/// ```no_run
/// use lazydb_plugins::{DatabasePlugin, ManagerSettings, PluginManager};
///
/// let manager = PluginManager::new(ManagerSettings::default());
/// let report = manager.load_plugins("plugins")?;
/// report.ensure_loaded("sqlite")?;
///
/// if let Some(mut plugin) = manager.get_plugin("sqlite") {
///     plugin.connect(":memory:")?;
///     let result = plugin.run("select 1 as one")?;
///     assert_eq!(result.row_count(), 1);
///     plugin.close()?;
/// }
/// manager.shutdown();
/// # Ok::<(), lazydb_plugins::PluginError>(())
/// ```
#[derive(Debug)]
pub struct PluginManager {
    settings: ManagerSettings,
    records: Mutex<BTreeMap<String, PluginRecord>>,
}

impl PluginManager {
    /// Creates an empty manager.
    #[must_use]
    pub const fn new(settings: ManagerSettings) -> Self {
        Self {
            settings,
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the settings the manager was created with.
    #[must_use]
    pub const fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Launches every candidate in `dir` and registers those that become
    /// ready.
    ///
    /// Candidates launch in parallel; results are registered in listing
    /// order under a single lock acquisition. A candidate whose name is
    /// already registered is killed and reported as
    /// [`PluginError::AlreadyLoaded`].
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Discovery`] when `dir` cannot be listed.
    /// Per-candidate failures are returned inside the [`LoadReport`].
    pub fn load_plugins(&self, dir: impl AsRef<Path>) -> Result<LoadReport, PluginError> {
        let candidates = launcher::discover(dir.as_ref())?;
        let settings = &self.settings;
        let outcomes: Vec<Result<Launched, LoadFailure>> = thread::scope(|scope| {
            let handles: Vec<_> = candidates
                .iter()
                .map(|candidate| {
                    let handle = scope.spawn(move || launcher::launch(candidate, settings));
                    (candidate, handle)
                })
                .collect();
            handles
                .into_iter()
                .map(|(candidate, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(LoadFailure {
                            candidate: candidate.name.clone(),
                            path: candidate.path.clone(),
                            stage: PluginState::Launching,
                            error: PluginError::Spawn {
                                name: candidate.name.clone(),
                                message: String::from("launch thread panicked"),
                                source: None,
                            },
                        })
                    })
                })
                .collect()
        });

        let mut report = LoadReport::default();
        let mut duplicates = Vec::new();
        let mut records = self.lock();
        for outcome in outcomes {
            match outcome {
                Ok(launched) if records.contains_key(&launched.candidate.name) => {
                    duplicates.push(launched);
                }
                Ok(launched) => {
                    let record = PluginRecord::from_launched(launched);
                    report.loaded.push(record.name.clone());
                    records.insert(record.name.clone(), record);
                }
                Err(failure) => report.failures.push(failure),
            }
        }
        drop(records);

        for mut duplicate in duplicates {
            let Candidate { name, path } = duplicate.candidate;
            warn!(
                target: LAUNCHER_TARGET,
                plugin = %name,
                "plugin already loaded, stopping new instance"
            );
            duplicate.client.sever();
            lifecycle::kill_and_reap(&mut duplicate.child, &name);
            report.failures.push(LoadFailure {
                error: PluginError::AlreadyLoaded { name: name.clone() },
                candidate: name,
                path,
                stage: PluginState::Ready,
            });
        }

        info!(
            target: LAUNCHER_TARGET,
            loaded = report.loaded.len(),
            failed = report.failures.len(),
            "plugin load finished"
        );
        Ok(report)
    }

    /// Looks up a plugin by exact name.
    ///
    /// A crashed plugin is still found; its calls fail fast with a transport
    /// error until it is unloaded.
    #[must_use]
    pub fn get_plugin(&self, name: &str) -> Option<PluginClient> {
        let mut records = self.lock();
        let record = records.get_mut(name)?;
        record.refresh();
        Some(record.client.clone())
    }

    /// Returns `true` when `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Returns registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Returns the number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when no plugins are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns a snapshot of every registered plugin.
    ///
    /// Exited processes are reaped and their records reported as
    /// [`PluginState::Failed`].
    #[must_use]
    pub fn plugins(&self) -> Vec<PluginInfo> {
        let mut records = self.lock();
        records
            .values_mut()
            .map(|record| {
                record.refresh();
                record.info()
            })
            .collect()
    }

    /// Stops one plugin and removes it from the registry.
    ///
    /// Returns `false` when `name` was not registered.
    pub fn unload(&self, name: &str) -> bool {
        let removed = self.lock().remove(name);
        match removed {
            Some(record) => {
                let report = lifecycle::terminate_one(record, self.settings.shutdown_grace);
                debug!(target: LAUNCHER_TARGET, plugin = name, ?report, "plugin unloaded");
                true
            }
            None => false,
        }
    }

    /// Stops every plugin and empties the registry.
    ///
    /// Each plugin gets a graceful close bounded by the shutdown grace
    /// period and is killed if it is still running afterwards. Safe to call
    /// more than once.
    pub fn shutdown(&self) -> ShutdownReport {
        let drained: Vec<PluginRecord> = std::mem::take(&mut *self.lock()).into_values().collect();
        if drained.is_empty() {
            return ShutdownReport::default();
        }
        info!(target: LAUNCHER_TARGET, count = drained.len(), "shutting down plugins");
        lifecycle::terminate_all(drained, self.settings.shutdown_grace)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, PluginRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        let report = self.shutdown();
        if !report.is_empty() {
            debug!(target: LAUNCHER_TARGET, ?report, "plugins stopped on drop");
        }
    }
}
