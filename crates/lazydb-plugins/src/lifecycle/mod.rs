//! Termination of plugin processes.
//!
//! Shutdown is graceful first: the backend is asked to `Close` and given a
//! grace period to finish and exit. Anything still running after that is
//! severed and killed. Records are terminated concurrently so one hung
//! plugin delays shutdown by at most one grace period.

use std::process::Child;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::capability::DatabasePlugin;
use crate::duration_millis;
use crate::error::{PluginError, TransportError};
use crate::registry::PluginRecord;
use crate::state::PluginState;

pub(crate) const LIFECYCLE_TARGET: &str = "lazydb_plugins::lifecycle";

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Outcome of shutting plugins down.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Plugins that exited within the grace period.
    pub closed: Vec<String>,
    /// Plugins that had to be killed.
    pub killed: Vec<String>,
    /// Failures observed while closing, keyed by plugin name.
    pub errors: Vec<(String, PluginError)>,
}

impl ShutdownReport {
    /// Returns the number of plugins that were terminated.
    #[must_use]
    pub const fn terminated(&self) -> usize {
        self.closed.len() + self.killed.len()
    }

    /// Returns `true` when nothing was running.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.terminated() == 0 && self.errors.is_empty()
    }

    fn absorb(&mut self, termination: Termination) {
        let Termination {
            name,
            killed,
            error,
        } = termination;
        if let Some(failure) = error {
            self.errors.push((name.clone(), failure));
        }
        if killed {
            self.killed.push(name);
        } else {
            self.closed.push(name);
        }
    }
}

#[derive(Debug)]
struct Termination {
    name: String,
    killed: bool,
    error: Option<PluginError>,
}

/// Terminates every record concurrently.
pub(crate) fn terminate_all(records: Vec<PluginRecord>, grace: Duration) -> ShutdownReport {
    let mut report = ShutdownReport::default();
    let terminations: Vec<Termination> = thread::scope(|scope| {
        let handles: Vec<_> = records
            .into_iter()
            .map(|record| {
                let name = record.name.clone();
                (name, scope.spawn(move || terminate(record, grace)))
            })
            .collect();
        handles
            .into_iter()
            .map(|(name, handle)| {
                handle.join().unwrap_or_else(|_| Termination {
                    name,
                    killed: false,
                    error: Some(PluginError::Close {
                        message: String::from("termination thread panicked"),
                    }),
                })
            })
            .collect()
    });
    for termination in terminations {
        report.absorb(termination);
    }
    report
}

/// Terminates one record: close within the grace period, then reap or kill.
pub(crate) fn terminate_one(record: PluginRecord, grace: Duration) -> ShutdownReport {
    let mut report = ShutdownReport::default();
    report.absorb(terminate(record, grace));
    report
}

fn terminate(mut record: PluginRecord, grace: Duration) -> Termination {
    let name = record.name.clone();
    let error = if record.state == PluginState::Ready && record.client.is_alive() {
        close_within(&record, grace).err()
    } else {
        None
    };
    record.client.sever();

    let exited = wait_for_exit(&mut record.child, grace);
    if !exited {
        warn!(
            target: LIFECYCLE_TARGET,
            plugin = %name,
            grace_ms = duration_millis(grace),
            "plugin still running after grace period, killing"
        );
        kill_and_reap(&mut record.child, &name);
    }
    record.transition(PluginState::Terminated);
    info!(target: LIFECYCLE_TARGET, plugin = %name, killed = !exited, "plugin terminated");
    Termination {
        name,
        killed: !exited,
        error,
    }
}

/// Asks the backend to close, giving up after `grace`.
///
/// The call runs on its own thread; severing the connection on expiry makes
/// that thread's blocked read fail, so it never outlives the plugin.
fn close_within(record: &PluginRecord, grace: Duration) -> Result<(), PluginError> {
    let (sender, receiver) = mpsc::channel();
    let mut client = record.client.clone();
    let spawned = thread::Builder::new()
        .name(format!("{}-close", record.name))
        .spawn(move || {
            if sender.send(client.close()).is_err() {
                debug!(target: LIFECYCLE_TARGET, "close finished after the grace period");
            }
        });
    if let Err(error) = spawned {
        return Err(PluginError::transport(&record.name, error.into()));
    }
    receiver.recv_timeout(grace).unwrap_or_else(|_| {
        warn!(
            target: LIFECYCLE_TARGET,
            plugin = %record.name,
            "close did not complete within the grace period"
        );
        Err(PluginError::transport(
            &record.name,
            TransportError::TimedOut {
                timeout_ms: duration_millis(grace),
            },
        ))
    })
}

/// Polls the child until it exits or `grace` elapses.
fn wait_for_exit(child: &mut Child, grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(target: LIFECYCLE_TARGET, ?status, "plugin exited");
                return true;
            }
            Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL_INTERVAL),
            Ok(None) => return false,
            Err(error) => {
                warn!(target: LIFECYCLE_TARGET, %error, "failed to check plugin status");
                return false;
            }
        }
    }
}

/// Kills a child and waits for it so no zombie remains.
pub(crate) fn kill_and_reap(child: &mut Child, plugin: &str) {
    if let Err(error) = child.kill() {
        debug!(target: LIFECYCLE_TARGET, plugin, %error, "kill failed; process may have exited");
    }
    match child.wait() {
        Ok(status) => debug!(target: LIFECYCLE_TARGET, plugin, ?status, "plugin reaped"),
        Err(error) => warn!(target: LIFECYCLE_TARGET, plugin, %error, "failed to reap plugin"),
    }
}
