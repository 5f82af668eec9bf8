//! Helpers shared by the process-level plugin tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use lazydb_plugins::{ManagerSettings, PluginManager, PluginState};
use tempfile::TempDir;

/// Path of the echo plugin binary built for this test run.
pub const ECHO_BIN: &str = env!("CARGO_BIN_EXE_lazydb-plugin-echo");

/// Grace period used by tests that expect a forced kill.
pub const TEST_GRACE: Duration = Duration::from_millis(300);

/// A temporary plugin directory.
pub struct PluginDir {
    dir: TempDir,
}

impl PluginDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create plugin dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Copies the echo binary into the directory under `name`.
    pub fn install_echo(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::copy(ECHO_BIN, &path).expect("copy echo plugin");
        path
    }

    /// Writes an executable shell script under `name`.
    #[cfg(unix)]
    pub fn install_script(&self, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
        path
    }

    /// Installs an echo plugin whose `close` sleeps for `delay_ms`.
    #[cfg(unix)]
    pub fn install_slow_close_echo(&self, name: &str, delay_ms: u64) -> PathBuf {
        self.install_script(
            name,
            &format!("ECHO_PLUGIN_CLOSE_DELAY_MS={delay_ms} exec '{ECHO_BIN}'"),
        )
    }
}

/// Settings with a short grace period so forced kills are quick.
pub fn settings() -> ManagerSettings {
    ManagerSettings {
        handshake_timeout: Duration::from_secs(10),
        shutdown_grace: TEST_GRACE,
        ..ManagerSettings::default()
    }
}

/// Returns the pid of a registered plugin.
pub fn pid_of(manager: &PluginManager, name: &str) -> u32 {
    manager
        .plugins()
        .into_iter()
        .find(|info| info.name == name)
        .map(|info| info.pid)
        .expect("plugin is registered")
}

/// Polls the registry until `name` reaches `state`.
pub fn wait_for_state(manager: &PluginManager, name: &str, state: PluginState) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        let current = manager
            .plugins()
            .into_iter()
            .find(|info| info.name == name)
            .map(|info| info.state);
        if current == Some(state) {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

/// Sends `signal` to `pid` through `kill(1)`.
#[cfg(unix)]
pub fn signal(pid: u32, signal: &str) -> bool {
    Command::new("kill")
        .arg(signal)
        .arg(pid.to_string())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Returns `true` while a process with `pid` exists.
#[cfg(unix)]
pub fn process_exists(pid: u32) -> bool {
    signal(pid, "-0")
}
