//! Process-level tests driving the real echo plugin through the host.

mod support;

use lazydb_plugins::{DatabasePlugin, PluginError, PluginManager, PluginState, QueryResult};
use rstest::rstest;
use serde_json::json;

use support::{PluginDir, settings};

#[rstest]
fn echo_plugin_loads_and_reflects_queries() {
    let dir = PluginDir::new();
    dir.install_echo("echo");
    let manager = PluginManager::new(settings());

    let report = manager.load_plugins(dir.path()).expect("discovery succeeds");
    assert_eq!(report.loaded_count(), 1);
    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);

    let mut echo = manager.get_plugin("echo").expect("echo is registered");
    assert_eq!(echo.name(), "echo");
    let result = echo.run("ping").expect("run succeeds");
    assert_eq!(
        serde_json::to_value(&result).expect("serialise result"),
        json!({ "columns": ["echo"], "rows": [{ "echo": "ping" }] })
    );

    let report = manager.shutdown();
    assert_eq!(report.closed, ["echo"]);
    assert!(manager.is_empty());
}

#[rstest]
fn close_is_safe_before_connect_and_twice() {
    let dir = PluginDir::new();
    dir.install_echo("echo");
    let manager = PluginManager::new(settings());
    manager.load_plugins(dir.path()).expect("load");

    let mut echo = manager.get_plugin("echo").expect("registered");
    assert!(echo.close().is_ok());
    echo.connect("anything").expect("connect");
    assert!(echo.close().is_ok());
    assert!(echo.close().is_ok());
    assert!(echo.is_alive());
}

#[rstest]
fn connect_errors_arrive_verbatim() {
    let dir = PluginDir::new();
    dir.install_echo("echo");
    let manager = PluginManager::new(settings());
    manager.load_plugins(dir.path()).expect("load");

    let mut echo = manager.get_plugin("echo").expect("registered");
    let error = echo.connect("").expect_err("blank target");
    assert!(
        matches!(error, PluginError::Connect { ref message } if message == "connection target is empty")
    );
    assert!(echo.is_alive());
    assert_eq!(echo.run("still here").ok(), Some(QueryResult::single("echo", "still here")));
}

#[rstest]
fn plugin_info_describes_ready_plugin() {
    let dir = PluginDir::new();
    let path = dir.install_echo("echo");
    let manager = PluginManager::new(settings());
    manager.load_plugins(dir.path()).expect("load");

    let infos = manager.plugins();
    let [info] = infos.as_slice() else {
        panic!("expected one plugin, got {infos:?}");
    };
    assert_eq!(info.name, "echo");
    assert_eq!(info.backend, "echo");
    assert_eq!(info.path, path);
    assert_eq!(info.state, PluginState::Ready);
    assert!(info.pid > 0);
}

#[rstest]
fn reloading_a_directory_reports_duplicates() {
    let dir = PluginDir::new();
    dir.install_echo("echo");
    let manager = PluginManager::new(settings());
    manager.load_plugins(dir.path()).expect("first load");

    let report = manager.load_plugins(dir.path()).expect("second load");
    assert_eq!(report.loaded_count(), 0);
    let failure = report.failure("echo").expect("duplicate reported");
    assert!(matches!(failure.error, PluginError::AlreadyLoaded { .. }));
    assert_eq!(manager.len(), 1);
    assert!(manager.get_plugin("echo").is_some_and(|echo| echo.is_alive()));
}

#[rstest]
fn ensure_loaded_explains_missing_plugin() {
    let dir = PluginDir::new();
    dir.install_echo("echo");
    let manager = PluginManager::new(settings());
    let report = manager.load_plugins(dir.path()).expect("load");

    assert!(report.ensure_loaded("echo").is_ok());
    let error = report.ensure_loaded("postgres").expect_err("not installed");
    assert!(matches!(error, PluginError::NotLoaded { cause: None, .. }));
}

#[cfg(unix)]
mod unix {
    use std::net::{Ipv4Addr, TcpListener};
    use std::time::{Duration, Instant};

    use lazydb_plugins::{
        DatabasePlugin, HANDSHAKE, ManagerSettings, PluginError, PluginManager, PluginState,
        TransportError,
    };
    use rstest::rstest;

    use super::support::{
        PluginDir, pid_of, process_exists, settings, signal, wait_for_state,
    };

    #[rstest]
    fn plugin_exiting_without_handshake_times_out() {
        let dir = PluginDir::new();
        dir.install_script("quitter", "exit 0");
        let manager = PluginManager::new(settings());

        let report = manager.load_plugins(dir.path()).expect("discovery succeeds");
        assert_eq!(report.loaded_count(), 0);
        assert_eq!(report.failures.len(), 1);
        let failure = report.failure("quitter").expect("failure recorded");
        assert!(matches!(failure.error, PluginError::HandshakeTimeout { .. }));
        assert!(!manager.contains("quitter"));
    }

    #[rstest]
    fn malformed_handshake_does_not_block_siblings() {
        let dir = PluginDir::new();
        dir.install_echo("echo");
        dir.install_script("impostor", "echo '1 SOMEONE_ELSE nope 127.0.0.1:1'\nexec sleep 30");
        let manager = PluginManager::new(settings());

        let report = manager.load_plugins(dir.path()).expect("discovery succeeds");
        assert_eq!(report.loaded, ["echo"]);
        let failure = report.failure("impostor").expect("failure recorded");
        assert!(failure.error.is_handshake(), "got {:?}", failure.error);
        assert_eq!(failure.stage, PluginState::HandshakeNegotiating);
        assert!(!manager.contains("impostor"));
        assert!(manager.get_plugin("echo").is_some());
    }

    #[rstest]
    fn unresponsive_plugin_does_not_stall_siblings() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind listener");
        let address = listener.local_addr().expect("listener address");
        let dir = PluginDir::new();
        dir.install_echo("echo");
        dir.install_script(
            "mute",
            &format!("echo '{}'\nexec sleep 30", HANDSHAKE.encode(address)),
        );
        let manager = PluginManager::new(ManagerSettings {
            handshake_timeout: Duration::from_secs(2),
            ..settings()
        });

        let started = Instant::now();
        let report = manager.load_plugins(dir.path()).expect("discovery succeeds");
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(report.loaded, ["echo"]);
        let failure = report.failure("mute").expect("failure recorded");
        assert!(matches!(
            failure.error,
            PluginError::HandshakeTimeout { timeout_ms: 2_000, .. }
        ));
        assert!(!manager.contains("mute"));
        drop(listener);
    }

    #[rstest]
    fn crash_of_one_plugin_leaves_others_working() {
        let dir = PluginDir::new();
        dir.install_echo("alpha");
        dir.install_echo("beta");
        let manager = PluginManager::new(settings());
        let report = manager.load_plugins(dir.path()).expect("load");
        assert_eq!(report.loaded_count(), 2);

        let alpha_pid = pid_of(&manager, "alpha");
        assert!(signal(alpha_pid, "-9"), "failed to kill alpha");
        assert!(wait_for_state(&manager, "alpha", PluginState::Failed));

        let mut alpha = manager.get_plugin("alpha").expect("crashed record stays registered");
        assert!(!alpha.is_alive());
        let error = alpha.run("ping").expect_err("alpha is gone");
        assert!(error.is_transport());

        let mut beta = manager.get_plugin("beta").expect("beta registered");
        assert!(beta.is_alive());
        assert!(beta.run("ping").is_ok());
        assert_eq!(
            manager
                .plugins()
                .into_iter()
                .find(|info| info.name == "beta")
                .map(|info| info.state),
            Some(PluginState::Ready)
        );
    }

    #[rstest]
    fn shutdown_kills_plugin_whose_close_hangs() {
        let dir = PluginDir::new();
        dir.install_echo("first");
        dir.install_echo("second");
        dir.install_slow_close_echo("stuck", 60_000);
        let manager = PluginManager::new(settings());
        let report = manager.load_plugins(dir.path()).expect("load");
        assert_eq!(report.loaded_count(), 3);

        let pids: Vec<u32> = manager.plugins().iter().map(|info| info.pid).collect();
        let shutdown = manager.shutdown();

        assert_eq!(shutdown.terminated(), 3);
        assert!(shutdown.killed.iter().any(|name| name == "stuck"));
        assert!(manager.is_empty());
        for pid in pids {
            assert!(!process_exists(pid), "process {pid} survived shutdown");
        }
    }

    #[rstest]
    fn unload_terminates_one_plugin() {
        let dir = PluginDir::new();
        dir.install_echo("keep");
        dir.install_echo("drop");
        let manager = PluginManager::new(settings());
        manager.load_plugins(dir.path()).expect("load");
        let pid = pid_of(&manager, "drop");

        assert!(manager.unload("drop"));
        assert!(!manager.unload("drop"));
        assert!(!process_exists(pid));
        assert_eq!(manager.names(), ["keep"]);
    }

    #[rstest]
    fn call_timeout_fails_only_the_slow_plugin() {
        let dir = PluginDir::new();
        dir.install_slow_close_echo("slow", 5_000);
        dir.install_echo("quick");
        let manager = PluginManager::new(settings().with_call_timeout(Duration::from_millis(200)));
        manager.load_plugins(dir.path()).expect("load");

        let mut slow = manager.get_plugin("slow").expect("registered");
        let error = slow.close().expect_err("close exceeds the call timeout");
        assert!(matches!(
            error,
            PluginError::Transport {
                source: TransportError::TimedOut { timeout_ms: 200 },
                ..
            }
        ));
        assert!(wait_for_state(&manager, "slow", PluginState::Failed));

        let mut quick = manager.get_plugin("quick").expect("registered");
        assert!(quick.run("ping").is_ok());
    }
}
