//! Unit tests for the echo backend.

use std::time::{Duration, Instant};

use lazydb_plugins::{CellValue, DatabasePlugin, PluginError};
use rstest::{fixture, rstest};

use crate::{BACKEND_NAME, ECHO_COLUMN, EchoPlugin};

#[fixture]
fn plugin() -> EchoPlugin {
    EchoPlugin::new()
}

#[rstest]
fn reports_backend_name(plugin: EchoPlugin) {
    assert_eq!(plugin.name(), BACKEND_NAME);
}

#[rstest]
#[case::word("ping")]
#[case::empty("")]
#[case::sql("SELECT * FROM t WHERE a = 'b'")]
fn run_reflects_query(mut plugin: EchoPlugin, #[case] query: &str) {
    let result = plugin.run(query).expect("echo never fails");
    assert_eq!(result.columns(), [ECHO_COLUMN]);
    assert_eq!(result.row_count(), 1);
    let cell = result
        .rows()
        .first()
        .and_then(|row| row.get(ECHO_COLUMN))
        .expect("echo cell");
    assert_eq!(cell, &CellValue::from(query));
}

#[rstest]
fn run_does_not_require_connect(mut plugin: EchoPlugin) {
    assert!(plugin.target().is_none());
    assert!(plugin.run("ping").is_ok());
}

#[rstest]
fn connect_records_and_replaces_target(mut plugin: EchoPlugin) {
    plugin.connect("first").expect("connect");
    plugin.connect("second").expect("reconnect");
    assert_eq!(plugin.target(), Some("second"));
}

#[rstest]
#[case("")]
#[case("   ")]
fn blank_target_is_a_connect_error(mut plugin: EchoPlugin, #[case] target: &str) {
    let error = plugin.connect(target).expect_err("blank target");
    assert!(matches!(error, PluginError::Connect { .. }));
    assert!(plugin.target().is_none());
}

#[rstest]
fn close_is_safe_without_connect_and_twice(mut plugin: EchoPlugin) {
    assert!(plugin.close().is_ok());
    plugin.connect("db").expect("connect");
    assert!(plugin.close().is_ok());
    assert!(plugin.close().is_ok());
    assert!(plugin.target().is_none());
}

#[rstest]
fn close_honours_delay() {
    let mut plugin = EchoPlugin::new().with_close_delay(Duration::from_millis(50));
    let started = Instant::now();
    plugin.close().expect("close");
    assert!(started.elapsed() >= Duration::from_millis(50));
}
