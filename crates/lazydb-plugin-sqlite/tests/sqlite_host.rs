//! End-to-end test of the SQLite plugin through the host.

use std::fs;

use lazydb_plugins::{CellValue, DatabasePlugin, ManagerSettings, PluginManager};
use tempfile::TempDir;

const SQLITE_BIN: &str = env!("CARGO_BIN_EXE_lazydb-plugin-sqlite");

#[test]
fn host_runs_queries_through_the_sqlite_plugin() {
    let plugins = TempDir::new().expect("plugin dir");
    fs::copy(SQLITE_BIN, plugins.path().join("sqlite")).expect("install plugin");
    let data = TempDir::new().expect("data dir");
    let database = data.path().join("host.db");

    let manager = PluginManager::new(ManagerSettings::default());
    let report = manager.load_plugins(plugins.path()).expect("discovery succeeds");
    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);

    let mut sqlite = manager.get_plugin("sqlite").expect("plugin registered");
    assert_eq!(sqlite.backend(), "sqlite");
    sqlite
        .connect(&database.to_string_lossy())
        .expect("connect");
    sqlite
        .run("CREATE TABLE people (name TEXT, age INTEGER)")
        .expect("create table");
    sqlite
        .run("INSERT INTO people VALUES ('ada', 36), ('alan', NULL)")
        .expect("insert rows");

    let result = sqlite
        .run("SELECT name, age FROM people ORDER BY name")
        .expect("select rows");
    assert_eq!(result.columns(), ["name", "age"]);
    let ages: Vec<_> = result
        .rows()
        .iter()
        .filter_map(|row| row.get("age").cloned())
        .collect();
    assert_eq!(ages, [CellValue::Integer(36), CellValue::Null]);

    let error = sqlite.run("SELEC").expect_err("syntax error");
    assert!(error.is_backend());
    assert!(sqlite.is_alive());

    sqlite.close().expect("close");
    let shutdown = manager.shutdown();
    assert_eq!(shutdown.terminated(), 1);
}
