//! Unit tests for the SQLite backend.

use lazydb_plugins::{CellValue, DatabasePlugin, ExecutionErrorKind, PluginError, QueryResult};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use crate::{BACKEND_NAME, MEMORY_TARGET, SqlitePlugin};

#[fixture]
fn memory() -> SqlitePlugin {
    let mut plugin = SqlitePlugin::new();
    plugin.connect(MEMORY_TARGET).expect("open in-memory database");
    plugin
}

fn run(plugin: &mut SqlitePlugin, query: &str) -> QueryResult {
    plugin
        .run(query)
        .unwrap_or_else(|error| panic!("query '{query}' failed: {error}"))
}

fn execution_kind(error: &PluginError) -> Option<ExecutionErrorKind> {
    match error {
        PluginError::Execution { kind, .. } => Some(*kind),
        _ => None,
    }
}

fn cell<'a>(result: &'a QueryResult, row: usize, column: &str) -> &'a CellValue {
    result
        .rows()
        .get(row)
        .and_then(|cells| cells.get(column))
        .unwrap_or_else(|| panic!("no cell at row {row}, column {column}"))
}

#[rstest]
fn reports_backend_name() {
    assert_eq!(SqlitePlugin::new().name(), BACKEND_NAME);
}

#[rstest]
fn run_without_connect_is_not_connected() {
    let mut plugin = SqlitePlugin::new();
    let error = plugin.run("SELECT 1").expect_err("no database");
    assert_eq!(execution_kind(&error), Some(ExecutionErrorKind::NotConnected));
}

#[rstest]
#[case::bare(":memory:")]
#[case::prefixed("sqlite::memory:")]
fn memory_targets_connect(#[case] target: &str) {
    let mut plugin = SqlitePlugin::new();
    plugin.connect(target).expect("connect");
    assert!(plugin.is_connected());
}

#[rstest]
#[case::empty("")]
#[case::prefix_only("sqlite:")]
fn empty_target_is_a_connect_error(#[case] target: &str) {
    let mut plugin = SqlitePlugin::new();
    let error = plugin.connect(target).expect_err("empty path");
    assert!(matches!(error, PluginError::Connect { .. }));
    assert!(!plugin.is_connected());
}

#[rstest]
fn unopenable_path_is_a_connect_error() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("missing").join("nested").join("db.sqlite");
    let mut plugin = SqlitePlugin::new();
    let error = plugin
        .connect(&path.to_string_lossy())
        .expect_err("parent directory does not exist");
    assert!(matches!(error, PluginError::Connect { .. }));
}

#[rstest]
fn select_preserves_column_order_and_types(mut memory: SqlitePlugin) {
    let result = run(
        &mut memory,
        "SELECT 7 AS z, 'text' AS a, 1.5 AS m, NULL AS n, x'0102ff' AS b",
    );
    assert_eq!(result.columns(), ["z", "a", "m", "n", "b"]);
    assert_eq!(result.row_count(), 1);
    assert_eq!(cell(&result, 0, "z"), &CellValue::Integer(7));
    assert_eq!(cell(&result, 0, "a"), &CellValue::from("text"));
    assert_eq!(cell(&result, 0, "m"), &CellValue::Float(1.5));
    assert!(cell(&result, 0, "n").is_null());
    assert_eq!(cell(&result, 0, "b"), &CellValue::from("AQL/"));
}

#[rstest]
fn every_row_carries_every_column(mut memory: SqlitePlugin) {
    run(&mut memory, "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)");
    run(&mut memory, "INSERT INTO notes (id, body) VALUES (1, 'first'), (2, NULL)");

    let result = run(&mut memory, "SELECT id, body FROM notes ORDER BY id");
    assert_eq!(result.row_count(), 2);
    assert!(result.validate().is_ok());
    for row in result.rows() {
        assert_eq!(row.len(), 2);
    }
    assert!(cell(&result, 1, "body").is_null());
}

#[rstest]
fn statements_without_columns_return_empty_result(mut memory: SqlitePlugin) {
    let result = run(&mut memory, "CREATE TABLE t (v INTEGER)");
    assert!(result.is_empty());
    assert_eq!(result.column_count(), 0);
}

#[rstest]
fn empty_result_set_keeps_columns(mut memory: SqlitePlugin) {
    run(&mut memory, "CREATE TABLE t (v INTEGER, w TEXT)");
    let result = run(&mut memory, "SELECT v, w FROM t");
    assert_eq!(result.columns(), ["v", "w"]);
    assert_eq!(result.row_count(), 0);
}

#[rstest]
fn prepare_failure_is_a_syntax_error(mut memory: SqlitePlugin) {
    let error = memory.run("SELEC 1").expect_err("typo");
    assert_eq!(execution_kind(&error), Some(ExecutionErrorKind::Syntax));
    assert!(memory.run("SELECT 1").is_ok());
}

#[rstest]
fn step_failure_is_a_runtime_error(mut memory: SqlitePlugin) {
    run(&mut memory, "CREATE TABLE t (id INTEGER PRIMARY KEY)");
    run(&mut memory, "INSERT INTO t (id) VALUES (1)");
    let error = memory
        .run("INSERT INTO t (id) VALUES (1)")
        .expect_err("duplicate key");
    assert_eq!(execution_kind(&error), Some(ExecutionErrorKind::Runtime));
}

#[rstest]
fn close_is_safe_without_connect_and_twice() {
    let mut plugin = SqlitePlugin::new();
    assert!(plugin.close().is_ok());
    plugin.connect(MEMORY_TARGET).expect("connect");
    assert!(plugin.close().is_ok());
    assert!(plugin.close().is_ok());
    assert!(!plugin.is_connected());
}

#[rstest]
fn file_database_persists_across_connections() {
    let dir = TempDir::new().expect("temp dir");
    let target = format!("sqlite:{}", dir.path().join("data.db").display());

    let mut plugin = SqlitePlugin::new();
    plugin.connect(&target).expect("connect");
    run(&mut plugin, "CREATE TABLE kv (k TEXT, v TEXT)");
    run(&mut plugin, "INSERT INTO kv VALUES ('lang', 'rust')");
    plugin.close().expect("close");

    plugin.connect(&target).expect("reconnect");
    let result = run(&mut plugin, "SELECT v FROM kv WHERE k = 'lang'");
    assert_eq!(cell(&result, 0, "v"), &CellValue::from("rust"));
}

#[rstest]
fn second_connect_replaces_the_first() {
    let dir = TempDir::new().expect("temp dir");
    let target = dir.path().join("data.db");

    let mut plugin = SqlitePlugin::new();
    plugin.connect(&target.to_string_lossy()).expect("connect file");
    run(&mut plugin, "CREATE TABLE only_in_file (v INTEGER)");

    plugin.connect(MEMORY_TARGET).expect("connect memory");
    assert!(plugin.run("SELECT v FROM only_in_file").is_err());
}
