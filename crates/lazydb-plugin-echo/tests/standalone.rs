//! Running a plugin binary by hand must fail with a clear message.

use assert_cmd::cargo::cargo_bin_cmd;
use lazydb_plugins::HANDSHAKE;
use predicates::str::contains;

#[test]
fn refuses_to_run_outside_the_host() {
    let mut command = cargo_bin_cmd!("lazydb-plugin-echo");
    command
        .env_remove(HANDSHAKE.cookie_key)
        .assert()
        .failure()
        .stdout("")
        .stderr(contains("must be launched by the host"));
}
