//! Binary entrypoint for the echo plugin.

use std::io::{self, Write};

use lazydb_plugin_echo::EchoPlugin;
use lazydb_plugins::server::serve;
use lazydb_plugins::telemetry::init_plugin_logging;

fn main() {
    if let Err(error) = init_plugin_logging() {
        writeln!(io::stderr().lock(), "failed to initialise logging: {error}").ok();
    }

    if let Err(error) = serve(EchoPlugin::from_env()) {
        writeln!(io::stderr().lock(), "{error}").ok();
        std::process::exit(1);
    }
}
