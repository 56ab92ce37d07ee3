//! `corynth-plugin-http` binary: the HTTP plugin on the stdio protocol.

use std::process::ExitCode;

fn main() -> ExitCode {
    corynth_plugin::launch(|_config| corynth_plugin_http::runtime())
}
