//! Binary entrypoint for the shell plugin.

use std::process::ExitCode;

fn main() -> ExitCode {
    corynth_plugin::launch(|_config| corynth_plugin_shell::runtime())
}
