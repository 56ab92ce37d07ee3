//! Binary entrypoint for the calculator plugin.

use std::process::ExitCode;

fn main() -> ExitCode {
    corynth_plugin::launch(|_config| corynth_plugin_calculator::runtime())
}
