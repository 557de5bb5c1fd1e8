use std::process::ExitCode;

use topovisor::{Strategies, targets};

fn main() -> ExitCode {
    topovisor::cli::run(Strategies::builtin(), targets::builtin())
}
