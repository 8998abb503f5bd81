use clap::Parser;
use ruletrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
