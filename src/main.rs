use clap::Parser;
use propdesk::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    propdesk::logging::init();
    run(Cli::parse())
}
