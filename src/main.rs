use clap::Parser;
use dispatch_lib::cli::{self, Cli};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    cli::run(cli)
}
