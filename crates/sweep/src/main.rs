use anyhow::Result;
use clap::Parser;
use toolchain_sweep::{app, cli::Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    app::run(cli)
}
