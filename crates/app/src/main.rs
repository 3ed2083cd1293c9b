mod cli;
mod config;
mod headless;
mod proxy;
mod server;
mod telemetry;
mod transport;

use clap::Parser;

use crate::cli::{Cli, Command};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    telemetry::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => server::run(args.try_into()?),
        Command::Submit(args) => headless::run_submit(args.try_into()?),
        Command::Catalog(args) => headless::run_catalog(args.try_into()?),
    }
}
