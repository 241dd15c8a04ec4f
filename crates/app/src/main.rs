mod cli;
mod config;
mod html;
mod registry;
mod server;
mod session;
mod telemetry;

use clap::Parser;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    telemetry::init_tracing();
    let cli = cli::Cli::parse();
    cli::handle_commands(cli)
}
