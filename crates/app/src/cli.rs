use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::{
    config::{DashboardConfig, PipelineArgs, PipelineSettings, ServeArgs},
    session::DashboardSession,
};

#[derive(Debug, Parser)]
#[command(
    name = "som-dashboard",
    version,
    about = "Self-organizing map dashboard over a GeoJSON layer"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Train the map, build the linked views and serve them until Ctrl+C.
    Serve(ServeArgs),
    /// Train the map and print the per-cluster summary table.
    Summary(PipelineArgs),
}

pub fn handle_commands(cli: Cli) -> Result<()> {
    let outcome = match cli.command {
        Command::Serve(args) => {
            let config = DashboardConfig::try_from(args)?;
            DashboardSession::prepare(&config.settings)?.serve(&config)
        }
        Command::Summary(args) => {
            let settings = PipelineSettings::try_from(args)?;
            let session = DashboardSession::prepare(&settings)?;
            print_summary(&session);
            Ok(())
        }
    };
    outcome.context("som-dashboard failed")
}

fn print_summary(session: &DashboardSession) {
    let summary = &session.views().summary;
    let training = session.training();
    println!(
        "Trained {} iterations, quantization error {:.4}",
        training.iterations, training.quantization_error
    );

    let mut header = format!("{:>8} {:>6}", "cluster", "count");
    for column in &summary.columns {
        header.push_str(&format!(" {column:>12}"));
    }
    println!("{header}");
    for row in &summary.rows {
        let mut line = format!("{:>8} {:>6}", row.cluster, row.observations);
        for mean in &row.means {
            line.push_str(&format!(" {mean:>12.4}"));
        }
        println!("{line}");
    }
}
