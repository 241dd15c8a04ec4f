//! Configuration parsing for the dashboard.
//!
//! This module owns translation of CLI arguments into a `DashboardConfig`
//! which the session and server use without re-parsing flags.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use som_core::{Linkage, PipelineConfig, Topology, TrainingParams, table::DEFAULT_GRID_KEYS};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
/// Map grid layout.
pub enum TopologyArg {
    Rectangular,
    Hexagonal,
}

impl From<TopologyArg> for Topology {
    fn from(arg: TopologyArg) -> Self {
        match arg {
            TopologyArg::Rectangular => Topology::Rectangular,
            TopologyArg::Hexagonal => Topology::Hexagonal,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
/// Merge criterion for node clustering.
pub enum LinkageArg {
    Ward,
    Average,
}

impl From<LinkageArg> for Linkage {
    fn from(arg: LinkageArg) -> Self {
        match arg {
            LinkageArg::Ward => Linkage::Ward,
            LinkageArg::Average => Linkage::Average,
        }
    }
}

/// Pipeline arguments shared by every subcommand.
#[derive(Debug, Args)]
pub struct PipelineArgs {
    /// GeoJSON FeatureCollection with polygon geometries.
    #[arg(value_name = "DATA")]
    pub data: PathBuf,
    /// Map grid width.
    #[arg(long = "x-dim", value_name = "N", default_value_t = 10)]
    pub x_dim: usize,
    /// Map grid height.
    #[arg(long = "y-dim", value_name = "N", default_value_t = 10)]
    pub y_dim: usize,
    /// Initial neighborhood spread.
    #[arg(long = "sigma", value_name = "F", default_value_t = 1.0)]
    pub sigma: f64,
    /// Initial learning rate.
    #[arg(long = "learning-rate", value_name = "F", default_value_t = 0.5)]
    pub learning_rate: f64,
    /// Training steps.
    #[arg(long = "iterations", value_name = "N", default_value_t = 1000)]
    pub iterations: usize,
    /// Random seed for initialization and sampling.
    #[arg(long = "seed", value_name = "N", default_value_t = 42)]
    pub seed: u64,
    /// Number of node clusters.
    #[arg(long = "clusters", value_name = "N", default_value_t = 5)]
    pub clusters: usize,
    /// Numeric column to leave out of training (repeatable).
    #[arg(long = "exclude", value_name = "COLUMN")]
    pub exclude: Vec<String>,
    /// Column passed through unscaled (repeatable, defaults to hex_x and hex_y).
    #[arg(long = "grid-key", value_name = "COLUMN")]
    pub grid_keys: Vec<String>,
    #[arg(long = "topology", value_enum, default_value_t = TopologyArg::Rectangular)]
    pub topology: TopologyArg,
    #[arg(long = "linkage", value_enum, default_value_t = LinkageArg::Ward)]
    pub linkage: LinkageArg,
}

/// Arguments of the `serve` subcommand.
#[derive(Debug, Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
    /// Address the viewer binds to.
    #[arg(long = "bind", value_name = "ADDR", default_value = "127.0.0.1")]
    pub bind: String,
    /// Port the viewer listens on.
    #[arg(long = "port", value_name = "PORT", default_value_t = 8080)]
    pub port: u16,
}

#[derive(Clone, Debug, PartialEq)]
/// Validated pipeline settings plus the input path.
pub struct PipelineSettings {
    pub data_path: PathBuf,
    pub pipeline: PipelineConfig,
}

#[derive(Clone, Debug, PartialEq)]
/// Canonical configuration for a dashboard session.
pub struct DashboardConfig {
    pub settings: PipelineSettings,
    pub bind: String,
    pub port: u16,
}

impl TryFrom<PipelineArgs> for PipelineSettings {
    type Error = anyhow::Error;

    fn try_from(args: PipelineArgs) -> Result<Self> {
        let grid_keys = if args.grid_keys.is_empty() {
            DEFAULT_GRID_KEYS.iter().map(|s| s.to_string()).collect()
        } else {
            args.grid_keys
        };

        let pipeline = PipelineConfig {
            training: TrainingParams {
                x_dim: args.x_dim,
                y_dim: args.y_dim,
                sigma: args.sigma,
                learning_rate: args.learning_rate,
                iterations: args.iterations,
                seed: args.seed,
                topology: args.topology.into(),
            },
            n_clusters: args.clusters,
            linkage: args.linkage.into(),
            exclude: args.exclude,
            grid_keys,
        };
        pipeline
            .validate()
            .context("Invalid training or clustering parameters")?;

        Ok(Self {
            data_path: args.data,
            pipeline,
        })
    }
}

impl TryFrom<ServeArgs> for DashboardConfig {
    type Error = anyhow::Error;

    fn try_from(args: ServeArgs) -> Result<Self> {
        if args.bind.trim().is_empty() {
            bail!("--bind must not be empty");
        }
        if args.port == 0 {
            bail!("--port must be between 1 and 65535");
        }
        Ok(Self {
            settings: args.pipeline.try_into()?,
            bind: args.bind,
            port: args.port,
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Command};

    fn serve_args(extra: &[&str]) -> ServeArgs {
        let mut argv = vec!["som-dashboard", "serve", "data/regions.geojson"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Serve(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn defaults_match_the_documented_constants() {
        let config = DashboardConfig::try_from(serve_args(&[])).unwrap();
        assert_eq!(config.settings.pipeline, PipelineConfig::default());
        assert_eq!(config.settings.data_path, PathBuf::from("data/regions.geojson"));
        assert_eq!((config.bind.as_str(), config.port), ("127.0.0.1", 8080));
    }

    #[test]
    fn flags_override_pipeline_settings() {
        let config = DashboardConfig::try_from(serve_args(&[
            "--x-dim",
            "6",
            "--clusters",
            "3",
            "--exclude",
            "id",
            "--grid-key",
            "col",
            "--topology",
            "hexagonal",
            "--linkage",
            "average",
        ]))
        .unwrap();
        let pipeline = &config.settings.pipeline;
        assert_eq!(pipeline.training.x_dim, 6);
        assert_eq!(pipeline.n_clusters, 3);
        assert_eq!(pipeline.exclude, vec!["id"]);
        assert_eq!(pipeline.grid_keys, vec!["col"]);
        assert_eq!(pipeline.training.topology, Topology::Hexagonal);
        assert_eq!(pipeline.linkage, Linkage::Average);
    }

    #[test]
    fn too_many_clusters_is_rejected_up_front() {
        let err = DashboardConfig::try_from(serve_args(&["--x-dim", "2", "--y-dim", "2", "--clusters", "5"]))
            .unwrap_err();
        assert!(format!("{err:#}").contains("n_clusters"));
    }
}
