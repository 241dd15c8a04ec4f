//! Runs stages 1–4 in order and bundles their outputs into one artifact that
//! the presentation layer reads without recomputing anything.

use std::path::Path;

use ndarray::Array2;
use tracing::info;

use crate::{
    cluster::{Linkage, NodeClusterMap, ObservationClusterMap, assign_observations, cluster_nodes},
    error::{ParameterError, PipelineError},
    som::{TrainedMap, TrainingParams, TrainingReport, distance_map, train},
    summary::{SummaryTable, cluster_means},
    table::{DEFAULT_GRID_KEYS, GeometryTable, ObservationTable, load, scale},
};

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub training: TrainingParams,
    pub n_clusters: usize,
    pub linkage: Linkage,
    /// Numeric columns left out of the observation table.
    pub exclude: Vec<String>,
    /// Columns passed through unscaled and never trained on.
    pub grid_keys: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            training: TrainingParams::default(),
            n_clusters: 5,
            linkage: Linkage::Ward,
            exclude: Vec::new(),
            grid_keys: DEFAULT_GRID_KEYS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    /// Check every parameter that can be checked before loading data.
    pub fn validate(&self) -> Result<(), ParameterError> {
        self.training.validate()?;
        let nodes = self.training.x_dim * self.training.y_dim;
        if self.n_clusters == 0 || self.n_clusters > nodes {
            return Err(ParameterError::ClusterCount {
                requested: self.n_clusters,
                nodes,
            });
        }
        Ok(())
    }
}

/// Everything the dashboard needs, produced once per session.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    pub geometry: GeometryTable,
    pub observations: ObservationTable,
    pub map: TrainedMap,
    pub training: TrainingReport,
    /// Shape `(x_dim, y_dim)`.
    pub u_matrix: Array2<f64>,
    pub node_clusters: NodeClusterMap,
    pub assignments: ObservationClusterMap,
    pub summary: SummaryTable,
}

/// Load `path` and run the full pipeline.
pub fn run(path: impl AsRef<Path>, config: &PipelineConfig) -> Result<PipelineOutput, PipelineError> {
    config.validate()?;
    let table = load(path)?;
    run_table(table, config)
}

/// Run stages 2–4 over an already loaded geometry table.
pub fn run_table(
    table: GeometryTable,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PipelineError> {
    config.validate()?;
    let span = tracing::info_span!(
        "som.pipeline",
        source = %table.source.display(),
        regions = table.len(),
        clusters = config.n_clusters
    );
    let _guard = span.enter();

    let (observations, geometry) = scale(table, &config.exclude, &config.grid_keys)?;
    let (map, training) = train(&observations, &config.training)?;
    let u_matrix = distance_map(&map);
    let node_clusters = cluster_nodes(&map, config.n_clusters, config.linkage)?;
    let assignments = assign_observations(&map, &node_clusters, &observations)?;
    let summary = cluster_means(&observations, &assignments);

    info!(
        "Pipeline ready: {} observations x {} features, {} summary rows",
        observations.n_observations(),
        observations.n_features(),
        summary.len()
    );

    Ok(PipelineOutput {
        geometry,
        observations,
        map,
        training,
        u_matrix,
        node_clusters,
        assignments,
        summary,
    })
}
