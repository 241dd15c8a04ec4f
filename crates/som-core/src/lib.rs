//! Numeric core of the SOM dashboard: loading and standardizing a GeoJSON
//! layer, training a self-organizing map, clustering its nodes and summarizing
//! the clusters.

pub mod cluster;
pub mod error;
pub mod pipeline;
pub mod som;
pub mod summary;
pub mod table;

pub use cluster::{
    Linkage, NodeClusterMap, ObservationAssignment, ObservationClusterMap, assign_observations,
    cluster_nodes,
};
pub use error::{LoadError, ParameterError, PipelineError, ScaleError};
pub use pipeline::{PipelineConfig, PipelineOutput, run, run_table};
pub use som::{
    Topology, TrainedMap, TrainingParams, TrainingReport, best_matching_unit, distance_map,
    grid_neighbors, node_position, train,
};
pub use summary::{SummaryRow, SummaryTable, cluster_means};
pub use table::{GeometryTable, GridKeyColumn, ObservationTable, Region, load, scale};

pub use geo;
pub use ndarray;
