use std::path::PathBuf;

use thiserror::Error;

/// Failure while reading the geospatial input.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported input format {extension:?} for {path:?} (expected .geojson or .json)")]
    UnsupportedFormat { path: PathBuf, extension: String },
    #[error("failed to parse GeoJSON from {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: geojson::Error,
    },
    #[error("expected a FeatureCollection in {path:?}")]
    NotACollection { path: PathBuf },
    #[error("feature #{index} has no geometry")]
    MissingGeometry { index: usize },
    #[error("feature #{index} has unsupported geometry type {kind}")]
    UnsupportedGeometry { index: usize, kind: String },
}

/// Failure while standardizing the attribute table.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("dataset has no rows")]
    Empty,
    #[error("dataset has no numeric feature columns left after exclusions")]
    NoNumericColumns,
}

/// Invalid training or clustering parameter.
#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("grid dimensions must be positive (got {x_dim}x{y_dim})")]
    EmptyGrid { x_dim: usize, y_dim: usize },
    #[error("{name} must be positive and finite (got {value})")]
    NonPositive { name: &'static str, value: f64 },
    #[error("iterations must be at least 1")]
    NoIterations,
    #[error("cannot train on an empty observation table")]
    NoObservations,
    #[error("observation has {actual} features, map expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("n_clusters must be between 1 and {nodes} (got {requested})")]
    ClusterCount { requested: usize, nodes: usize },
    #[error("agglomerative clustering failed: {reason}")]
    Clustering { reason: String },
}

/// Any failure that aborts dashboard construction.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Scale(#[from] ScaleError),
    #[error(transparent)]
    Parameter(#[from] ParameterError),
}
