//! Cluster Assigner: agglomerative clustering over the trained map's node
//! weights, and BMU-based cluster assignment for every observation.

use std::collections::HashMap;

use aprender::UnsupervisedEstimator;
use aprender::prelude::{AgglomerativeClustering, Linkage as MergeRule, Matrix};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::ParameterError,
    som::{TrainedMap, best_matching_unit},
    table::ObservationTable,
};

/// Merge criterion for agglomerative clustering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Minimum increase of within-cluster variance.
    #[default]
    Ward,
    /// Mean pairwise Euclidean distance.
    Average,
}

impl Linkage {
    fn merge_rule(self) -> MergeRule {
        match self {
            Linkage::Ward => MergeRule::Ward,
            Linkage::Average => MergeRule::Average,
        }
    }
}

/// Cluster id for every map node, indexed by row-major flat node index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeClusterMap {
    x_dim: usize,
    y_dim: usize,
    n_clusters: usize,
    labels: Vec<usize>,
}

impl NodeClusterMap {
    pub fn x_dim(&self) -> usize {
        self.x_dim
    }

    pub fn y_dim(&self) -> usize {
        self.y_dim
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Labels in row-major node order.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Cluster id of node `(i, j)`.
    pub fn cluster_of(&self, i: usize, j: usize) -> Option<usize> {
        if i >= self.x_dim || j >= self.y_dim {
            return None;
        }
        self.labels.get(i * self.y_dim + j).copied()
    }

    /// Flat indices of the nodes carrying `cluster`.
    pub fn nodes_in(&self, cluster: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(idx, &label)| (label == cluster).then_some(idx))
            .collect()
    }
}

/// Where one observation landed on the map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ObservationAssignment {
    pub bmu_x: usize,
    pub bmu_y: usize,
    pub cluster: usize,
}

/// Per-observation assignments in observation order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ObservationClusterMap {
    pub assignments: Vec<ObservationAssignment>,
}

impl ObservationClusterMap {
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn clusters(&self) -> impl Iterator<Item = usize> + '_ {
        self.assignments.iter().map(|a| a.cluster)
    }
}

/// Partition the map's nodes into exactly `n_clusters` groups.
///
/// Ids are renumbered by first appearance in row-major node order so the
/// result only depends on the weights.
pub fn cluster_nodes(
    map: &TrainedMap,
    n_clusters: usize,
    linkage: Linkage,
) -> Result<NodeClusterMap, ParameterError> {
    let nodes = map.n_nodes();
    if n_clusters == 0 || n_clusters > nodes {
        return Err(ParameterError::ClusterCount {
            requested: n_clusters,
            nodes,
        });
    }

    let labels = agglomerate(map, n_clusters, linkage)?;
    debug!(
        "Clustered {} nodes into {} groups ({:?} linkage)",
        nodes, n_clusters, linkage
    );
    Ok(NodeClusterMap {
        x_dim: map.x_dim(),
        y_dim: map.y_dim(),
        n_clusters,
        labels,
    })
}

/// Give every observation the cluster id of its best-matching node.
///
/// `node_clusters` must come from [`cluster_nodes`] on the same `map`; it is
/// read, never recomputed.
pub fn assign_observations(
    map: &TrainedMap,
    node_clusters: &NodeClusterMap,
    observations: &ObservationTable,
) -> Result<ObservationClusterMap, ParameterError> {
    let mut assignments = Vec::with_capacity(observations.n_observations());
    for row in observations.features.axis_iter(Axis(0)) {
        let (bmu_x, bmu_y) = best_matching_unit(map, row)?;
        let cluster = node_clusters.cluster_of(bmu_x, bmu_y).ok_or(
            ParameterError::DimensionMismatch {
                expected: node_clusters.len(),
                actual: map.n_nodes(),
            },
        )?;
        assignments.push(ObservationAssignment {
            bmu_x,
            bmu_y,
            cluster,
        });
    }
    Ok(ObservationClusterMap { assignments })
}

fn agglomerate(
    map: &TrainedMap,
    n_clusters: usize,
    linkage: Linkage,
) -> Result<Vec<usize>, ParameterError> {
    let flat = map.flat_weights();
    let data: Vec<f32> = flat.iter().map(|&w| w as f32).collect();
    let matrix = Matrix::from_vec(flat.nrows(), flat.ncols(), data).map_err(clustering_failed)?;
    let mut model = AgglomerativeClustering::new(n_clusters, linkage.merge_rule());
    model.fit(&matrix).map_err(clustering_failed)?;
    Ok(renumber_by_first_appearance(model.labels()))
}

fn clustering_failed(err: impl std::fmt::Display) -> ParameterError {
    ParameterError::Clustering {
        reason: err.to_string(),
    }
}

/// Relabel so the first node in row-major order is cluster 0, the first node
/// of a different cluster is 1, and so on.
fn renumber_by_first_appearance(labels: &[usize]) -> Vec<usize> {
    let mut renumbered: HashMap<usize, usize> = HashMap::new();
    labels
        .iter()
        .map(|&label| {
            let next = renumbered.len();
            *renumbered.entry(label).or_insert(next)
        })
        .collect()
}
