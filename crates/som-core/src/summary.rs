//! Summary Aggregator: per-cluster means of the standardized features.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{cluster::ObservationClusterMap, table::ObservationTable};

/// Mean feature values of the observations sharing one cluster id.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryRow {
    pub cluster: usize,
    pub observations: usize,
    /// Aligned with [`SummaryTable::columns`].
    pub means: Vec<f64>,
}

/// One row per cluster with at least one observation, ascending by id.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryTable {
    pub columns: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row position holding `cluster`, if that cluster has observations.
    pub fn row_of(&self, cluster: usize) -> Option<usize> {
        self.rows.binary_search_by_key(&cluster, |row| row.cluster).ok()
    }
}

/// Group observations by cluster and average every feature column.
///
/// Grid keys and BMU bookkeeping live outside the feature matrix, so only
/// feature columns are averaged.
pub fn cluster_means(
    observations: &ObservationTable,
    assignments: &ObservationClusterMap,
) -> SummaryTable {
    let width = observations.n_features();
    let mut groups: BTreeMap<usize, (usize, Vec<f64>)> = BTreeMap::new();
    for (row, cluster) in assignments
        .clusters()
        .enumerate()
        .take(observations.n_observations())
    {
        let entry = groups
            .entry(cluster)
            .or_insert_with(|| (0, vec![0.0; width]));
        entry.0 += 1;
        for (sum, value) in entry.1.iter_mut().zip(observations.row(row).iter()) {
            *sum += value;
        }
    }

    let rows = groups
        .into_iter()
        .map(|(cluster, (count, sums))| SummaryRow {
            cluster,
            observations: count,
            means: sums.into_iter().map(|s| s / count as f64).collect(),
        })
        .collect();

    SummaryTable {
        columns: observations.feature_names.clone(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::cluster::ObservationAssignment;

    fn assigned(clusters: &[usize]) -> ObservationClusterMap {
        ObservationClusterMap {
            assignments: clusters
                .iter()
                .map(|&cluster| ObservationAssignment {
                    bmu_x: 0,
                    bmu_y: 0,
                    cluster,
                })
                .collect(),
        }
    }

    #[test]
    fn means_are_grouped_and_sorted() {
        let obs = ObservationTable::from_features(
            vec!["a".into(), "b".into()],
            array![[1.0, 10.0], [3.0, 20.0], [5.0, 0.0], [7.0, 4.0]],
        );
        let table = cluster_means(&obs, &assigned(&[3, 0, 3, 3]));

        assert_eq!(table.columns, vec!["a", "b"]);
        assert_eq!(
            table.rows,
            vec![
                SummaryRow {
                    cluster: 0,
                    observations: 1,
                    means: vec![3.0, 20.0]
                },
                SummaryRow {
                    cluster: 3,
                    observations: 3,
                    means: vec![13.0 / 3.0, 14.0 / 3.0]
                },
            ]
        );
        assert_eq!(table.row_of(3), Some(1));
        assert_eq!(table.row_of(1), None);
    }
}
