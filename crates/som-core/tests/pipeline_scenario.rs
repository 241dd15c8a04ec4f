use std::{collections::BTreeSet, fs};

use serde_json::json;
use som_core::{
    LoadError, ParameterError, PipelineConfig, PipelineError, Topology, TrainingParams, run,
};

/// 100 unit squares on a 10x10 lattice with four loosely grouped attributes.
fn write_dataset(dir: &std::path::Path) -> std::path::PathBuf {
    let features: Vec<_> = (0..100)
        .map(|idx| {
            let (x, y) = ((idx % 10) as f64, (idx / 10) as f64);
            let group = (idx % 4) as f64;
            let wobble = ((idx * 37) % 11) as f64 / 10.0;
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[x, y], [x + 1.0, y], [x + 1.0, y + 1.0], [x, y + 1.0], [x, y]]]
                },
                "properties": {
                    "name": format!("region-{idx}"),
                    "income": 10.0 * group + wobble,
                    "density": 100.0 - 7.0 * group + wobble * 3.0,
                    "age": 30.0 + group * 2.0 - wobble,
                    "green": (idx % 7) as f64,
                    "hex_x": x,
                    "hex_y": y
                }
            })
        })
        .collect();
    let collection = json!({ "type": "FeatureCollection", "features": features });
    let path = dir.join("regions.geojson");
    fs::write(&path, collection.to_string()).unwrap();
    path
}

#[test]
fn pipeline_scenario_matches_expected_shapes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dataset(dir.path());
    let output = run(&path, &PipelineConfig::default()).unwrap();

    assert_eq!(output.observations.n_observations(), 100);
    assert_eq!(
        output.observations.feature_names,
        vec!["income", "density", "age", "green"]
    );
    assert_eq!(output.observations.grid_keys.len(), 2);

    assert_eq!(output.node_clusters.len(), 100);
    assert!(output.node_clusters.labels().iter().all(|&c| c < 5));
    assert_eq!(output.u_matrix.dim(), (10, 10));

    let assigned: BTreeSet<usize> = output.assignments.clusters().collect();
    assert!((1..=5).contains(&output.summary.len()));
    assert_eq!(output.summary.len(), assigned.len());

    for a in &output.assignments.assignments {
        assert_eq!(output.node_clusters.cluster_of(a.bmu_x, a.bmu_y), Some(a.cluster));
    }

    for row in &output.summary.rows {
        let members: Vec<usize> = output
            .assignments
            .clusters()
            .enumerate()
            .filter_map(|(idx, c)| (c == row.cluster).then_some(idx))
            .collect();
        assert_eq!(row.observations, members.len());
        for (col, mean) in row.means.iter().enumerate() {
            let expected = members
                .iter()
                .map(|&idx| output.observations.features[[idx, col]])
                .sum::<f64>()
                / members.len() as f64;
            assert!((mean - expected).abs() < 1e-9);
        }
    }
}

#[test]
fn pipeline_is_reproducible_with_a_fixed_seed() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dataset(dir.path());
    let config = PipelineConfig::default();
    let first = run(&path, &config).unwrap();
    let second = run(&path, &config).unwrap();

    assert_eq!(first.map.weights(), second.map.weights());
    assert_eq!(first.node_clusters, second.node_clusters);
    assert_eq!(first.assignments, second.assignments);
    assert_eq!(first.summary, second.summary);
}

#[test]
fn hexagonal_pipeline_keeps_assignments_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_dataset(dir.path());
    let config = PipelineConfig {
        training: TrainingParams {
            topology: Topology::Hexagonal,
            ..TrainingParams::default()
        },
        ..PipelineConfig::default()
    };
    let output = run(&path, &config).unwrap();

    assert_eq!(output.map.topology(), Topology::Hexagonal);
    assert_eq!(output.u_matrix.dim(), (10, 10));
    assert!(output.u_matrix.iter().all(|u| u.is_finite() && *u >= 0.0));
    assert!(output.node_clusters.labels().iter().all(|&c| c < 5));
    for a in &output.assignments.assignments {
        assert_eq!(output.node_clusters.cluster_of(a.bmu_x, a.bmu_y), Some(a.cluster));
    }
    assert_eq!(run(&path, &config).unwrap().node_clusters, output.node_clusters);
}

#[test]
fn too_many_clusters_fails_before_loading() {
    let config = PipelineConfig {
        n_clusters: 101,
        ..PipelineConfig::default()
    };
    let err = run("does/not/exist.geojson", &config).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Parameter(ParameterError::ClusterCount {
            requested: 101,
            nodes: 100
        })
    ));
}

#[test]
fn unreadable_path_is_a_load_error() {
    let err = run("does/not/exist.geojson", &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Load(LoadError::Io { .. })));
}
