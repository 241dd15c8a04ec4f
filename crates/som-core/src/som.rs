//! Map Trainer: a rectangular or hexagonal self-organizing map trained with
//! random-sample updates, plus best-matching-unit lookup and the U-Matrix.

use std::time::Instant;

use ndarray::{Array2, Array3, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{error::ParameterError, table::ObservationTable};

/// Grid layout used for neighborhoods and the U-Matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Square cells, 8-neighbor adjacency.
    #[default]
    Rectangular,
    /// Odd rows shifted by half a cell, 6-neighbor adjacency.
    Hexagonal,
}

/// Hyper-parameters for [`train`].
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingParams {
    pub x_dim: usize,
    pub y_dim: usize,
    pub sigma: f64,
    pub learning_rate: f64,
    pub iterations: usize,
    pub seed: u64,
    pub topology: Topology,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            x_dim: 10,
            y_dim: 10,
            sigma: 1.0,
            learning_rate: 0.5,
            iterations: 1000,
            seed: 42,
            topology: Topology::Rectangular,
        }
    }
}

impl TrainingParams {
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.x_dim == 0 || self.y_dim == 0 {
            return Err(ParameterError::EmptyGrid {
                x_dim: self.x_dim,
                y_dim: self.y_dim,
            });
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(ParameterError::NonPositive {
                name: "sigma",
                value: self.sigma,
            });
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ParameterError::NonPositive {
                name: "learning_rate",
                value: self.learning_rate,
            });
        }
        if self.iterations == 0 {
            return Err(ParameterError::NoIterations);
        }
        Ok(())
    }
}

/// A map whose weights are frozen after training.
#[derive(Clone, Debug)]
pub struct TrainedMap {
    /// Shape `(x_dim, y_dim, features)`.
    weights: Array3<f64>,
    topology: Topology,
}

impl TrainedMap {
    /// Wrap existing weights, e.g. ones restored from elsewhere.
    pub fn from_weights(weights: Array3<f64>, topology: Topology) -> Self {
        Self { weights, topology }
    }

    pub fn weights(&self) -> &Array3<f64> {
        &self.weights
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn x_dim(&self) -> usize {
        self.weights.dim().0
    }

    pub fn y_dim(&self) -> usize {
        self.weights.dim().1
    }

    pub fn n_features(&self) -> usize {
        self.weights.dim().2
    }

    pub fn n_nodes(&self) -> usize {
        self.x_dim() * self.y_dim()
    }

    /// Row-major flat index of node `(i, j)`.
    pub fn flat_index(&self, i: usize, j: usize) -> usize {
        i * self.y_dim() + j
    }

    /// Node weight vectors flattened in row-major order, shape `(X·Y, features)`.
    pub fn flat_weights(&self) -> Array2<f64> {
        let (x, y, f) = self.weights.dim();
        Array2::from_shape_fn((x * y, f), |(node, k)| self.weights[[node / y, node % y, k]])
    }

    /// Mean distance between each observation and its best-matching unit.
    pub fn quantization_error(&self, observations: &ObservationTable) -> Result<f64, ParameterError> {
        let rows = observations.n_observations();
        if rows == 0 {
            return Ok(0.0);
        }
        let mut total = 0.0;
        for row in observations.features.axis_iter(Axis(0)) {
            let (i, j) = best_matching_unit(self, row)?;
            total += euclidean(self.weights.slice(ndarray::s![i, j, ..]), row);
        }
        Ok(total / rows as f64)
    }
}

/// Summary of one training run.
#[derive(Clone, Debug, Serialize)]
pub struct TrainingReport {
    pub iterations: usize,
    pub quantization_error: f64,
    pub elapsed_seconds: f64,
}

/// Train a map over the standardized observation rows.
///
/// Weights start as copies of randomly drawn rows; every step draws one row,
/// finds its best-matching unit and pulls the Gaussian neighborhood towards it.
/// Sigma and learning rate both decay as `v / (1 + t / (T / 2))`. The same
/// `seed` always yields the same weights.
pub fn train(
    observations: &ObservationTable,
    params: &TrainingParams,
) -> Result<(TrainedMap, TrainingReport), ParameterError> {
    params.validate()?;
    let rows = observations.n_observations();
    if rows == 0 {
        return Err(ParameterError::NoObservations);
    }

    let span = tracing::info_span!(
        "som.train",
        x_dim = params.x_dim,
        y_dim = params.y_dim,
        iterations = params.iterations,
        seed = params.seed
    );
    let _guard = span.enter();
    let started = Instant::now();

    let features = observations.n_features();
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut weights = Array3::<f64>::zeros((params.x_dim, params.y_dim, features));
    for i in 0..params.x_dim {
        for j in 0..params.y_dim {
            let pick = rng.gen_range(0..rows);
            weights
                .slice_mut(ndarray::s![i, j, ..])
                .assign(&observations.row(pick));
        }
    }

    let mut map = TrainedMap {
        weights,
        topology: params.topology,
    };
    let positions = node_positions(params.x_dim, params.y_dim, params.topology);

    for t in 0..params.iterations {
        let pick = rng.gen_range(0..rows);
        let sample = observations.row(pick);
        let bmu = best_matching_unit(&map, sample)?;
        let eta = decayed(params.learning_rate, t, params.iterations);
        let sigma = decayed(params.sigma, t, params.iterations);
        pull_neighborhood(&mut map.weights, &positions, sample, bmu, eta, sigma);
    }

    let quantization_error = map.quantization_error(observations)?;
    let elapsed = started.elapsed().as_secs_f64();
    metrics::histogram!("som_training_seconds").record(elapsed);
    info!(
        "Trained {}x{} map in {:.3}s (quantization error {:.4})",
        params.x_dim, params.y_dim, elapsed, quantization_error
    );

    Ok((
        map,
        TrainingReport {
            iterations: params.iterations,
            quantization_error,
            elapsed_seconds: elapsed,
        },
    ))
}

/// Node with the smallest Euclidean distance to `observation`.
///
/// Ties go to the first node in row-major order.
pub fn best_matching_unit(
    map: &TrainedMap,
    observation: ArrayView1<'_, f64>,
) -> Result<(usize, usize), ParameterError> {
    if observation.len() != map.n_features() {
        return Err(ParameterError::DimensionMismatch {
            expected: map.n_features(),
            actual: observation.len(),
        });
    }

    let mut best = (0, 0);
    let mut best_dist = f64::INFINITY;
    for i in 0..map.x_dim() {
        for j in 0..map.y_dim() {
            let dist = squared_distance(map.weights.slice(ndarray::s![i, j, ..]), observation);
            if dist < best_dist {
                best_dist = dist;
                best = (i, j);
            }
        }
    }
    Ok(best)
}

/// U-Matrix: each node's mean distance to its immediate grid neighbors.
pub fn distance_map(map: &TrainedMap) -> Array2<f64> {
    let (x_dim, y_dim) = (map.x_dim(), map.y_dim());
    let mut um = Array2::<f64>::zeros((x_dim, y_dim));
    for i in 0..x_dim {
        for j in 0..y_dim {
            let here = map.weights.slice(ndarray::s![i, j, ..]);
            let neighbors = grid_neighbors(i, j, x_dim, y_dim, map.topology);
            if neighbors.is_empty() {
                continue;
            }
            let total: f64 = neighbors
                .iter()
                .map(|&(ni, nj)| euclidean(here, map.weights.slice(ndarray::s![ni, nj, ..])))
                .sum();
            um[[i, j]] = total / neighbors.len() as f64;
        }
    }
    debug!("Computed {}x{} U-Matrix", x_dim, y_dim);
    um
}

/// In-bounds neighbors of `(i, j)` for the given topology.
pub fn grid_neighbors(
    i: usize,
    j: usize,
    x_dim: usize,
    y_dim: usize,
    topology: Topology,
) -> Vec<(usize, usize)> {
    const RECT: [(isize, isize); 8] = [
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, -1),
        (0, 1),
        (1, -1),
        (1, 0),
        (1, 1),
    ];
    // Offsets along i depend on row parity because odd rows sit half a cell right.
    const HEX_EVEN: [(isize, isize); 6] = [(-1, 0), (1, 0), (-1, -1), (0, -1), (-1, 1), (0, 1)];
    const HEX_ODD: [(isize, isize); 6] = [(-1, 0), (1, 0), (0, -1), (1, -1), (0, 1), (1, 1)];

    let offsets: &[(isize, isize)] = match topology {
        Topology::Rectangular => &RECT,
        Topology::Hexagonal if j % 2 == 0 => &HEX_EVEN,
        Topology::Hexagonal => &HEX_ODD,
    };

    offsets
        .iter()
        .filter_map(|&(di, dj)| {
            let ni = i as isize + di;
            let nj = j as isize + dj;
            (ni >= 0 && nj >= 0 && (ni as usize) < x_dim && (nj as usize) < y_dim)
                .then_some((ni as usize, nj as usize))
        })
        .collect()
}

/// Asymptotic decay `v0 / (1 + t / (T / 2))`.
fn decayed(initial: f64, t: usize, iterations: usize) -> f64 {
    initial / (1.0 + t as f64 / (iterations as f64 / 2.0))
}

/// Move every node towards `sample`, weighted by a Gaussian of its distance to
/// the best-matching unit on the grid.
fn pull_neighborhood(
    weights: &mut Array3<f64>,
    positions: &Array2<(f64, f64)>,
    sample: ArrayView1<'_, f64>,
    (wi, wj): (usize, usize),
    eta: f64,
    sigma: f64,
) {
    let spread = 2.0 * sigma * sigma;
    let (cx, cy) = positions[[wi, wj]];
    for ((i, j), &(px, py)) in positions.indexed_iter() {
        let d2 = (px - cx).powi(2) + (py - cy).powi(2);
        let g = (-d2 / spread).exp() * eta;
        if g == 0.0 {
            continue;
        }
        let mut node = weights.slice_mut(ndarray::s![i, j, ..]);
        node.zip_mut_with(&sample, |w, &x| *w += g * (x - *w));
    }
}

/// Position of node `(i, j)` on the plane used for neighborhood distances.
///
/// Hexagonal maps shift odd rows `j` half a unit along `i` and compress rows
/// to `sqrt(3) / 2` apart, so all six neighbors sit at distance 1.
pub fn node_position(i: usize, j: usize, topology: Topology) -> (f64, f64) {
    match topology {
        Topology::Rectangular => (i as f64, j as f64),
        Topology::Hexagonal => {
            let shift = if j % 2 == 1 { 0.5 } else { 0.0 };
            (i as f64 + shift, j as f64 * 3f64.sqrt() / 2.0)
        }
    }
}

fn node_positions(x_dim: usize, y_dim: usize, topology: Topology) -> Array2<(f64, f64)> {
    Array2::from_shape_fn((x_dim, y_dim), |(i, j)| node_position(i, j, topology))
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

fn euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    squared_distance(a, b).sqrt()
}
