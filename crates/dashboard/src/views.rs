//! View records for the hex grid, the choropleth and the summary table,
//! built once from the pipeline output.

use geo::BoundingRect;
use serde::Serialize;
use serde_json::{Map, Value};
use som_core::{PipelineOutput, SummaryTable, Topology, node_position};

use crate::palette::{LinearColorMapper, cluster_palette, viridis};

/// Hex tile radius in view units.
pub const HEX_SIZE: f64 = 1.0;
/// Levels in the U-Matrix color ramp.
pub const UMATRIX_LEVELS: usize = 256;

/// One record per map node.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeRecord {
    pub index: usize,
    pub bmu_x: usize,
    pub bmu_y: usize,
    pub hc_cluster: usize,
    pub u_value: f64,
    pub u_color: String,
    pub color: String,
    pub display_color: String,
    /// Tile center in view units, see [`node_center`].
    pub center: [f64; 2],
}

/// How the page draws each hex tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HexOrientation {
    FlatTop,
    PointyTop,
}

impl HexOrientation {
    pub fn for_topology(topology: Topology) -> Self {
        match topology {
            Topology::Rectangular => HexOrientation::FlatTop,
            Topology::Hexagonal => HexOrientation::PointyTop,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NodeView {
    pub title: String,
    pub x_dim: usize,
    pub y_dim: usize,
    pub hex_size: f64,
    pub orientation: HexOrientation,
    pub records: Vec<NodeRecord>,
    pub cluster_legend: Vec<LegendEntry>,
    pub umatrix_legend: LinearColorMapper,
}

/// One record per input region, in input order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegionRecord {
    pub index: usize,
    pub hc_cluster: usize,
    pub bmu_x: usize,
    pub bmu_y: usize,
    pub color: String,
    /// Polygons, each a list of rings, each ring a list of `[x, y]`.
    pub polygons: Vec<Vec<Vec<[f64; 2]>>>,
    pub attributes: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegionView {
    pub title: String,
    pub records: Vec<RegionRecord>,
    /// `[min_x, min_y, max_x, max_y]` over every region.
    pub bounds: Option<[f64; 4]>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterButton {
    pub cluster: usize,
    pub label: String,
    pub color: String,
    pub css_class: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToggleWidget {
    pub label: String,
    pub active: bool,
}

/// Everything the page renders; immutable after construction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardViews {
    pub title: String,
    pub n_clusters: usize,
    pub toggle: ToggleWidget,
    pub buttons: Vec<ClusterButton>,
    pub nodes: NodeView,
    pub regions: RegionView,
    pub summary: SummaryTable,
}

impl DashboardViews {
    /// Build all three views from one pipeline run.
    ///
    /// Node and region colors both come from `output.node_clusters`, the single
    /// clustering result of the run.
    pub fn build(output: &PipelineOutput) -> Self {
        let n_clusters = output.node_clusters.n_clusters();
        let palette = cluster_palette(n_clusters);
        let nodes = build_node_view(output, &palette);
        let regions = build_region_view(output, &palette);
        let buttons = (0..n_clusters)
            .map(|cluster| ClusterButton {
                cluster,
                label: cluster.to_string(),
                color: palette[cluster].clone(),
                css_class: format!("cluster-btn-{cluster}"),
            })
            .collect();

        Self {
            title: "SOM Dashboard".into(),
            n_clusters,
            toggle: ToggleWidget {
                label: "Show U-Matrix".into(),
                active: false,
            },
            buttons,
            nodes,
            regions,
            summary: output.summary.clone(),
        }
    }
}

/// Flat-top hex center for axial `(q, r)`.
pub fn hex_center(q: usize, r: usize, size: f64) -> [f64; 2] {
    let (q, r) = (q as f64, r as f64);
    [1.5 * q * size, 3f64.sqrt() * (r + q / 2.0) * size]
}

/// Center of node `(i, j)` for the map's topology.
///
/// Rectangular maps keep the axial hex layout. Hexagonal maps draw pointy-top
/// tiles at the training positions, scaled so tiles of radius `size` touch;
/// on-screen neighbors are then exactly the map's grid neighbors.
pub fn node_center(i: usize, j: usize, topology: Topology, size: f64) -> [f64; 2] {
    match topology {
        Topology::Rectangular => hex_center(i, j, size),
        Topology::Hexagonal => {
            let (x, y) = node_position(i, j, topology);
            let spacing = 3f64.sqrt() * size;
            [x * spacing, y * spacing]
        }
    }
}

fn build_node_view(output: &PipelineOutput, palette: &[String]) -> NodeView {
    let clusters = &output.node_clusters;
    let (x_dim, y_dim) = (clusters.x_dim(), clusters.y_dim());
    let topology = output.map.topology();
    let um = &output.u_matrix;
    let um_min = um.iter().copied().fold(f64::INFINITY, f64::min);
    let um_max = um.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mapper = LinearColorMapper::new(um_min, um_max, viridis(UMATRIX_LEVELS));

    let mut records = Vec::with_capacity(x_dim * y_dim);
    for i in 0..x_dim {
        for j in 0..y_dim {
            let index = i * y_dim + j;
            let hc_cluster = clusters.labels()[index];
            let u_value = um[[i, j]];
            let color = palette[hc_cluster].clone();
            records.push(NodeRecord {
                index,
                bmu_x: i,
                bmu_y: j,
                hc_cluster,
                u_value,
                u_color: mapper.color(u_value).to_string(),
                display_color: color.clone(),
                color,
                center: node_center(i, j, topology, HEX_SIZE),
            });
        }
    }

    let cluster_legend = palette
        .iter()
        .enumerate()
        .map(|(cluster, color)| LegendEntry {
            label: cluster.to_string(),
            color: color.clone(),
        })
        .collect();

    NodeView {
        title: "SOM Units (Hexplot)".into(),
        x_dim,
        y_dim,
        hex_size: HEX_SIZE,
        orientation: HexOrientation::for_topology(topology),
        records,
        cluster_legend,
        umatrix_legend: mapper,
    }
}

fn build_region_view(output: &PipelineOutput, palette: &[String]) -> RegionView {
    let mut bounds: Option<[f64; 4]> = None;
    let records = output
        .geometry
        .regions
        .iter()
        .zip(&output.assignments.assignments)
        .enumerate()
        .map(|(index, (region, assignment))| {
            if let Some(rect) = region.geometry.bounding_rect() {
                let (min, max) = (rect.min(), rect.max());
                bounds = Some(match bounds {
                    Some([x0, y0, x1, y1]) => {
                        [x0.min(min.x), y0.min(min.y), x1.max(max.x), y1.max(max.y)]
                    }
                    None => [min.x, min.y, max.x, max.y],
                });
            }
            let polygons = region
                .geometry
                .iter()
                .map(|polygon| {
                    std::iter::once(polygon.exterior())
                        .chain(polygon.interiors())
                        .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect::<Vec<_>>())
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>();
            RegionRecord {
                index,
                hc_cluster: assignment.cluster,
                bmu_x: assignment.bmu_x,
                bmu_y: assignment.bmu_y,
                color: palette[assignment.cluster].clone(),
                polygons,
                attributes: region.attributes.clone(),
            }
        })
        .collect();

    RegionView {
        title: "Geographic Map (HC Clusters)".into(),
        records,
        bounds,
    }
}

#[cfg(test)]
mod tests {
    use som_core::grid_neighbors;

    use super::*;

    #[test]
    fn hex_centers_follow_flat_top_axial_layout() {
        assert_eq!(hex_center(0, 0, 1.0), [0.0, 0.0]);
        assert_eq!(hex_center(2, 0, 1.0), [3.0, 3f64.sqrt()]);
        assert_eq!(hex_center(0, 1, 2.0), [0.0, 2.0 * 3f64.sqrt()]);
        assert_eq!(node_center(2, 0, Topology::Rectangular, 1.0), hex_center(2, 0, 1.0));
    }

    #[test]
    fn hexagonal_grid_neighbors_are_the_nearest_tiles() {
        let (x_dim, y_dim) = (5, 5);
        for (i, j) in [(2, 2), (2, 3), (1, 1)] {
            let [cx, cy] = node_center(i, j, Topology::Hexagonal, HEX_SIZE);
            let mut by_distance: Vec<(f64, (usize, usize))> = (0..x_dim)
                .flat_map(|ni| (0..y_dim).map(move |nj| (ni, nj)))
                .filter(|&node| node != (i, j))
                .map(|(ni, nj)| {
                    let [x, y] = node_center(ni, nj, Topology::Hexagonal, HEX_SIZE);
                    ((x - cx).hypot(y - cy), (ni, nj))
                })
                .collect();
            by_distance.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            let mut nearest: Vec<(usize, usize)> =
                by_distance.iter().take(6).map(|&(_, node)| node).collect();
            let mut neighbors = grid_neighbors(i, j, x_dim, y_dim, Topology::Hexagonal);
            nearest.sort_unstable();
            neighbors.sort_unstable();
            assert_eq!(nearest, neighbors);
            // tiles of radius HEX_SIZE touch edge to edge
            assert!((by_distance[0].0 - 3f64.sqrt() * HEX_SIZE).abs() < 1e-9);
            assert!(by_distance[6].0 > by_distance[5].0 + 1e-6);
        }
    }
}
