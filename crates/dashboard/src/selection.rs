//! Linked selection between the hex grid, the map and the summary table.
//!
//! Each view owns a [`SelectionSource`]. A change on the node or region source
//! queues that source's handler; handlers run to completion one at a time in
//! FIFO order. Writes made by a handler (or by a cluster button) are
//! programmatic: when they change a source that has a handler, they arm that
//! source's one-shot `skip_next` flag so the echoed change event is consumed
//! without acting on it.

use std::{collections::VecDeque, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::views::DashboardViews;

/// Upper bound on handler runs per user event.
const MAX_DISPATCH: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Nodes,
    Regions,
    Table,
}

/// Selected indices plus the bookkeeping the handlers need.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SelectionSource {
    indices: Vec<usize>,
    last_selected: Option<usize>,
    skip_next: bool,
}

impl SelectionSource {
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn last_selected(&self) -> Option<usize> {
        self.last_selected
    }

    pub fn skip_armed(&self) -> bool {
        self.skip_next
    }

    /// Replace the selection, returning whether it changed.
    fn write(&mut self, indices: Vec<usize>) -> bool {
        if self.indices == indices {
            return false;
        }
        self.indices = indices;
        true
    }

    /// Consult and clear the one-shot suppression flag.
    fn take_skip(&mut self) -> bool {
        std::mem::take(&mut self.skip_next)
    }
}

/// Which color field the hex grid shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[default]
    Cluster,
    #[serde(rename = "umatrix")]
    UMatrix,
}

/// An interaction reported by the viewer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UserEvent {
    ClusterButton { cluster: usize },
    NodeSelection { indices: Vec<usize> },
    RegionSelection { indices: Vec<usize> },
    #[serde(rename = "toggle_umatrix")]
    ToggleUMatrix { active: bool },
}

impl UserEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            UserEvent::ClusterButton { .. } => "cluster_button",
            UserEvent::NodeSelection { .. } => "node_selection",
            UserEvent::RegionSelection { .. } => "region_selection",
            UserEvent::ToggleUMatrix { .. } => "toggle_umatrix",
        }
    }
}

/// Read-only join keys shared by every session.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectionLinks {
    y_dim: usize,
    node_clusters: Vec<usize>,
    node_coords: Vec<(usize, usize)>,
    region_clusters: Vec<usize>,
    region_coords: Vec<(usize, usize)>,
    /// Cluster id of each summary row.
    table_clusters: Vec<usize>,
    cluster_colors: Vec<String>,
    umatrix_colors: Vec<String>,
}

impl SelectionLinks {
    pub fn from_views(views: &DashboardViews) -> Self {
        let nodes = &views.nodes.records;
        let regions = &views.regions.records;
        Self {
            y_dim: views.nodes.y_dim,
            node_clusters: nodes.iter().map(|n| n.hc_cluster).collect(),
            node_coords: nodes.iter().map(|n| (n.bmu_x, n.bmu_y)).collect(),
            region_clusters: regions.iter().map(|r| r.hc_cluster).collect(),
            region_coords: regions.iter().map(|r| (r.bmu_x, r.bmu_y)).collect(),
            table_clusters: views.summary.rows.iter().map(|r| r.cluster).collect(),
            cluster_colors: nodes.iter().map(|n| n.color.clone()).collect(),
            umatrix_colors: nodes.iter().map(|n| n.u_color.clone()).collect(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_clusters.len()
    }

    pub fn region_count(&self) -> usize {
        self.region_clusters.len()
    }

    pub fn table_rows(&self) -> usize {
        self.table_clusters.len()
    }

    fn nodes_in(&self, cluster: usize) -> Vec<usize> {
        indices_where(&self.node_clusters, |&c| c == cluster)
    }

    fn regions_in(&self, cluster: usize) -> Vec<usize> {
        indices_where(&self.region_clusters, |&c| c == cluster)
    }

    fn regions_at(&self, coords: (usize, usize)) -> Vec<usize> {
        indices_where(&self.region_coords, |&c| c == coords)
    }

    fn node_at(&self, (x, y): (usize, usize)) -> Option<usize> {
        let index = x * self.y_dim + y;
        (self.node_coords.get(index) == Some(&(x, y))).then_some(index)
    }

    fn table_row(&self, cluster: usize) -> Vec<usize> {
        self.table_clusters
            .iter()
            .position(|&c| c == cluster)
            .into_iter()
            .collect()
    }

    fn has_cluster(&self, cluster: usize) -> bool {
        self.node_clusters.contains(&cluster)
    }
}

fn indices_where<T>(values: &[T], pred: impl Fn(&T) -> bool) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter_map(|(idx, v)| pred(v).then_some(idx))
        .collect()
}

/// What the viewer needs to redraw after an event.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectionSnapshot {
    pub nodes: Vec<usize>,
    pub regions: Vec<usize>,
    pub table: Vec<usize>,
    pub color_mode: ColorMode,
    pub cluster_legend_visible: bool,
    pub umatrix_legend_visible: bool,
    pub display_colors: Vec<String>,
}

/// Selection state of one dashboard session.
#[derive(Clone, Debug)]
pub struct LinkedSelection {
    links: Arc<SelectionLinks>,
    nodes: SelectionSource,
    regions: SelectionSource,
    table: SelectionSource,
    color_mode: ColorMode,
    display_colors: Vec<String>,
    pending: VecDeque<SourceId>,
}

impl LinkedSelection {
    pub fn new(links: Arc<SelectionLinks>) -> Self {
        let display_colors = links.cluster_colors.clone();
        Self {
            links,
            nodes: SelectionSource::default(),
            regions: SelectionSource::default(),
            table: SelectionSource::default(),
            color_mode: ColorMode::Cluster,
            display_colors,
            pending: VecDeque::new(),
        }
    }

    pub fn source(&self, id: SourceId) -> &SelectionSource {
        match id {
            SourceId::Nodes => &self.nodes,
            SourceId::Regions => &self.regions,
            SourceId::Table => &self.table,
        }
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub fn display_colors(&self) -> &[String] {
        &self.display_colors
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            nodes: self.nodes.indices.clone(),
            regions: self.regions.indices.clone(),
            table: self.table.indices.clone(),
            color_mode: self.color_mode,
            cluster_legend_visible: self.color_mode == ColorMode::Cluster,
            umatrix_legend_visible: self.color_mode == ColorMode::UMatrix,
            display_colors: self.display_colors.clone(),
        }
    }

    /// Apply one user interaction and run every handler it triggers.
    pub fn apply(&mut self, event: UserEvent) -> SelectionSnapshot {
        let span = tracing::debug_span!("dashboard.event", kind = event.kind());
        let _guard = span.enter();
        metrics::counter!("dashboard_events_total", "kind" => event.kind()).increment(1);

        match event {
            UserEvent::ClusterButton { cluster } => self.cluster_clicked(cluster),
            UserEvent::NodeSelection { indices } => {
                let indices = sanitize(indices, self.links.node_count());
                self.nodes.indices = indices;
                self.pending.push_back(SourceId::Nodes);
            }
            UserEvent::RegionSelection { indices } => {
                let indices = sanitize(indices, self.links.region_count());
                self.regions.indices = indices;
                self.pending.push_back(SourceId::Regions);
            }
            UserEvent::ToggleUMatrix { active } => self.toggle_umatrix(active),
        }

        self.dispatch();
        self.snapshot()
    }

    fn dispatch(&mut self) {
        let mut runs = 0;
        while let Some(id) = self.pending.pop_front() {
            runs += 1;
            if runs > MAX_DISPATCH {
                warn!("Selection dispatch exceeded {MAX_DISPATCH} handler runs; dropping queue");
                self.pending.clear();
                break;
            }
            match id {
                SourceId::Nodes => self.on_nodes_changed(),
                SourceId::Regions => self.on_regions_changed(),
                SourceId::Table => {}
            }
        }
    }

    /// Programmatic write. Arms the target's skip flag and queues its handler
    /// only when the selection actually changed.
    fn set_linked(&mut self, id: SourceId, indices: Vec<usize>) {
        let last = (indices.len() == 1).then(|| indices[0]);
        let source = match id {
            SourceId::Nodes => &mut self.nodes,
            SourceId::Regions => &mut self.regions,
            SourceId::Table => &mut self.table,
        };
        source.last_selected = last;
        if source.write(indices) && id != SourceId::Table {
            source.skip_next = true;
            self.pending.push_back(id);
        }
    }

    fn clear_all(&mut self) {
        self.set_linked(SourceId::Nodes, Vec::new());
        self.set_linked(SourceId::Regions, Vec::new());
        self.set_linked(SourceId::Table, Vec::new());
    }

    fn cluster_clicked(&mut self, cluster: usize) {
        if !self.links.has_cluster(cluster) {
            debug!("Ignoring click for unknown cluster {cluster}");
            return;
        }
        if self.is_cluster_selected(cluster) {
            debug!("Cluster {cluster} already selected; clearing");
            self.clear_all();
            return;
        }
        let nodes = self.links.nodes_in(cluster);
        let regions = self.links.regions_in(cluster);
        let row = self.links.table_row(cluster);
        self.set_linked(SourceId::Nodes, nodes);
        self.set_linked(SourceId::Regions, regions);
        self.set_linked(SourceId::Table, row);
    }

    fn is_cluster_selected(&self, cluster: usize) -> bool {
        let row = self.links.table_row(cluster);
        if !row.is_empty() {
            return self.table.indices == row;
        }
        // No summary row for this cluster: compare the linked views instead.
        !self.nodes.indices.is_empty()
            && self.nodes.indices == self.links.nodes_in(cluster)
            && self.regions.indices == self.links.regions_in(cluster)
    }

    fn on_nodes_changed(&mut self) {
        if self.nodes.take_skip() {
            return;
        }
        let inds = self.nodes.indices.clone();
        if inds.len() == 1 && self.nodes.last_selected == Some(inds[0]) {
            self.clear_all();
            return;
        }
        self.nodes.last_selected = (inds.len() == 1).then(|| inds[0]);
        match inds.as_slice() {
            [] => {
                self.set_linked(SourceId::Regions, Vec::new());
                self.set_linked(SourceId::Table, Vec::new());
            }
            [idx] => {
                let coords = self.links.node_coords[*idx];
                let cluster = self.links.node_clusters[*idx];
                let regions = self.links.regions_at(coords);
                let row = self.links.table_row(cluster);
                self.set_linked(SourceId::Regions, regions);
                self.set_linked(SourceId::Table, row);
            }
            _ => {}
        }
    }

    fn on_regions_changed(&mut self) {
        if self.regions.take_skip() {
            return;
        }
        let inds = self.regions.indices.clone();
        if inds.len() == 1 && self.regions.last_selected == Some(inds[0]) {
            self.clear_all();
            return;
        }
        self.regions.last_selected = (inds.len() == 1).then(|| inds[0]);
        match inds.as_slice() {
            [] => {
                self.set_linked(SourceId::Nodes, Vec::new());
                self.set_linked(SourceId::Table, Vec::new());
            }
            [idx] => {
                let coords = self.links.region_coords[*idx];
                let cluster = self.links.region_clusters[*idx];
                let node: Vec<usize> = self.links.node_at(coords).into_iter().collect();
                let row = self.links.table_row(cluster);
                self.set_linked(SourceId::Nodes, node);
                self.set_linked(SourceId::Table, row);
            }
            _ => {}
        }
    }

    fn toggle_umatrix(&mut self, active: bool) {
        self.color_mode = if active {
            ColorMode::UMatrix
        } else {
            ColorMode::Cluster
        };
        self.display_colors = match self.color_mode {
            ColorMode::Cluster => self.links.cluster_colors.clone(),
            ColorMode::UMatrix => self.links.umatrix_colors.clone(),
        };
    }
}

/// Drop out-of-range and repeated indices, keeping first-seen order.
fn sanitize(indices: Vec<usize>, len: usize) -> Vec<usize> {
    let mut out: Vec<usize> = Vec::with_capacity(indices.len());
    for idx in indices {
        if idx < len && !out.contains(&idx) {
            out.push(idx);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Four nodes on a 2x2 grid, clusters [0, 0, 1, 2]; five regions.
    fn links() -> Arc<SelectionLinks> {
        Arc::new(SelectionLinks {
            y_dim: 2,
            node_clusters: vec![0, 0, 1, 2],
            node_coords: vec![(0, 0), (0, 1), (1, 0), (1, 1)],
            region_clusters: vec![0, 1, 0, 0, 1],
            region_coords: vec![(0, 0), (1, 0), (0, 1), (0, 0), (1, 0)],
            table_clusters: vec![0, 1],
            cluster_colors: vec!["c0".into(), "c0".into(), "c1".into(), "c2".into()],
            umatrix_colors: vec!["u0".into(), "u1".into(), "u2".into(), "u3".into()],
        })
    }

    fn select_nodes(state: &mut LinkedSelection, indices: &[usize]) -> SelectionSnapshot {
        state.apply(UserEvent::NodeSelection {
            indices: indices.to_vec(),
        })
    }

    #[test]
    fn cluster_button_selects_then_clears() {
        let mut state = LinkedSelection::new(links());
        let snap = state.apply(UserEvent::ClusterButton { cluster: 0 });
        assert_eq!(snap.nodes, vec![0, 1]);
        assert_eq!(snap.regions, vec![0, 2, 3]);
        assert_eq!(snap.table, vec![0]);

        let snap = state.apply(UserEvent::ClusterButton { cluster: 0 });
        assert!(snap.nodes.is_empty() && snap.regions.is_empty() && snap.table.is_empty());
        assert!(!state.source(SourceId::Nodes).skip_armed());
        assert!(!state.source(SourceId::Regions).skip_armed());
    }

    #[test]
    fn switching_clusters_replaces_the_selection() {
        let mut state = LinkedSelection::new(links());
        state.apply(UserEvent::ClusterButton { cluster: 0 });
        let snap = state.apply(UserEvent::ClusterButton { cluster: 1 });
        assert_eq!(snap.nodes, vec![2]);
        assert_eq!(snap.regions, vec![1, 4]);
        assert_eq!(snap.table, vec![1]);
    }

    #[test]
    fn cluster_without_summary_row_toggles_on_views() {
        let mut state = LinkedSelection::new(links());
        let snap = state.apply(UserEvent::ClusterButton { cluster: 2 });
        assert_eq!(snap.nodes, vec![3]);
        assert!(snap.regions.is_empty());
        assert!(snap.table.is_empty());
        let snap = state.apply(UserEvent::ClusterButton { cluster: 2 });
        assert!(snap.nodes.is_empty());
    }

    #[test]
    fn unknown_cluster_is_ignored() {
        let mut state = LinkedSelection::new(links());
        let snap = state.apply(UserEvent::ClusterButton { cluster: 9 });
        assert!(snap.nodes.is_empty() && snap.table.is_empty());
    }

    #[test]
    fn node_click_propagates_and_second_click_clears() {
        let mut state = LinkedSelection::new(links());
        let snap = select_nodes(&mut state, &[0]);
        assert_eq!(snap.nodes, vec![0]);
        assert_eq!(snap.regions, vec![0, 3]);
        assert_eq!(snap.table, vec![0]);

        let snap = select_nodes(&mut state, &[0]);
        assert!(snap.nodes.is_empty() && snap.regions.is_empty() && snap.table.is_empty());
        assert!(!state.source(SourceId::Nodes).skip_armed());

        // A fresh click after the toggle-off selects again.
        let snap = select_nodes(&mut state, &[0]);
        assert_eq!(snap.regions, vec![0, 3]);
    }

    #[test]
    fn clicking_a_different_node_moves_the_selection() {
        let mut state = LinkedSelection::new(links());
        select_nodes(&mut state, &[0]);
        let snap = select_nodes(&mut state, &[2]);
        assert_eq!(snap.nodes, vec![2]);
        assert_eq!(snap.regions, vec![1, 4]);
        assert_eq!(snap.table, vec![1]);
    }

    #[test]
    fn empty_node_selection_clears_dependents() {
        let mut state = LinkedSelection::new(links());
        select_nodes(&mut state, &[1]);
        let snap = select_nodes(&mut state, &[]);
        assert!(snap.regions.is_empty() && snap.table.is_empty());
    }

    #[test]
    fn multi_node_selection_is_a_no_op_for_dependents() {
        let mut state = LinkedSelection::new(links());
        select_nodes(&mut state, &[1]);
        let snap = select_nodes(&mut state, &[0, 1, 99]);
        assert_eq!(snap.nodes, vec![0, 1]);
        assert_eq!(snap.regions, vec![2]);
        assert_eq!(snap.table, vec![0]);
    }

    #[test]
    fn region_click_selects_its_node_and_row() {
        let mut state = LinkedSelection::new(links());
        let snap = state.apply(UserEvent::RegionSelection { indices: vec![4] });
        assert_eq!(snap.regions, vec![4]);
        assert_eq!(snap.nodes, vec![2]);
        assert_eq!(snap.table, vec![1]);

        let snap = state.apply(UserEvent::RegionSelection { indices: vec![4] });
        assert!(snap.nodes.is_empty() && snap.regions.is_empty() && snap.table.is_empty());
    }

    #[test]
    fn clicking_a_node_selected_from_the_map_toggles_it_off() {
        let mut state = LinkedSelection::new(links());
        state.apply(UserEvent::RegionSelection { indices: vec![1] });
        let snap = select_nodes(&mut state, &[2]);
        assert!(snap.nodes.is_empty() && snap.regions.is_empty() && snap.table.is_empty());
    }

    #[test]
    fn umatrix_toggle_round_trips_colors_without_touching_selection() {
        let mut state = LinkedSelection::new(links());
        let original = state.display_colors().to_vec();
        state.apply(UserEvent::ClusterButton { cluster: 1 });

        let snap = state.apply(UserEvent::ToggleUMatrix { active: true });
        assert_eq!(snap.display_colors, vec!["u0", "u1", "u2", "u3"]);
        assert!(snap.umatrix_legend_visible && !snap.cluster_legend_visible);
        assert_eq!(snap.nodes, vec![2]);

        let snap = state.apply(UserEvent::ToggleUMatrix { active: false });
        assert_eq!(snap.display_colors, original);
        assert!(snap.cluster_legend_visible && !snap.umatrix_legend_visible);
        assert_eq!(snap.table, vec![1]);
    }

    #[test]
    fn events_deserialize_from_tagged_json() {
        let event: UserEvent =
            serde_json::from_str(r#"{"kind":"node_selection","indices":[3]}"#).unwrap();
        assert_eq!(event, UserEvent::NodeSelection { indices: vec![3] });
        let event: UserEvent =
            serde_json::from_str(r#"{"kind":"toggle_umatrix","active":true}"#).unwrap();
        assert_eq!(event, UserEvent::ToggleUMatrix { active: true });
    }
}
