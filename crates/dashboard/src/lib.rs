//! Presentation model of the SOM dashboard: palettes, the three linked views
//! and the selection-sync state machine that keeps them consistent.

pub mod palette;
pub mod selection;
pub mod views;

pub use palette::{CATEGORY10, LinearColorMapper, cluster_palette, viridis};
pub use selection::{
    ColorMode, LinkedSelection, SelectionLinks, SelectionSnapshot, SelectionSource, SourceId,
    UserEvent,
};
pub use views::{
    ClusterButton, DashboardViews, HexOrientation, LegendEntry, NodeRecord, NodeView,
    RegionRecord, RegionView, ToggleWidget, hex_center, node_center,
};
