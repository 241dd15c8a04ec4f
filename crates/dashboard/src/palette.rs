//! Color palettes and the linear value-to-color mapper used by the views.

use serde::Serialize;

/// The ten-color categorical palette used for cluster ids.
pub const CATEGORY10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Viridis control points; the 256-entry ramp is interpolated between them.
const VIRIDIS_STOPS: [(u8, u8, u8); 11] = [
    (0x44, 0x01, 0x54),
    (0x48, 0x24, 0x75),
    (0x41, 0x44, 0x87),
    (0x35, 0x5f, 0x8d),
    (0x2a, 0x78, 0x8e),
    (0x21, 0x91, 0x8c),
    (0x22, 0xa8, 0x84),
    (0x44, 0xbf, 0x70),
    (0x7a, 0xd1, 0x51),
    (0xbd, 0xdf, 0x26),
    (0xfd, 0xe7, 0x25),
];

/// Category10 repeated until it covers `n_clusters` entries.
pub fn cluster_palette(n_clusters: usize) -> Vec<String> {
    CATEGORY10
        .iter()
        .cycle()
        .take(n_clusters)
        .map(|c| c.to_string())
        .collect()
}

/// A Viridis ramp with `levels` entries (256 for the U-Matrix view).
pub fn viridis(levels: usize) -> Vec<String> {
    if levels == 0 {
        return Vec::new();
    }
    let segments = (VIRIDIS_STOPS.len() - 1) as f64;
    (0..levels)
        .map(|level| {
            let t = if levels == 1 {
                0.0
            } else {
                level as f64 / (levels - 1) as f64
            };
            let pos = t * segments;
            let lower = (pos.floor() as usize).min(VIRIDIS_STOPS.len() - 2);
            let frac = pos - lower as f64;
            let (a, b) = (VIRIDIS_STOPS[lower], VIRIDIS_STOPS[lower + 1]);
            let lerp = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
            hex(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
        })
        .collect()
}

fn hex(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Maps `[low, high]` linearly onto a palette.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinearColorMapper {
    pub low: f64,
    pub high: f64,
    pub palette: Vec<String>,
}

impl LinearColorMapper {
    pub fn new(low: f64, high: f64, palette: Vec<String>) -> Self {
        Self { low, high, palette }
    }

    /// Palette entry for `value`; a flat range maps everything to the first entry.
    pub fn color(&self, value: f64) -> &str {
        if self.palette.is_empty() {
            return "#000000";
        }
        let last = self.palette.len() - 1;
        let span = self.high - self.low;
        let index = if span > 0.0 && value.is_finite() {
            let t = ((value - self.low) / span).clamp(0.0, 1.0);
            ((t * last as f64) as usize).min(last)
        } else {
            0
        };
        &self.palette[index]
    }
}
