//! Data Loader: reads a GeoJSON layer into a geometry table and standardizes
//! its numeric attribute columns into the observation table used for training.

use std::{
    fs,
    path::{Path, PathBuf},
};

use geo::{LineString, MultiPolygon, Polygon};
use geojson::{FeatureCollection, GeoJson, PolygonType, Value};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::error::{LoadError, ScaleError};

/// Grid-key columns carried through scaling untouched.
pub const DEFAULT_GRID_KEYS: [&str; 2] = ["hex_x", "hex_y"];

/// One input feature: its shape plus the original attribute values.
#[derive(Debug, Clone)]
pub struct Region {
    pub geometry: MultiPolygon<f64>,
    pub attributes: Map<String, JsonValue>,
}

/// Geometries and unscaled attributes in input order.
#[derive(Debug, Clone)]
pub struct GeometryTable {
    pub source: PathBuf,
    pub regions: Vec<Region>,
    /// Columns holding a JSON number on every row, in first-seen order.
    pub numeric_columns: Vec<String>,
}

impl GeometryTable {
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Values of a numeric column, or `None` when the column is not numeric.
    pub fn numeric_column(&self, name: &str) -> Option<Vec<f64>> {
        if !self.numeric_columns.iter().any(|c| c == name) {
            return None;
        }
        self.regions
            .iter()
            .map(|region| region.attributes.get(name).and_then(JsonValue::as_f64))
            .collect()
    }

    /// Build a table from an already parsed collection.
    pub fn from_collection(
        source: impl Into<PathBuf>,
        collection: FeatureCollection,
    ) -> Result<Self, LoadError> {
        let mut regions = Vec::with_capacity(collection.features.len());
        for (index, feature) in collection.features.into_iter().enumerate() {
            let geometry = feature
                .geometry
                .ok_or(LoadError::MissingGeometry { index })?;
            let geometry = to_multi_polygon(index, geometry.value)?;
            regions.push(Region {
                geometry,
                attributes: feature.properties.unwrap_or_default(),
            });
        }

        let numeric_columns = detect_numeric_columns(&regions);
        Ok(Self {
            source: source.into(),
            regions,
            numeric_columns,
        })
    }

    /// Parse GeoJSON text; `source` is only used for error reporting.
    pub fn parse(source: impl Into<PathBuf>, text: &str) -> Result<Self, LoadError> {
        let source = source.into();
        let parsed = text.parse::<GeoJson>().map_err(|err| LoadError::Parse {
            path: source.clone(),
            source: err,
        })?;
        match parsed {
            GeoJson::FeatureCollection(collection) => Self::from_collection(source, collection),
            _ => Err(LoadError::NotACollection { path: source }),
        }
    }
}

/// Read a GeoJSON `FeatureCollection` from disk.
pub fn load(path: impl AsRef<Path>) -> Result<GeometryTable, LoadError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !matches!(extension.as_str(), "geojson" | "json") {
        return Err(LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        });
    }

    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = GeometryTable::parse(path, &text)?;
    info!(
        "Loaded {} regions with {} numeric columns from {}",
        table.len(),
        table.numeric_columns.len(),
        path.display()
    );
    Ok(table)
}

/// A column passed through scaling unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct GridKeyColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// Standardized feature matrix, one row per region in input order.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    pub feature_names: Vec<String>,
    /// Shape `(observations, features)`.
    pub features: Array2<f64>,
    pub grid_keys: Vec<GridKeyColumn>,
    /// Zero-variance columns that were standardized to all zeros.
    pub constant_columns: Vec<String>,
}

impl ObservationTable {
    pub fn from_features(feature_names: Vec<String>, features: Array2<f64>) -> Self {
        Self {
            feature_names,
            features,
            grid_keys: Vec::new(),
            constant_columns: Vec::new(),
        }
    }

    pub fn n_observations(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.features.row(index)
    }
}

/// Standardize every numeric column not listed in `exclude` or `grid_keys`.
///
/// Zero-variance columns become all zeros instead of NaN. Grid keys present in
/// the table are copied unscaled into [`ObservationTable::grid_keys`]. The
/// geometry table is handed back unchanged.
pub fn scale(
    table: GeometryTable,
    exclude: &[String],
    grid_keys: &[String],
) -> Result<(ObservationTable, GeometryTable), ScaleError> {
    if table.is_empty() {
        return Err(ScaleError::Empty);
    }

    let feature_names: Vec<String> = table
        .numeric_columns
        .iter()
        .filter(|name| !exclude.contains(name) && !grid_keys.contains(name))
        .cloned()
        .collect();
    if feature_names.is_empty() {
        return Err(ScaleError::NoNumericColumns);
    }

    let rows = table.len();
    let mut features = Array2::<f64>::zeros((rows, feature_names.len()));
    for (col, name) in feature_names.iter().enumerate() {
        if let Some(values) = table.numeric_column(name) {
            features.column_mut(col).assign(&Array1::from(values));
        }
    }

    let mut constant_columns = Vec::new();
    for (col, mut column) in features.axis_iter_mut(Axis(1)).enumerate() {
        let mean = column.sum() / rows as f64;
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / rows as f64;
        let std = variance.sqrt();
        if std <= 10.0 * f64::EPSILON * mean.abs().max(1.0) {
            warn!(
                "Column {} has zero variance; standardized to zeros",
                feature_names[col]
            );
            column.fill(0.0);
            constant_columns.push(feature_names[col].clone());
        } else {
            column.mapv_inplace(|v| (v - mean) / std);
        }
    }

    let grid_keys = grid_keys
        .iter()
        .filter_map(|name| {
            table.numeric_column(name).map(|values| GridKeyColumn {
                name: name.clone(),
                values,
            })
        })
        .collect::<Vec<_>>();

    debug!(
        "Standardized {} columns over {} rows ({} grid keys kept)",
        feature_names.len(),
        rows,
        grid_keys.len()
    );

    Ok((
        ObservationTable {
            feature_names,
            features,
            grid_keys,
            constant_columns,
        },
        table,
    ))
}

fn detect_numeric_columns(regions: &[Region]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for region in regions {
        for key in region.attributes.keys() {
            if !seen.iter().any(|s| s == key) {
                seen.push(key.clone());
            }
        }
    }
    seen.retain(|key| {
        regions.iter().all(|region| {
            region
                .attributes
                .get(key)
                .map_or(false, |value| value.is_number())
        })
    });
    seen
}

fn to_multi_polygon(index: usize, value: Value) -> Result<MultiPolygon<f64>, LoadError> {
    match value {
        Value::Polygon(rings) => Ok(MultiPolygon::new(vec![to_polygon(rings)])),
        Value::MultiPolygon(polygons) => Ok(MultiPolygon::new(
            polygons.into_iter().map(to_polygon).collect(),
        )),
        other => Err(LoadError::UnsupportedGeometry {
            index,
            kind: geometry_kind(&other).to_string(),
        }),
    }
}

fn to_polygon(rings: PolygonType) -> Polygon<f64> {
    let mut rings = rings.into_iter().map(|ring| {
        LineString::from(
            ring.into_iter()
                .filter(|position| position.len() >= 2)
                .map(|position| (position[0], position[1]))
                .collect::<Vec<_>>(),
        )
    });
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Polygon::new(exterior, rings.collect())
}

fn geometry_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}
