//! Conversion of annotation rows into renderable vertex/hole records.
//!
//! # Labels
//!
//! | Options                  | Label                    |
//! |--------------------------|--------------------------|
//! | `label_prefix` set       | `{prefix}_{contour_id}`  |
//! | `label_column` on row    | `{value}_{contour_id}`   |
//! | neither                  | `{contour_id}`           |
//!
//! Parts of a multipolygon with more than one part get `_{index}` appended.

use serde::Serialize;
use tracing::debug;

use super::geometry::{open_ring, Coord, Geometry, Polygon};
use super::table::AnnotationTable;

/// Default crop region edge, in level-0 pixels.
pub const DEFAULT_CROP_EXTENT: f64 = 16000.0;

/// Tallest viewport accepted from the cell viewer.
pub const MAX_VIEWPORT_HEIGHT: i64 = 4000;

// =============================================================================
// Crop Region
// =============================================================================

/// Axis-aligned selection rectangle `[x_beg, y_beg, x_end, y_end]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
    pub x_beg: f64,
    pub y_beg: f64,
    pub x_end: f64,
    pub y_end: f64,
}

impl Default for CropRegion {
    fn default() -> Self {
        Self::new(0.0, 0.0, DEFAULT_CROP_EXTENT, DEFAULT_CROP_EXTENT)
    }
}

impl CropRegion {
    pub fn new(x_beg: f64, y_beg: f64, x_end: f64, y_end: f64) -> Self {
        Self {
            x_beg,
            y_beg,
            x_end,
            y_end,
        }
    }

    /// Region for a viewer viewport at `(x, y)` of size `w` x `h`.
    ///
    /// The origin is clamped to non-negative values, the height to
    /// [`MAX_VIEWPORT_HEIGHT`] and the width to twice the height.
    pub fn from_viewport(x: i64, y: i64, w: i64, h: i64) -> Self {
        let x = x.max(0);
        let y = y.max(0);
        let h = h.min(MAX_VIEWPORT_HEIGHT);
        let w = w.min(h.saturating_mul(2));
        Self::new(
            x as f64,
            y as f64,
            x.saturating_add(w) as f64,
            y.saturating_add(h) as f64,
        )
    }

    /// Whether the region is inverted on either axis (selects nothing).
    pub fn is_empty(&self) -> bool {
        !(self.x_beg <= self.x_end && self.y_beg <= self.y_end)
    }
}

// =============================================================================
// Options and Records
// =============================================================================

/// Options for [`extract`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractOptions {
    /// Overrides any column-derived label
    pub label_prefix: Option<String>,

    /// Column whose value prefixes the label
    pub label_column: Option<String>,

    pub crop_region: CropRegion,

    /// Emit each polygon's centroid instead of its rings
    pub only_center: bool,
}

/// One renderable polygon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeometryRecord {
    pub vertices: Vec<Coord>,

    pub label: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub holes: Option<Vec<Vec<Coord>>>,
}

/// Response body of the annotation endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationResponse {
    pub boxes: Vec<GeometryRecord>,
}

impl From<Vec<GeometryRecord>> for AnnotationResponse {
    fn from(boxes: Vec<GeometryRecord>) -> Self {
        Self { boxes }
    }
}

// =============================================================================
// Extraction
// =============================================================================

/// Convert the rows of `table` touching the crop region into records.
pub fn extract(table: &AnnotationTable, options: &ExtractOptions) -> Vec<GeometryRecord> {
    let selected = table.intersecting(&options.crop_region);
    debug!(
        "Extracting {} of {} annotation rows in {:?}",
        selected.len(),
        table.len(),
        options.crop_region
    );

    let mut records = Vec::new();
    for (index, row) in selected {
        if row.geometry.is_empty() {
            continue;
        }

        let contour_id = row.contour_id.unwrap_or(index as i64);
        let column_value = options
            .label_column
            .as_deref()
            .and_then(|name| row.column(name));
        let label = row_label(contour_id, column_value, options);

        match &row.geometry {
            Geometry::Polygon(polygon) => {
                records.extend(polygon_record(polygon, label, options.only_center));
            }
            Geometry::MultiPolygon(parts) => {
                let suffixed = parts.len() > 1;
                for (i, polygon) in parts.iter().enumerate() {
                    let label = if suffixed {
                        format!("{}_{}", label, i)
                    } else {
                        label.clone()
                    };
                    records.extend(polygon_record(polygon, label, options.only_center));
                }
            }
        }
    }
    records
}

fn row_label(contour_id: i64, column_value: Option<&str>, options: &ExtractOptions) -> String {
    if let Some(ref prefix) = options.label_prefix {
        return format!("{}_{}", prefix, contour_id);
    }
    match column_value {
        Some(value) => format!("{}_{}", value, contour_id),
        None => contour_id.to_string(),
    }
}

/// Record for one polygon, or `None` if it is empty.
fn polygon_record(polygon: &Polygon, label: String, only_center: bool) -> Option<GeometryRecord> {
    if polygon.is_empty() {
        return None;
    }

    if only_center {
        let center = polygon.centroid()?;
        return Some(GeometryRecord {
            vertices: vec![center],
            label,
            holes: None,
        });
    }

    let vertices = open_ring(polygon.exterior()).to_vec();
    let holes: Vec<Vec<Coord>> = polygon
        .interiors()
        .iter()
        .map(|ring| open_ring(ring).to_vec())
        .filter(|ring| !ring.is_empty())
        .collect();

    Some(GeometryRecord {
        vertices,
        label,
        holes: if holes.is_empty() { None } else { Some(holes) },
    })
}
