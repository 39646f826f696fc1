//! Spatially indexed annotation rows using an R-tree.

use std::collections::BTreeMap;

use rstar::{RTree, RTreeObject, AABB};

use super::extract::CropRegion;
use super::geometry::{Bounds, Coord, Geometry};

/// One row of an annotation table: a geometry plus tabular attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRow {
    /// Stable identity from the source, when its schema has one
    pub contour_id: Option<i64>,

    pub geometry: Geometry,

    /// Remaining columns, stringified
    pub columns: BTreeMap<String, String>,
}

impl AnnotationRow {
    pub fn new(geometry: impl Into<Geometry>) -> Self {
        Self {
            contour_id: None,
            geometry: geometry.into(),
            columns: BTreeMap::new(),
        }
    }

    pub fn with_contour_id(mut self, contour_id: i64) -> Self {
        self.contour_id = Some(contour_id);
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.columns.insert(name.into(), value.into());
        self
    }

    pub fn column(&self, name: &str) -> Option<&str> {
        self.columns.get(name).map(String::as_str)
    }
}

/// Entry in the spatial index: a row's bounding box and position
#[derive(Debug, Clone)]
struct RowEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for RowEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Annotation rows with a bounding-box index for crop queries.
///
/// Rows with empty geometry are kept (they still occupy a position) but are
/// never returned by a crop query.
pub struct AnnotationTable {
    rows: Vec<AnnotationRow>,
    tree: RTree<RowEntry>,
}

impl AnnotationTable {
    /// Build a table, bulk-loading the spatial index.
    pub fn new(rows: Vec<AnnotationRow>) -> Self {
        let entries = rows
            .iter()
            .enumerate()
            .filter_map(|(index, row)| {
                let bounds = row.geometry.bounds()?;
                Some(RowEntry {
                    index,
                    envelope: AABB::from_corners(
                        [bounds.min.x, bounds.min.y],
                        [bounds.max.x, bounds.max.y],
                    ),
                })
            })
            .collect();

        Self {
            rows,
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn rows(&self) -> &[AnnotationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Contour id of the row at `index`: its own, or its position.
    pub fn contour_id(&self, index: usize) -> Option<i64> {
        let row = self.rows.get(index)?;
        Some(row.contour_id.unwrap_or(index as i64))
    }

    /// Rows whose geometry intersects `region`, in table order.
    ///
    /// The R-tree narrows candidates by bounding box; each candidate is then
    /// tested exactly, so a row whose box overlaps the region while its
    /// polygons do not is left out. A multipolygon row matches when any of
    /// its parts does.
    pub fn intersecting(&self, region: &CropRegion) -> Vec<(usize, &AnnotationRow)> {
        if region.is_empty() {
            return Vec::new();
        }

        let rect = Bounds::new(
            Coord::new(region.x_beg, region.y_beg),
            Coord::new(region.x_end, region.y_end),
        );
        let envelope = AABB::from_corners([rect.min.x, rect.min.y], [rect.max.x, rect.max.y]);
        let mut indices: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.index)
            .filter(|&index| self.rows[index].geometry.intersects(&rect))
            .collect();
        indices.sort_unstable();

        indices
            .into_iter()
            .map(|index| (index, &self.rows[index]))
            .collect()
    }
}

impl FromIterator<AnnotationRow> for AnnotationTable {
    fn from_iter<I: IntoIterator<Item = AnnotationRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl std::fmt::Debug for AnnotationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationTable")
            .field("rows", &self.rows.len())
            .field("indexed", &self.tree.size())
            .finish()
    }
}
