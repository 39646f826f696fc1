//! Annotation geometry for viewer overlays.
//!
//! Annotation tables (cell segmentations, tissue regions) hold one polygon
//! or multipolygon per row. The viewer draws them from flat vertex lists, so
//! [`extract`] selects the rows touching a crop region and flattens each
//! polygon into a [`GeometryRecord`].
//!
//! ```text
//! ┌───────────────────┐   intersecting()   ┌──────────────┐   extract()   ┌────────────────┐
//! │  AnnotationTable  │ ─────────────────► │ selected rows│ ────────────► │ GeometryRecord │
//! │  (rows + R-tree)  │     CropRegion     └──────────────┘  labels, rings│  {vertices,    │
//! └───────────────────┘                                     or centroids  │   label, holes}│
//!                                                                         └────────────────┘
//! ```

mod extract;
mod geometry;
mod table;

pub use extract::{
    extract, AnnotationResponse, CropRegion, ExtractOptions, GeometryRecord, DEFAULT_CROP_EXTENT,
    MAX_VIEWPORT_HEIGHT,
};
pub use geometry::{open_ring, Bounds, Coord, Geometry, Polygon};
pub use table::{AnnotationRow, AnnotationTable};
