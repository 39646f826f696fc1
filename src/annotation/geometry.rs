//! Polygon geometry model.

use serde::{Deserialize, Serialize};

/// A point in slide pixel coordinates (level 0).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Coord {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box, inclusive on every edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Coord,
    pub max: Coord,
}

impl Bounds {
    pub fn new(min: Coord, max: Coord) -> Self {
        Self { min, max }
    }

    /// Whether `point` lies inside or on the edge.
    pub fn contains(&self, point: Coord) -> bool {
        (self.min.x..=self.max.x).contains(&point.x) && (self.min.y..=self.max.y).contains(&point.y)
    }

    /// Corners in ring order, starting at `min`.
    fn corners(&self) -> [Coord; 4] {
        [
            self.min,
            Coord::new(self.max.x, self.min.y),
            self.max,
            Coord::new(self.min.x, self.max.y),
        ]
    }

    fn of(coords: &[Coord]) -> Option<Self> {
        let first = coords.first()?;
        let mut bounds = Bounds {
            min: *first,
            max: *first,
        };
        for c in &coords[1..] {
            bounds.min.x = bounds.min.x.min(c.x);
            bounds.min.y = bounds.min.y.min(c.y);
            bounds.max.x = bounds.max.x.max(c.x);
            bounds.max.y = bounds.max.y.max(c.y);
        }
        Some(bounds)
    }

    fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min: Coord::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Coord::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }
}

// =============================================================================
// Polygon
// =============================================================================

/// A polygon with one exterior ring and zero or more holes.
///
/// Rings may be stored closed (first point repeated at the end) or open.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    exterior: Vec<Coord>,
    interiors: Vec<Vec<Coord>>,
}

impl Polygon {
    pub fn new(exterior: Vec<Coord>, interiors: Vec<Vec<Coord>>) -> Self {
        Self {
            exterior,
            interiors,
        }
    }

    pub fn exterior(&self) -> &[Coord] {
        &self.exterior
    }

    pub fn interiors(&self) -> &[Vec<Coord>] {
        &self.interiors
    }

    pub fn is_empty(&self) -> bool {
        self.exterior.is_empty()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of(&self.exterior)
    }

    /// Area-weighted centroid, with holes subtracted.
    ///
    /// A polygon with no area falls back to the mean of its exterior
    /// vertices, closing point excluded. Returns `None` for an empty polygon.
    pub fn centroid(&self) -> Option<Coord> {
        let exterior = open_ring(&self.exterior);
        if exterior.is_empty() {
            return None;
        }

        let (mut area, mut cx, mut cy) = ring_moments(exterior);
        // Orient so the exterior contributes positive area
        let sign = if area < 0.0 { -1.0 } else { 1.0 };
        area *= sign;
        cx *= sign;
        cy *= sign;

        for hole in &self.interiors {
            let (hole_area, hole_cx, hole_cy) = ring_moments(open_ring(hole));
            let hole_sign = if hole_area < 0.0 { -1.0 } else { 1.0 };
            area -= hole_area * hole_sign;
            cx -= hole_cx * hole_sign;
            cy -= hole_cy * hole_sign;
        }

        if area.abs() > f64::EPSILON {
            return Some(Coord::new(cx / (3.0 * area), cy / (3.0 * area)));
        }

        let n = exterior.len() as f64;
        let (sx, sy) = exterior
            .iter()
            .fold((0.0, 0.0), |(sx, sy), c| (sx + c.x, sy + c.y));
        Some(Coord::new(sx / n, sy / n))
    }

    /// Whether the polygon's area or boundary touches `rect`.
    ///
    /// A rectangle lying entirely inside a hole does not intersect.
    pub fn intersects(&self, rect: &Bounds) -> bool {
        if self.is_empty() {
            return false;
        }

        let rings = || {
            std::iter::once(self.exterior.as_slice())
                .chain(self.interiors.iter().map(Vec::as_slice))
                .map(open_ring)
        };

        if rings().flatten().any(|c| rect.contains(*c)) {
            return true;
        }

        let corners = rect.corners();
        let crosses_rect = |a: Coord, b: Coord| {
            (0..4).any(|i| segments_intersect(a, b, corners[i], corners[(i + 1) % 4]))
        };
        if rings().any(|ring| ring_edges(ring).any(|(a, b)| crosses_rect(a, b))) {
            return true;
        }

        // No boundary contact: the rectangle is wholly inside or outside
        self.contains(corners[0])
    }

    /// Even-odd point-in-polygon test over the exterior and holes.
    fn contains(&self, point: Coord) -> bool {
        let mut inside = false;
        let rings = std::iter::once(self.exterior.as_slice())
            .chain(self.interiors.iter().map(Vec::as_slice))
            .map(open_ring);

        for ring in rings {
            for (a, b) in ring_edges(ring) {
                if (a.y > point.y) != (b.y > point.y)
                    && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
                {
                    inside = !inside;
                }
            }
        }
        inside
    }
}

/// Edges of an open ring, wrapping from the last vertex to the first.
fn ring_edges(ring: &[Coord]) -> impl Iterator<Item = (Coord, Coord)> + '_ {
    let n = if ring.len() < 2 { 0 } else { ring.len() };
    (0..n).map(move |i| (ring[i], ring[(i + 1) % n]))
}

/// Twice the signed area of triangle `abc`.
fn orientation(a: Coord, b: Coord, c: Coord) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Whether `p`, known to be collinear with `a` and `b`, lies on segment `ab`.
fn on_segment(a: Coord, b: Coord, p: Coord) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Closed segment intersection, touching endpoints included.
fn segments_intersect(p1: Coord, p2: Coord, q1: Coord, q2: Coord) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

/// Signed area and first moments (times 3) of a ring, via the shoelace formula.
///
/// Returns `(area, sum_x, sum_y)` where the centroid is `sum / (3 * area)`.
fn ring_moments(ring: &[Coord]) -> (f64, f64, f64) {
    if ring.len() < 3 {
        return (0.0, 0.0, 0.0);
    }

    // Translate to the first vertex to limit cancellation on large coordinates
    let origin = ring[0];
    let mut twice_area = 0.0;
    let mut sx = 0.0;
    let mut sy = 0.0;

    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        let (ax, ay) = (a.x - origin.x, a.y - origin.y);
        let (bx, by) = (b.x - origin.x, b.y - origin.y);

        let cross = ax * by - bx * ay;
        twice_area += cross;
        sx += (ax + bx) * cross;
        sy += (ay + by) * cross;
    }

    let area = twice_area / 2.0;
    // sx / (6A) is the local centroid; shift back by origin * 3A
    (
        area,
        sx / 2.0 + origin.x * 3.0 * area,
        sy / 2.0 + origin.y * 3.0 * area,
    )
}

/// `ring` without its closing point, if the first and last points match.
pub fn open_ring(ring: &[Coord]) -> &[Coord] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

// =============================================================================
// Geometry
// =============================================================================

/// Geometry stored for one annotation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    /// Whether there is no polygon with any vertices.
    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Polygon(polygon) => polygon.is_empty(),
            Geometry::MultiPolygon(polygons) => polygons.iter().all(Polygon::is_empty),
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            Geometry::Polygon(polygon) => polygon.bounds(),
            Geometry::MultiPolygon(polygons) => polygons
                .iter()
                .filter_map(Polygon::bounds)
                .reduce(Bounds::union),
        }
    }

    /// Whether any polygon of the geometry intersects `rect`.
    pub fn intersects(&self, rect: &Bounds) -> bool {
        match self {
            Geometry::Polygon(polygon) => polygon.intersects(rect),
            Geometry::MultiPolygon(polygons) => polygons.iter().any(|p| p.intersects(rect)),
        }
    }
}

impl From<Polygon> for Geometry {
    fn from(polygon: Polygon) -> Self {
        Geometry::Polygon(polygon)
    }
}
