//! Points and bounding boxes in the catalog's geographic coordinates.

use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// A point record awaiting (or carrying) a ground elevation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Row identifier of the record in the inventory.
    pub id: i64,
    /// Longitude in decimal degrees.
    pub x: f64,
    /// Latitude in decimal degrees.
    pub y: f64,
    /// Ground elevation in meters, `None` until sampled.
    #[serde(default)]
    pub elevation: Option<f64>,
}

impl Point {
    /// Create a point without elevation.
    pub fn new(id: i64, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            elevation: None,
        }
    }

    /// Whether an elevation has been resolved for this point.
    pub fn has_elevation(&self) -> bool {
        self.elevation.is_some()
    }
}

/// Geographic bounds, inclusive on every edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// Western edge.
    pub min_x: f64,
    /// Eastern edge.
    pub max_x: f64,
    /// Southern edge.
    pub min_y: f64,
    /// Northern edge.
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a box from its edges, in the field order.
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// True for the all-zero box produced by an empty point collection.
    ///
    /// Such a box means "no data", not a region around the origin.
    pub fn is_empty(&self) -> bool {
        *self == BoundingBox::default()
    }

    /// East-west extent.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// North-south extent.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if a point lies within the box (edges included).
    pub fn contains(&self, point: &Point) -> bool {
        self.min_x <= point.x
            && point.x <= self.max_x
            && self.min_y <= point.y
            && point.y <= self.max_y
    }

    /// Check if two boxes share any area or edge.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Points contained by the box, in their original order.
    pub fn intersect(&self, points: &[Point]) -> Points {
        points.iter().filter(|p| self.contains(p)).copied().collect()
    }

    /// Mutable references to the points contained by the box, in order.
    pub fn intersect_mut<'a>(&self, points: &'a mut [Point]) -> Vec<&'a mut Point> {
        points.iter_mut().filter(|p| self.contains(p)).collect()
    }

    /// Catalog `bbox` parameter: `minX,minY,maxX,maxY`.
    pub fn bbox_param(&self) -> String {
        format!(
            "{:.6},{:.6},{:.6},{:.6}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// Ordered collection of points, owned by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Points(Vec<Point>);

impl Points {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a point.
    pub fn push(&mut self, point: Point) {
        self.0.push(point);
    }

    /// Unwrap into the underlying vector.
    pub fn into_inner(self) -> Vec<Point> {
        self.0
    }

    /// Tight envelope of all coordinates, or the zero box when empty.
    pub fn bounding_box(&self) -> BoundingBox {
        let mut points = self.0.iter();
        let Some(first) = points.next() else {
            return BoundingBox::default();
        };

        let mut bbox = BoundingBox::new(first.x, first.x, first.y, first.y);
        for point in points {
            bbox.min_x = bbox.min_x.min(point.x);
            bbox.max_x = bbox.max_x.max(point.x);
            bbox.min_y = bbox.min_y.min(point.y);
            bbox.max_y = bbox.max_y.max(point.y);
        }
        bbox
    }

    /// True if at least one point lies inside `bbox`.
    pub fn is_intersecting(&self, bbox: &BoundingBox) -> bool {
        self.0.iter().any(|p| bbox.contains(p))
    }

    /// Number of points still lacking an elevation.
    pub fn unresolved(&self) -> usize {
        self.0.iter().filter(|p| !p.has_elevation()).count()
    }
}

impl Deref for Points {
    type Target = [Point];

    fn deref(&self) -> &[Point] {
        &self.0
    }
}

impl DerefMut for Points {
    fn deref_mut(&mut self) -> &mut [Point] {
        &mut self.0
    }
}

impl From<Vec<Point>> for Points {
    fn from(points: Vec<Point>) -> Self {
        Self(points)
    }
}

impl FromIterator<Point> for Points {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Points {
    type Item = Point;
    type IntoIter = std::vec::IntoIter<Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Points {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
