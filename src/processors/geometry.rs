//! Geometric utilities for box alignment.
//!
//! This module provides the axis-aligned box used by every stage of the
//! pipeline together with the overlap measures (IoU, one-sided overlap ratio,
//! margin containment) and distances the matchers are built on. All ratio
//! computations return 0.0 for empty intersections and zero-area boxes.

use serde::{Deserialize, Serialize};

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// An axis-aligned bounding box `[x1, y1, x2, y2]`.
///
/// Serialized as a four-element JSON array, which is the layout of both the
/// template schema and the canonical OCR word.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    /// Left edge.
    pub x1: f32,
    /// Top edge.
    pub y1: f32,
    /// Right edge.
    pub x2: f32,
    /// Bottom edge.
    pub y2: f32,
}

impl From<[f32; 4]> for BoundingBox {
    fn from(coords: [f32; 4]) -> Self {
        BoundingBox::from_coords(coords[0], coords[1], coords[2], coords[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(bbox: BoundingBox) -> Self {
        bbox.to_array()
    }
}

impl BoundingBox {
    /// Creates a bounding box from its corner coordinates, as given.
    #[inline]
    pub fn from_coords(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Creates the axis-aligned hull of a set of points via min/max.
    ///
    /// Returns `None` when `points` is empty or contains a non-finite coordinate.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self::from_coords(first.x, first.y, first.x, first.y);
        for p in points {
            if !p.x.is_finite() || !p.y.is_finite() {
                return None;
            }
            bbox.x1 = bbox.x1.min(p.x);
            bbox.y1 = bbox.y1.min(p.y);
            bbox.x2 = bbox.x2.max(p.x);
            bbox.y2 = bbox.y2.max(p.y);
        }
        Some(bbox)
    }

    /// The box as `[x1, y1, x2, y2]`.
    #[inline]
    pub fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Returns a copy with corners reordered so that `x1 <= x2` and `y1 <= y2`.
    pub fn normalized(&self) -> Self {
        Self::from_coords(
            self.x1.min(self.x2),
            self.y1.min(self.y2),
            self.x1.max(self.x2),
            self.y1.max(self.y2),
        )
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Area of the box; 0.0 for degenerate or inverted boxes.
    pub fn area(&self) -> f32 {
        let w = self.width();
        let h = self.height();
        if w <= 0.0 || h <= 0.0 { 0.0 } else { w * h }
    }

    /// True when every coordinate is finite and the box has positive width and height.
    pub fn is_valid(&self) -> bool {
        self.to_array().iter().all(|c| c.is_finite()) && self.x1 < self.x2 && self.y1 < self.y2
    }

    /// Top-left corner.
    #[inline]
    pub fn top_left(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    /// Centre of the box.
    #[inline]
    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Vertical centre of the box.
    #[inline]
    pub fn y_mid(&self) -> f32 {
        (self.y1 + self.y2) / 2.0
    }

    /// Sum of the top-left coordinates, the "left-top-most" sort key.
    #[inline]
    pub fn top_left_score(&self) -> f32 {
        self.x1 + self.y1
    }

    /// Translates the box by `(dx, dy)`.
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self::from_coords(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }

    /// Moves the box so that its top-left corner lands on `anchor`, keeping its size.
    pub fn moved_to(&self, anchor: Point) -> Self {
        Self::from_coords(
            anchor.x,
            anchor.y,
            anchor.x + self.width(),
            anchor.y + self.height(),
        )
    }

    /// Offset from this box's top-left corner to `other`'s.
    pub fn top_left_delta(&self, other: &BoundingBox) -> (f32, f32) {
        (other.x1 - self.x1, other.y1 - self.y1)
    }

    /// Grows the box by `margin` pixels on every side.
    pub fn expand(&self, margin: f32) -> Self {
        Self::from_coords(
            self.x1 - margin,
            self.y1 - margin,
            self.x2 + margin,
            self.y2 + margin,
        )
    }

    /// Computes the area of intersection between this bounding box and another.
    ///
    /// Returns 0.0 if the boxes only touch or do not meet at all.
    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let inter_x_min = self.x1.max(other.x1);
        let inter_y_min = self.y1.max(other.y1);
        let inter_x_max = self.x2.min(other.x2);
        let inter_y_max = self.y2.min(other.y2);

        if inter_x_min >= inter_x_max || inter_y_min >= inter_y_max {
            return 0.0;
        }

        (inter_x_max - inter_x_min) * (inter_y_max - inter_y_min)
    }

    /// Computes the Intersection over Union (IoU) between this bounding box and another.
    ///
    /// The value is symmetric and lies in `[0, 1]`.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter_area = self.intersection_area(other);
        if inter_area <= 0.0 {
            return 0.0;
        }

        let union_area = self.area() + other.area() - inter_area;
        if union_area <= 0.0 {
            return 0.0;
        }

        (inter_area / union_area).min(1.0)
    }

    /// Computes the Intersection over Area (IoA) of this bounding box with another.
    ///
    /// IoA = intersection_area / self_area. This is the directional overlap ratio:
    /// it equals 1.0 whenever `self` lies fully inside `other`, whatever their
    /// relative sizes.
    pub fn ioa(&self, other: &BoundingBox) -> f32 {
        let inter_area = self.intersection_area(other);
        if inter_area <= 0.0 {
            return 0.0;
        }

        let self_area = self.area();
        if self_area <= 0.0 {
            return 0.0;
        }

        (inter_area / self_area).min(1.0)
    }

    /// Intersection divided by the area of the smaller of the two boxes.
    pub fn overlap_with_smaller(&self, other: &BoundingBox) -> f32 {
        let inter_area = self.intersection_area(other);
        if inter_area <= 0.0 {
            return 0.0;
        }

        let smaller = self.area().min(other.area());
        if smaller <= 0.0 {
            return 0.0;
        }

        (inter_area / smaller).min(1.0)
    }

    /// Computes the union (minimum bounding box) of this bounding box and another.
    pub fn union(&self, other: &Self) -> Self {
        Self::from_coords(
            self.x1.min(other.x1),
            self.y1.min(other.y1),
            self.x2.max(other.x2),
            self.y2.max(other.y2),
        )
    }

    /// Union of every box yielded by `boxes`, or `None` when there are none.
    pub fn union_all<'a>(boxes: impl IntoIterator<Item = &'a BoundingBox>) -> Option<Self> {
        boxes
            .into_iter()
            .copied()
            .reduce(|acc, bbox| acc.union(&bbox))
    }

    /// Checks if this box lies within `container` expanded by `margin` pixels.
    ///
    /// A margin of 0.0 is plain containment; a positive margin tolerates
    /// imprecise hand-drawn containers.
    pub fn is_within(&self, container: &BoundingBox, margin: f32) -> bool {
        self.x1 >= container.x1 - margin
            && self.y1 >= container.y1 - margin
            && self.x2 <= container.x2 + margin
            && self.y2 <= container.y2 + margin
    }

    /// True when the boxes overlap or share an edge.
    pub fn touches(&self, other: &BoundingBox) -> bool {
        !(self.x2 < other.x1 || self.x1 > other.x2 || self.y2 < other.y1 || self.y1 > other.y2)
    }

    /// True when `point` lies inside the box, edges included.
    pub fn contains_point(&self, point: &Point) -> bool {
        point.x >= self.x1 && point.x <= self.x2 && point.y >= self.y1 && point.y <= self.y2
    }

    /// Restricts the horizontal extent of the box to `[x_min, x_max]`.
    pub fn clip_x(&self, x_min: f32, x_max: f32) -> Self {
        Self::from_coords(self.x1.max(x_min), self.y1, self.x2.min(x_max), self.y2)
    }

    /// Distance between the top-left corners of two boxes.
    pub fn top_left_distance(&self, other: &BoundingBox) -> f32 {
        self.top_left().distance(&other.top_left())
    }

    /// Distance between the centres of two boxes.
    pub fn center_distance(&self, other: &BoundingBox) -> f32 {
        self.center().distance(&other.center())
    }
}
