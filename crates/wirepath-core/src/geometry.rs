//! Planning-space geometry primitives.

use serde::{Deserialize, Serialize};

/// Tolerance for treating two planning coordinates as equal.
pub const COORD_EPS: f64 = 1e-9;

/// A point in planning coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Self) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn approx_eq(self, other: Self) -> bool {
        (self.x - other.x).abs() <= COORD_EPS && (self.y - other.y).abs() <= COORD_EPS
    }
}

/// An ordered list of planning-space points, rendered as connected segments.
pub type Polyline = Vec<PlanPoint>;

/// Axis-aligned rectangle in planning coordinates (node bounds, grid regions).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }

    pub fn expand(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Containment including the boundary.
    pub fn contains(&self, point: PlanPoint) -> bool {
        point.x >= self.min_x
            && point.x <= self.max_x
            && point.y >= self.min_y
            && point.y <= self.max_y
    }

    /// Strict interior containment. Cell centers sitting exactly on a node
    /// edge stay traversable.
    pub fn contains_interior(&self, point: PlanPoint) -> bool {
        point.x > self.min_x && point.x < self.max_x && point.y > self.min_y && point.y < self.max_y
    }
}

/// Snap a coordinate down onto the global resolution grid lines.
pub fn snap_down(value: f64, resolution: f64) -> f64 {
    (value / resolution).floor() * resolution
}

/// Snap a coordinate up onto the global resolution grid lines.
pub fn snap_up(value: f64, resolution: f64) -> f64 {
    (value / resolution).ceil() * resolution
}

/// Sample a segment at roughly `step` spacing, both endpoints included.
pub fn sample_segment(a: PlanPoint, b: PlanPoint, step: f64, out: &mut Vec<PlanPoint>) {
    let length = a.distance(b);
    if !length.is_finite() || step <= 0.0 {
        return;
    }
    let samples = (length / step).ceil().max(1.0) as usize;
    for i in 0..=samples {
        let t = i as f64 / samples as f64;
        out.push(PlanPoint::new(
            a.x + (b.x - a.x) * t,
            a.y + (b.y - a.y) * t,
        ));
    }
}
