//! Quantized endpoint signatures for route cache validity.

use wirepath_core::geometry::PlanPoint;

/// Cache key for a committed route: both endpoints quantized to half a
/// grid cell. Two endpoint pairs with the same signature would rasterize
/// to the same start/goal cells, so the cached path is still valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteSignature([i64; 4]);

impl RouteSignature {
    /// Build a signature from planning-space endpoints.
    pub fn quantize(start: PlanPoint, end: PlanPoint, resolution: f64) -> Self {
        let quantum = (resolution * 0.5).max(f64::EPSILON);
        let q = |v: f64| (v / quantum).round() as i64;
        Self([q(start.x), q(start.y), q(end.x), q(end.y)])
    }
}
