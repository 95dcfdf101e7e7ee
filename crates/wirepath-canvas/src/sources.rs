//! Collaborator interfaces the router consumes from the host canvas.

use serde::{Deserialize, Serialize};
use wirepath_core::geometry::{PlanPoint, Polyline, Rect};

use crate::error::RouteError;

/// Stable identifier for a link (output pin to input pin connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(pub u64);

/// Which pin of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndSide {
    Source,
    Target,
}

/// One end of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkEnd {
    pub link: LinkId,
    pub side: EndSide,
}

/// Another link's committed path, as seen at grid-build time.
#[derive(Debug, Clone)]
pub struct CommittedRoute {
    pub link: LinkId,
    /// Planning-space polyline.
    pub path: Polyline,
    /// True while either endpoint's node is mid-drag; such routes are
    /// excluded from the congestion pass since their geometry is about to
    /// be stale.
    pub dragging: bool,
}

/// Read-only view of the scene, snapshotted at the start of each grid
/// build. Node bounds and pin positions come in world space and are run
/// through the router's [`CoordinateAdapter`]; committed route paths are
/// already planning-space, since they originate from the router's own
/// updates.
pub trait CanvasSnapshot: Send + Sync {
    /// Node bounds intersecting a world-space query region. Nodes being
    /// dragged must report their live proxy bounds, not last-saved bounds.
    fn obstacles(&self, region: &Rect) -> Vec<Rect>;

    /// World position of a pin.
    fn endpoint(&self, end: LinkEnd) -> (f64, f64);

    /// World bounds of the node owning a pin, for corridor carving.
    fn owner_bounds(&self, end: LinkEnd) -> Option<Rect>;

    /// Other links' current committed paths, in planning coordinates, for
    /// the congestion penalty.
    fn committed_routes(&self, excluding: LinkId) -> Vec<CommittedRoute>;
}

/// Conversion between world/scene coordinates and planning coordinates.
/// Must be bijective; the router checks the round trip in debug builds.
pub trait CoordinateAdapter: Send + Sync {
    fn world_to_plan(&self, x: f64, y: f64) -> PlanPoint;
    fn plan_to_world(&self, point: PlanPoint) -> (f64, f64);
}

/// Adapter for canvases that already plan in world units.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityAdapter;

impl CoordinateAdapter for IdentityAdapter {
    fn world_to_plan(&self, x: f64, y: f64) -> PlanPoint {
        PlanPoint::new(x, y)
    }

    fn plan_to_world(&self, point: PlanPoint) -> (f64, f64) {
        (point.x, point.y)
    }
}

const ROUND_TRIP_EPS: f64 = 1e-6;

/// Check that an adapter inverts cleanly at one world position.
pub fn verify_round_trip<A: CoordinateAdapter + ?Sized>(
    adapter: &A,
    x: f64,
    y: f64,
) -> Result<(), RouteError> {
    let plan = adapter.world_to_plan(x, y);
    let (back_x, back_y) = adapter.plan_to_world(plan);
    if (back_x - x).abs() > ROUND_TRIP_EPS || (back_y - y).abs() > ROUND_TRIP_EPS {
        return Err(RouteError::AdapterRoundTrip { x, y });
    }
    Ok(())
}

/// Convert a world-space rectangle into planning space, renormalizing the
/// corners in case the adapter flips an axis.
pub fn rect_to_plan<A: CoordinateAdapter + ?Sized>(adapter: &A, rect: &Rect) -> Rect {
    let a = adapter.world_to_plan(rect.min_x, rect.min_y);
    let b = adapter.world_to_plan(rect.max_x, rect.max_y);
    Rect::new(
        a.x.min(b.x),
        a.y.min(b.y),
        a.x.max(b.x),
        a.y.max(b.y),
    )
}

/// Convert a planning-space rectangle back into world space.
pub fn rect_to_world<A: CoordinateAdapter + ?Sized>(adapter: &A, rect: &Rect) -> Rect {
    let (ax, ay) = adapter.plan_to_world(PlanPoint::new(rect.min_x, rect.min_y));
    let (bx, by) = adapter.plan_to_world(PlanPoint::new(rect.max_x, rect.max_y));
    Rect::new(ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlippedYAdapter;

    impl CoordinateAdapter for FlippedYAdapter {
        fn world_to_plan(&self, x: f64, y: f64) -> PlanPoint {
            PlanPoint::new(x, -y)
        }

        fn plan_to_world(&self, point: PlanPoint) -> (f64, f64) {
            (point.x, -point.y)
        }
    }

    struct LossyAdapter;

    impl CoordinateAdapter for LossyAdapter {
        fn world_to_plan(&self, x: f64, y: f64) -> PlanPoint {
            PlanPoint::new(x.round(), y.round())
        }

        fn plan_to_world(&self, point: PlanPoint) -> (f64, f64) {
            (point.x, point.y)
        }
    }

    #[test]
    fn identity_adapter_round_trips() {
        assert!(verify_round_trip(&IdentityAdapter, 12.5, -3.25).is_ok());
    }

    #[test]
    fn lossy_adapter_is_rejected() {
        assert!(matches!(
            verify_round_trip(&LossyAdapter, 12.4, 0.0),
            Err(RouteError::AdapterRoundTrip { .. })
        ));
    }

    #[test]
    fn rect_conversion_renormalizes_flipped_axes() {
        let world = Rect::new(0.0, 2.0, 10.0, 8.0);
        let plan = rect_to_plan(&FlippedYAdapter, &world);
        assert!(plan.is_well_formed());
        assert_eq!(plan.min_y, -8.0);
        assert_eq!(plan.max_y, -2.0);

        let back = rect_to_world(&FlippedYAdapter, &plan);
        assert_eq!(back, world);
    }
}
