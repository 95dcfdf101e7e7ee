//! Router error types.

use thiserror::Error;
use wirepath_core::geometry::Rect;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouteError {
    /// The canvas reported an obstacle rectangle with inverted extents.
    #[error("malformed obstacle bounds {0:?}")]
    MalformedObstacle(Rect),

    /// The coordinate adapter did not invert cleanly at a world position.
    #[error("coordinate adapter failed round trip at ({x}, {y})")]
    AdapterRoundTrip { x: f64, y: f64 },

    /// A pin landed outside the planning region it helped define.
    #[error("endpoint ({x}, {y}) fell outside the planning region")]
    OutsideRegion { x: f64, y: f64 },
}
