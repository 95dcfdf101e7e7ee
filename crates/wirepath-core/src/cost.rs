//! Cell cost taxonomy and routing weights.
//!
//! Grid cells carry a tagged [`CellCost`] rather than raw integers; the
//! mapping to numeric weights happens only at the solver boundary, which
//! keeps the monotonic-composition rule explicit in [`crate::grid`].

use serde::{Deserialize, Serialize};

/// Classification of a planning-grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellCost {
    /// Open canvas, base traversal cost.
    Walkable,
    /// Carved exit lane from a pin through its own node's halo.
    Corridor,
    /// A cell another committed route passes through. Cheap to cross.
    LinkCore,
    /// Soft buffer around an obstacle.
    Halo,
    /// 4-neighborhood of another route. Expensive to run alongside.
    LinkRing,
    /// Obstacle interior. Never expanded by the solver.
    Blocked,
}

impl CellCost {
    /// Traversal weight under a cost model, `None` for blocked cells.
    pub fn weight(self, model: &CostModel) -> Option<u32> {
        match self {
            CellCost::Walkable => Some(model.walkable_weight),
            CellCost::Corridor => Some(model.corridor_weight),
            CellCost::LinkCore => Some(model.link_core_weight),
            CellCost::Halo => Some(model.halo_weight),
            CellCost::LinkRing => Some(model.link_ring_weight),
            CellCost::Blocked => None,
        }
    }
}

/// Tunable routing weights and scheduler timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostModel {
    /// Weight of an untouched cell.
    pub walkable_weight: u32,
    /// Weight of a carved pin-exit cell.
    pub corridor_weight: u32,
    /// Weight of a cell on another committed route.
    pub link_core_weight: u32,
    /// Weight of an obstacle halo cell.
    pub halo_weight: u32,
    /// Weight of a cell adjacent to another committed route.
    pub link_ring_weight: u32,
    /// Halo ring width around obstacles, in cells.
    pub halo_cells: usize,
    /// Region padding beyond the endpoint bounding box, in cells.
    pub padding_cells: usize,
    /// Upper bound on corridor length, in cells.
    pub corridor_max_cells: usize,
    /// Congestion sampling step as a fraction of one cell.
    pub congestion_sample_fraction: f64,
    /// Minimum rendered segment length as a fraction of one cell.
    pub min_segment_fraction: f64,
    /// Expand to 8-connectivity.
    pub allow_diagonal: bool,
    /// Settle delay between invalidation and solve start.
    pub debounce_ms: u64,
    /// Solver expansions per cooperative scheduling turn.
    pub solver_batch_size: usize,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            walkable_weight: 1,
            corridor_weight: 1,
            link_core_weight: 3,
            halo_weight: 6,
            link_ring_weight: 9,
            halo_cells: 2,
            padding_cells: 8,
            corridor_max_cells: 24,
            congestion_sample_fraction: 0.5,
            min_segment_fraction: 0.45,
            allow_diagonal: false,
            debounce_ms: 40,
            solver_batch_size: 256,
        }
    }
}

impl CostModel {
    /// Cheapest possible entering weight, used for the admissible heuristic.
    pub fn min_weight(&self) -> u32 {
        self.walkable_weight
            .min(self.corridor_weight)
            .min(self.link_core_weight)
            .min(self.halo_weight)
            .min(self.link_ring_weight)
            .max(1)
    }
}
