//! Pure routing logic for the wirepath link router.
//!
//! Everything in this crate is synchronous and allocation-local: the canvas
//! runtime builds a [`PlanningGrid`] from a snapshot of the scene, steps a
//! [`GridSolver`] in bounded batches, and refines the resulting cell path
//! into a renderable polyline.

pub mod cost;
pub mod geometry;
pub mod grid;
pub mod simplify;
pub mod solver;

pub use cost::{CellCost, CostModel};
pub use geometry::{PlanPoint, Polyline, Rect};
pub use grid::{Cell, GridBuilder, GridExport, PlanningGrid, RouteRequest};
pub use simplify::{elbow_fallback, refine_path, simplify_orthogonal};
pub use solver::{GridSolver, SolveProgress};
