//! Local planning grid: region selection and rasterization passes.
//!
//! A grid is rebuilt from scratch for every route computation; obstacle and
//! overlay geometry is never cached across builds because nodes move. The
//! region is snapped outward onto the global resolution grid lines so cell
//! centers from separately built grids land on comparable coordinates.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::cost::{CellCost, CostModel};
use crate::geometry::{sample_segment, snap_down, snap_up, PlanPoint, Polyline, Rect};

const ORTHOGONAL_OFFSETS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Grid cell address, row-major from the region's min corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

/// The two endpoints of a route plus their owning node bounds, all in
/// planning coordinates.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub start: PlanPoint,
    pub end: PlanPoint,
    pub start_owner: Option<Rect>,
    pub end_owner: Option<Rect>,
}

/// Weighted occupancy grid over a local planning region.
#[derive(Debug, Clone)]
pub struct PlanningGrid {
    origin: PlanPoint,
    resolution: f64,
    rows: usize,
    cols: usize,
    cells: Vec<CellCost>,
}

impl PlanningGrid {
    pub fn new(origin: PlanPoint, resolution: f64, rows: usize, cols: usize) -> Self {
        Self {
            origin,
            resolution,
            rows,
            cols,
            cells: vec![CellCost::Walkable; rows * cols],
        }
    }

    pub fn origin(&self) -> PlanPoint {
        self.origin
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    fn index(&self, cell: Cell) -> usize {
        cell.row * self.cols + cell.col
    }

    pub fn cost(&self, cell: Cell) -> CellCost {
        self.cells[self.index(cell)]
    }

    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.cost(cell) == CellCost::Blocked
    }

    /// The cell whose center is nearest a planning-space point, if inside
    /// the region. Cell centers sit on the global grid lines, so points
    /// snapped by node placement map onto centers exactly.
    pub fn cell_at(&self, point: PlanPoint) -> Option<Cell> {
        let col = ((point.x - self.origin.x) / self.resolution).round();
        let row = ((point.y - self.origin.y) / self.resolution).round();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        (row < self.rows && col < self.cols).then_some(Cell { row, col })
    }

    /// Planning-space center of a cell.
    pub fn center_of(&self, cell: Cell) -> PlanPoint {
        PlanPoint::new(
            self.origin.x + cell.col as f64 * self.resolution,
            self.origin.y + cell.row as f64 * self.resolution,
        )
    }

    /// Neighbor at a row/col offset, `None` past the region edge.
    pub fn offset(&self, cell: Cell, dr: isize, dc: isize) -> Option<Cell> {
        let row = cell.row.checked_add_signed(dr)?;
        let col = cell.col.checked_add_signed(dc)?;
        (row < self.rows && col < self.cols).then_some(Cell { row, col })
    }

    /// Monotone cost write: a cheaper classification never overwrites a more
    /// expensive one, and `Blocked` always wins. Overlapping rasterization
    /// passes therefore compose independently of their order.
    pub fn raise(&mut self, cell: Cell, cost: CellCost, model: &CostModel) {
        let idx = self.index(cell);
        let current = self.cells[idx];
        if current == CellCost::Blocked {
            return;
        }
        if cost == CellCost::Blocked {
            self.cells[idx] = cost;
            return;
        }
        let current_weight = current.weight(model).unwrap_or(u32::MAX);
        let new_weight = cost.weight(model).unwrap_or(u32::MAX);
        if new_weight > current_weight {
            self.cells[idx] = cost;
        }
    }

    /// The one sanctioned cost-lowering write: corridor carving must punch
    /// through the pin's own halo and node interior.
    pub fn carve(&mut self, cell: Cell) {
        let idx = self.index(cell);
        self.cells[idx] = CellCost::Corridor;
    }

    /// Diagnostic snapshot for visualization overlays.
    pub fn export(&self) -> GridExport {
        GridExport {
            origin: self.origin,
            resolution: self.resolution,
            rows: self.rows,
            cols: self.cols,
            cells: self.cells.clone(),
        }
    }

    fn cell_span(&self, rect: &Rect) -> Option<(Cell, Cell)> {
        let min_col = ((rect.min_x - self.origin.x) / self.resolution).floor() as isize;
        let min_row = ((rect.min_y - self.origin.y) / self.resolution).floor() as isize;
        let max_col = ((rect.max_x - self.origin.x) / self.resolution).ceil() as isize;
        let max_row = ((rect.max_y - self.origin.y) / self.resolution).ceil() as isize;

        let min_col = min_col.max(0) as usize;
        let min_row = min_row.max(0) as usize;
        if min_col >= self.cols || min_row >= self.rows || max_col < 0 || max_row < 0 {
            return None;
        }
        let max_col = (max_col as usize).min(self.cols - 1);
        let max_row = (max_row as usize).min(self.rows - 1);
        Some((
            Cell {
                row: min_row,
                col: min_col,
            },
            Cell {
                row: max_row,
                col: max_col,
            },
        ))
    }
}

/// Serializable grid snapshot. Purely diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridExport {
    pub origin: PlanPoint,
    pub resolution: f64,
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<CellCost>,
}

/// Rasterizes a local planning region into a weighted occupancy grid.
pub struct GridBuilder<'a> {
    resolution: f64,
    model: &'a CostModel,
}

impl<'a> GridBuilder<'a> {
    pub fn new(resolution: f64, model: &'a CostModel) -> Self {
        Self { resolution, model }
    }

    /// Planning region for a request: endpoint bounding box plus padding,
    /// snapped outward to the global grid lines.
    pub fn region(&self, request: &RouteRequest) -> Rect {
        let padding = self.model.padding_cells as f64 * self.resolution;
        Rect::new(
            snap_down(request.start.x.min(request.end.x) - padding, self.resolution),
            snap_down(request.start.y.min(request.end.y) - padding, self.resolution),
            snap_up(request.start.x.max(request.end.x) + padding, self.resolution),
            snap_up(request.start.y.max(request.end.y) + padding, self.resolution),
        )
    }

    /// Run all rasterization passes for one route computation.
    ///
    /// `obstacles` are node bounds intersecting the region (live drag bounds
    /// included); `overlays` are other links' committed paths, already
    /// filtered by the caller.
    pub fn build(
        &self,
        request: &RouteRequest,
        obstacles: &[Rect],
        overlays: &[Polyline],
    ) -> PlanningGrid {
        let region = self.region(request);
        // centers on grid lines: a span of N resolution steps holds N+1 cells
        let cols = ((region.max_x - region.min_x) / self.resolution).round().max(1.0) as usize + 1;
        let rows = ((region.max_y - region.min_y) / self.resolution).round().max(1.0) as usize + 1;
        let mut grid = PlanningGrid::new(
            PlanPoint::new(region.min_x, region.min_y),
            self.resolution,
            rows,
            cols,
        );

        for obstacle in obstacles {
            self.stamp_obstacle(&mut grid, obstacle);
        }
        self.carve_corridor(&mut grid, request.start, request.start_owner.as_ref(), obstacles);
        self.carve_corridor(&mut grid, request.end, request.end_owner.as_ref(), obstacles);
        self.stamp_overlays(&mut grid, overlays);
        grid
    }

    fn stamp_obstacle(&self, grid: &mut PlanningGrid, obstacle: &Rect) {
        debug_assert!(obstacle.is_well_formed(), "malformed obstacle rect: {obstacle:?}");
        if !obstacle.is_well_formed() {
            return;
        }
        let halo = obstacle.expand(self.model.halo_cells as f64 * grid.resolution());
        let Some((min, max)) = grid.cell_span(&halo) else {
            return;
        };
        for row in min.row..=max.row {
            for col in min.col..=max.col {
                let cell = Cell { row, col };
                let center = grid.center_of(cell);
                if obstacle.contains_interior(center) {
                    grid.raise(cell, CellCost::Blocked, self.model);
                } else if halo.contains(center) {
                    grid.raise(cell, CellCost::Halo, self.model);
                }
            }
        }
    }

    /// Carve a low-cost lane from a pin's cell outward through its own
    /// node's interior and halo, along the axis of least distance to that
    /// node's edge. Guarantees the pin cell is traversable and biases the
    /// route to leave the node perpendicular to its edge. The walk stops
    /// short of any other node's interior: only the pin's own node may be
    /// tunneled through.
    fn carve_corridor(
        &self,
        grid: &mut PlanningGrid,
        pin: PlanPoint,
        owner: Option<&Rect>,
        obstacles: &[Rect],
    ) {
        let Some(mut cell) = grid.cell_at(pin) else {
            return;
        };
        grid.carve(cell);
        let Some(owner) = owner else {
            return;
        };
        debug_assert!(owner.is_well_formed(), "malformed owner rect: {owner:?}");
        if !owner.is_well_formed() {
            return;
        }

        let exits = [
            (pin.x - owner.min_x, (0isize, -1isize)),
            (owner.max_x - pin.x, (0, 1)),
            (pin.y - owner.min_y, (-1, 0)),
            (owner.max_y - pin.y, (1, 0)),
        ];
        let Some(&(_, (dr, dc))) = exits
            .iter()
            .min_by(|a, b| a.0.total_cmp(&b.0))
        else {
            return;
        };

        let clear = owner.expand(self.model.halo_cells as f64 * grid.resolution());
        for _ in 0..self.model.corridor_max_cells {
            let Some(next) = grid.offset(cell, dr, dc) else {
                break;
            };
            let center = grid.center_of(next);
            if obstacles
                .iter()
                .any(|rect| rect != owner && rect.contains_interior(center))
            {
                break;
            }
            cell = next;
            grid.carve(cell);
            // one cell past the halo is enough to reach open canvas
            if !clear.contains(center) {
                break;
            }
        }
    }

    /// Congestion pass: cells on another committed route become cheap-to-
    /// cross core cells, their 4-neighborhood becomes an expensive ring.
    fn stamp_overlays(&self, grid: &mut PlanningGrid, overlays: &[Polyline]) {
        let step = (self.model.congestion_sample_fraction * self.resolution)
            .max(self.resolution * 0.125);
        let mut samples: Vec<PlanPoint> = Vec::new();

        for path in overlays {
            samples.clear();
            for pair in path.windows(2) {
                sample_segment(pair[0], pair[1], step, &mut samples);
            }

            let core: HashSet<Cell> = samples
                .iter()
                .filter_map(|&point| grid.cell_at(point))
                .collect();
            let mut ring: HashSet<Cell> = HashSet::new();
            for &cell in &core {
                for (dr, dc) in ORTHOGONAL_OFFSETS {
                    if let Some(neighbor) = grid.offset(cell, dr, dc) {
                        // a route's own core cells must stay cheap to cross
                        if !core.contains(&neighbor) {
                            ring.insert(neighbor);
                        }
                    }
                }
            }

            // Set iteration order is irrelevant here: raise() is monotone,
            // so the resulting grid is order-independent.
            for &cell in &core {
                grid.raise(cell, CellCost::LinkCore, self.model);
            }
            for &cell in &ring {
                grid.raise(cell, CellCost::LinkRing, self.model);
            }
        }
    }
}
