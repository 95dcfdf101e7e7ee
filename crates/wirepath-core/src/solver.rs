//! Resumable weighted grid search.
//!
//! A* over the planning grid with integer costs. The open and closed sets
//! live inside the solver value, so the canvas scheduler can expand a
//! bounded batch of nodes per turn and yield back to the event loop between
//! batches. Ties are broken on `(f, g, row, col)` so repeated solves over an
//! unchanged grid return identical paths.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::cost::CostModel;
use crate::grid::{Cell, PlanningGrid};

const ORTHOGONAL_OFFSETS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const DIAGONAL_OFFSETS: [(isize, isize); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

/// Outcome of one solver batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveProgress {
    /// Budget exhausted, more expansions needed.
    InProgress,
    /// Start-to-goal cell path, both endpoints included.
    Found(Vec<Cell>),
    /// No path exists (or start/goal blocked).
    Exhausted,
}

// Field order is the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OpenNode {
    f: u32,
    g: u32,
    cell: Cell,
}

/// Incremental A* over a borrowed [`PlanningGrid`].
pub struct GridSolver<'g> {
    grid: &'g PlanningGrid,
    model: &'g CostModel,
    goal: Cell,
    min_step: u32,
    open: BinaryHeap<Reverse<OpenNode>>,
    g_score: HashMap<Cell, u32>,
    came_from: HashMap<Cell, Cell>,
    closed: HashSet<Cell>,
    visited: usize,
    done: bool,
}

impl<'g> GridSolver<'g> {
    pub fn new(grid: &'g PlanningGrid, start: Cell, goal: Cell, model: &'g CostModel) -> Self {
        let mut solver = Self {
            grid,
            model,
            goal,
            min_step: model.min_weight(),
            open: BinaryHeap::new(),
            g_score: HashMap::new(),
            came_from: HashMap::new(),
            closed: HashSet::new(),
            visited: 0,
            done: false,
        };
        if grid.is_blocked(start) || grid.is_blocked(goal) {
            solver.done = true;
            return solver;
        }
        solver.g_score.insert(start, 0);
        solver.open.push(Reverse(OpenNode {
            f: solver.heuristic(start),
            g: 0,
            cell: start,
        }));
        solver
    }

    fn heuristic(&self, cell: Cell) -> u32 {
        let dr = cell.row.abs_diff(self.goal.row) as u32;
        let dc = cell.col.abs_diff(self.goal.col) as u32;
        let cells = if self.model.allow_diagonal {
            dr.max(dc)
        } else {
            dr + dc
        };
        cells * self.min_step
    }

    fn neighbor_offsets(&self) -> &'static [(isize, isize)] {
        if self.model.allow_diagonal {
            &DIAGONAL_OFFSETS
        } else {
            &ORTHOGONAL_OFFSETS
        }
    }

    /// Nodes expanded so far, across all batches.
    pub fn nodes_visited(&self) -> usize {
        self.visited
    }

    /// Expand up to `max_expansions` nodes, then hand control back.
    pub fn step(&mut self, max_expansions: usize) -> SolveProgress {
        if self.done {
            return SolveProgress::Exhausted;
        }
        let mut expanded = 0usize;
        while expanded < max_expansions.max(1) {
            let Some(Reverse(node)) = self.open.pop() else {
                self.done = true;
                return SolveProgress::Exhausted;
            };
            if self.closed.contains(&node.cell) {
                continue;
            }
            let best = self.g_score.get(&node.cell).copied().unwrap_or(u32::MAX);
            if node.g > best {
                continue;
            }

            expanded += 1;
            self.visited += 1;

            if node.cell == self.goal {
                self.done = true;
                return SolveProgress::Found(self.reconstruct());
            }
            self.closed.insert(node.cell);

            for &(dr, dc) in self.neighbor_offsets() {
                let Some(next) = self.grid.offset(node.cell, dr, dc) else {
                    continue;
                };
                if self.closed.contains(&next) {
                    continue;
                }
                // entering cost is the destination cell's weight; blocked
                // cells are never expanded
                let Some(weight) = self.grid.cost(next).weight(self.model) else {
                    continue;
                };
                let tentative = node.g.saturating_add(weight);
                if tentative < self.g_score.get(&next).copied().unwrap_or(u32::MAX) {
                    self.g_score.insert(next, tentative);
                    self.came_from.insert(next, node.cell);
                    self.open.push(Reverse(OpenNode {
                        f: tentative.saturating_add(self.heuristic(next)),
                        g: tentative,
                        cell: next,
                    }));
                }
            }
        }
        SolveProgress::InProgress
    }

    /// Drive the search to a terminal state. For tests and synchronous
    /// callers; the scheduler steps in batches instead.
    pub fn run_to_completion(&mut self) -> SolveProgress {
        loop {
            match self.step(1024) {
                SolveProgress::InProgress => continue,
                progress => return progress,
            }
        }
    }

    /// Total path cost of a raw cell path under this grid and model.
    pub fn path_cost(&self, path: &[Cell]) -> u32 {
        path.iter()
            .skip(1)
            .map(|&cell| self.grid.cost(cell).weight(self.model).unwrap_or(u32::MAX))
            .sum()
    }

    fn reconstruct(&self) -> Vec<Cell> {
        let mut path = vec![self.goal];
        let mut current = self.goal;
        while let Some(&previous) = self.came_from.get(&current) {
            path.push(previous);
            current = previous;
        }
        path.reverse();
        path
    }
}
