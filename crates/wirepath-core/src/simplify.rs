//! Polyline refinement: raw cell paths in, renderable connector lines out.

use crate::cost::CostModel;
use crate::geometry::{PlanPoint, Polyline};
use crate::grid::{Cell, PlanningGrid};

fn direction(a: PlanPoint, b: PlanPoint) -> (i8, i8) {
    let eps = crate::geometry::COORD_EPS;
    let sx = if (b.x - a.x).abs() <= eps {
        0
    } else if b.x > a.x {
        1
    } else {
        -1
    };
    let sy = if (b.y - a.y).abs() <= eps {
        0
    } else if b.y > a.y {
        1
    } else {
        -1
    };
    (sx, sy)
}

/// Collapse consecutive points that continue in the same unit direction.
/// Idempotent: re-running on its own output is a no-op.
pub fn simplify_orthogonal(path: &[PlanPoint]) -> Polyline {
    let mut points: Polyline = Vec::with_capacity(path.len());
    for &point in path {
        let duplicate = points
            .last()
            .map(|last| last.approx_eq(point))
            .unwrap_or(false);
        if !duplicate {
            points.push(point);
        }
    }
    if points.len() <= 2 {
        return points;
    }

    let mut out = vec![points[0]];
    for i in 1..points.len() - 1 {
        let previous = out[out.len() - 1];
        let incoming = direction(previous, points[i]);
        let outgoing = direction(points[i], points[i + 1]);
        if incoming != outgoing {
            out.push(points[i]);
        }
    }
    out.push(points[points.len() - 1]);
    out
}

/// Drop interior waypoints that create a jog shorter than `min_len`. The
/// first and last points are always kept.
pub fn prune_short_jogs(path: &[PlanPoint], min_len: f64) -> Polyline {
    if path.len() <= 2 {
        return path.to_vec();
    }
    let mut out: Polyline = vec![path[0]];
    for (i, &point) in path.iter().enumerate().skip(1) {
        if i + 1 < path.len() {
            let last = out[out.len() - 1];
            if last.distance(point) < min_len {
                continue;
            }
        }
        out.push(point);
    }
    out
}

/// Join the cell-center path to the exact pin coordinates with short
/// orthogonal segments, preferring the axis of greater displacement first.
pub fn stitch_endpoints(path: &[PlanPoint], start: PlanPoint, end: PlanPoint) -> Polyline {
    let Some(&first) = path.first() else {
        return elbow_fallback(start, end);
    };

    let mut out: Polyline = Vec::with_capacity(path.len() + 4);
    out.push(start);
    if !first.approx_eq(start) {
        let corner = if (first.x - start.x).abs() >= (first.y - start.y).abs() {
            PlanPoint::new(first.x, start.y)
        } else {
            PlanPoint::new(start.x, first.y)
        };
        if !corner.approx_eq(start) && !corner.approx_eq(first) {
            out.push(corner);
        }
        out.push(first);
    }
    out.extend_from_slice(&path[1..]);

    if let Some(&last) = out.last() {
        if !last.approx_eq(end) {
            let corner = if (end.x - last.x).abs() >= (end.y - last.y).abs() {
                PlanPoint::new(end.x, last.y)
            } else {
                PlanPoint::new(last.x, end.y)
            };
            if !corner.approx_eq(last) && !corner.approx_eq(end) {
                out.push(corner);
            }
            out.push(end);
        }
    }
    out
}

/// Full post-processing pipeline from a raw cell path to a renderable
/// polyline anchored exactly at the two pin coordinates.
pub fn refine_path(
    raw: &[Cell],
    grid: &PlanningGrid,
    start: PlanPoint,
    end: PlanPoint,
    model: &CostModel,
) -> Polyline {
    let centers: Polyline = raw.iter().map(|&cell| grid.center_of(cell)).collect();
    let simplified = simplify_orthogonal(&centers);
    let pruned = prune_short_jogs(&simplified, model.min_segment_fraction * grid.resolution());
    let stitched = stitch_endpoints(&pruned, start, end);
    simplify_orthogonal(&stitched)
}

/// Three-segment elbow used while no committed path exists: straight out,
/// one perpendicular jog at the horizontal midpoint, straight in. Grid
/// independent and cheap.
pub fn elbow_fallback(start: PlanPoint, end: PlanPoint) -> Polyline {
    let mid_x = (start.x + end.x) / 2.0;
    simplify_orthogonal(&[
        start,
        PlanPoint::new(mid_x, start.y),
        PlanPoint::new(mid_x, end.y),
        end,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::CostModel;
    use crate::grid::{GridBuilder, RouteRequest};
    use crate::solver::{GridSolver, SolveProgress};

    fn p(x: f64, y: f64) -> PlanPoint {
        PlanPoint::new(x, y)
    }

    #[test]
    fn collinear_runs_collapse_to_segments() {
        let raw = vec![p(0.5, 0.5), p(1.5, 0.5), p(2.5, 0.5), p(2.5, 1.5), p(2.5, 2.5)];
        let simplified = simplify_orthogonal(&raw);
        assert_eq!(simplified, vec![p(0.5, 0.5), p(2.5, 0.5), p(2.5, 2.5)]);
    }

    #[test]
    fn simplification_is_idempotent() {
        let raw = vec![
            p(0.5, 0.5),
            p(1.5, 0.5),
            p(2.5, 0.5),
            p(2.5, 1.5),
            p(3.5, 1.5),
            p(4.5, 1.5),
            p(4.5, 0.5),
        ];
        let once = simplify_orthogonal(&raw);
        let twice = simplify_orthogonal(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn duplicate_points_are_dropped() {
        let raw = vec![p(0.0, 0.0), p(0.0, 0.0), p(3.0, 0.0), p(3.0, 0.0)];
        assert_eq!(simplify_orthogonal(&raw), vec![p(0.0, 0.0), p(3.0, 0.0)]);
    }

    #[test]
    fn micro_jogs_are_pruned() {
        let path = vec![p(0.0, 0.0), p(5.0, 0.0), p(5.0, 0.2), p(10.0, 0.2)];
        let pruned = prune_short_jogs(&path, 0.45);
        assert_eq!(pruned, vec![p(0.0, 0.0), p(5.0, 0.0), p(10.0, 0.2)]);
    }

    #[test]
    fn pruning_keeps_exact_endpoints() {
        let path = vec![p(0.0, 0.0), p(0.1, 0.0), p(9.0, 0.0), p(9.0, 0.1)];
        let pruned = prune_short_jogs(&path, 0.45);
        assert_eq!(pruned.first(), Some(&p(0.0, 0.0)));
        assert_eq!(pruned.last(), Some(&p(9.0, 0.1)));
    }

    #[test]
    fn stitching_reaches_the_exact_pins() {
        let path = vec![p(1.5, 2.5), p(7.5, 2.5)];
        let start = p(1.1, 2.2);
        let end = p(7.9, 2.8);
        let stitched = stitch_endpoints(&path, start, end);
        assert_eq!(stitched.first(), Some(&start));
        assert_eq!(stitched.last(), Some(&end));
        // joining segments stay orthogonal
        for pair in stitched.windows(2) {
            let d = direction(pair[0], pair[1]);
            assert!(d.0 == 0 || d.1 == 0, "diagonal join {pair:?}");
        }
    }

    #[test]
    fn elbow_has_single_perpendicular_jog() {
        let elbow = elbow_fallback(p(0.0, 0.0), p(10.0, 6.0));
        assert_eq!(elbow, vec![p(0.0, 0.0), p(5.0, 0.0), p(5.0, 6.0), p(10.0, 6.0)]);
    }

    #[test]
    fn elbow_degenerates_to_straight_segment() {
        let elbow = elbow_fallback(p(0.0, 3.0), p(8.0, 3.0));
        assert_eq!(elbow, vec![p(0.0, 3.0), p(8.0, 3.0)]);
    }

    #[test]
    fn straight_route_refines_to_single_segment() {
        // start (0,0), end (4,0) on a 1-unit grid: one straight segment of
        // length 4 anchored exactly at the pins
        let model = CostModel::default();
        let builder = GridBuilder::new(1.0, &model);
        let request = RouteRequest {
            start: p(0.0, 0.0),
            end: p(4.0, 0.0),
            start_owner: None,
            end_owner: None,
        };
        let grid = builder.build(&request, &[], &[]);
        let start_cell = grid.cell_at(request.start).unwrap();
        let goal_cell = grid.cell_at(request.end).unwrap();

        let mut solver = GridSolver::new(&grid, start_cell, goal_cell, &model);
        let SolveProgress::Found(raw) = solver.run_to_completion() else {
            panic!("expected a path");
        };
        let path = refine_path(&raw, &grid, request.start, request.end, &model);

        assert_eq!(path.first(), Some(&request.start));
        assert_eq!(path.last(), Some(&request.end));
        let length: f64 = path.windows(2).map(|pair| pair[0].distance(pair[1])).sum();
        assert!((length - 4.0).abs() < 1e-6, "length was {length}");
    }

    #[test]
    fn refined_path_is_anchored_at_offset_pins() {
        let model = CostModel::default();
        let builder = GridBuilder::new(1.0, &model);
        let request = RouteRequest {
            start: p(0.3, 0.7),
            end: p(12.8, 5.1),
            start_owner: None,
            end_owner: None,
        };
        let grid = builder.build(&request, &[], &[]);
        let start_cell = grid.cell_at(request.start).unwrap();
        let goal_cell = grid.cell_at(request.end).unwrap();

        let mut solver = GridSolver::new(&grid, start_cell, goal_cell, &model);
        let SolveProgress::Found(raw) = solver.run_to_completion() else {
            panic!("expected a path");
        };
        let path = refine_path(&raw, &grid, request.start, request.end, &model);

        assert_eq!(path.first(), Some(&request.start));
        assert_eq!(path.last(), Some(&request.end));
        let simplified_again = simplify_orthogonal(&path);
        assert_eq!(path, simplified_again);
    }
}
