//! Debounced per-link route cache and cooperative solve scheduler.
//!
//! `current_path` is the synchronous entry point the canvas calls every
//! frame: it always returns a renderable polyline immediately (the
//! committed path or an elbow placeholder) and, when the endpoints have
//! really moved, arms a debounce timer on the tokio runtime. Solves run as
//! spawned tasks, expand the grid search in bounded batches, and yield
//! between batches so long routes never starve the event loop. Fresh paths
//! arrive on the update channel.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use wirepath_core::cost::CostModel;
use wirepath_core::geometry::{PlanPoint, Polyline};
use wirepath_core::grid::{GridBuilder, GridExport, RouteRequest};
use wirepath_core::simplify::{elbow_fallback, refine_path};
use wirepath_core::solver::{GridSolver, SolveProgress};

use crate::error::RouteError;
use crate::signature::RouteSignature;
use crate::sources::{
    rect_to_plan, rect_to_world, verify_round_trip, CanvasSnapshot, CoordinateAdapter, EndSide,
    LinkEnd, LinkId,
};
use crate::state::{transition, Effect, RouteEvent, RouteState, SolveOutcome};

/// A freshly committed path, delivered on the update channel.
#[derive(Debug, Clone)]
pub struct RouteUpdate {
    pub link: LinkId,
    pub path: Polyline,
}

/// Owns the per-link route cache and drives recomputation.
pub struct LinkRouter<S, A> {
    snapshot: S,
    adapter: A,
    model: CostModel,
    resolution: f64,
    links: DashMap<LinkId, RouteState>,
    timers: DashMap<LinkId, tokio::task::AbortHandle>,
    update_tx: mpsc::UnboundedSender<RouteUpdate>,
    update_rx: Mutex<Option<mpsc::UnboundedReceiver<RouteUpdate>>>,
    last_grid: Mutex<Option<GridExport>>,
}

impl<S, A> LinkRouter<S, A>
where
    S: CanvasSnapshot + 'static,
    A: CoordinateAdapter + 'static,
{
    pub fn new(snapshot: S, adapter: A, model: CostModel, resolution: f64) -> Arc<Self> {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            snapshot,
            adapter,
            model,
            resolution,
            links: DashMap::new(),
            timers: DashMap::new(),
            update_tx,
            update_rx: Mutex::new(Some(update_rx)),
            last_grid: Mutex::new(None),
        })
    }

    /// Take the update receiver. Yields `None` after the first call.
    pub fn updates(&self) -> Option<mpsc::UnboundedReceiver<RouteUpdate>> {
        if let Ok(mut slot) = self.update_rx.lock() {
            slot.take()
        } else {
            None
        }
    }

    fn plan_endpoint(&self, end: LinkEnd) -> PlanPoint {
        let (x, y) = self.snapshot.endpoint(end);
        debug_assert!(verify_round_trip(&self.adapter, x, y).is_ok());
        self.adapter.world_to_plan(x, y)
    }

    /// The path to render for a link right now. Never blocks on a solve:
    /// returns the committed path when the endpoints have not meaningfully
    /// moved, otherwise the committed path as-is (or an elbow placeholder
    /// for a brand new link) while scheduling a recompute in the
    /// background.
    pub fn current_path(self: &Arc<Self>, link: LinkId) -> Polyline {
        let start = self.plan_endpoint(LinkEnd {
            link,
            side: EndSide::Source,
        });
        let end = self.plan_endpoint(LinkEnd {
            link,
            side: EndSide::Target,
        });
        let signature = RouteSignature::quantize(start, end, self.resolution);

        let mut spawn_generation = None;
        let rendered = {
            let mut state = self
                .links
                .entry(link)
                .or_insert_with(|| RouteState::new(signature));
            let moved = state.signature != signature;
            let never_solved = state.committed.is_none() && state.generation == 0;
            if moved || never_solved {
                state.signature = signature;
                state.generation += 1;
                let (phase, effect) =
                    transition(state.phase, RouteEvent::EndpointsMoved, state.generation);
                state.phase = phase;
                if effect == Some(Effect::ArmDebounce) {
                    let (phase, _) =
                        transition(state.phase, RouteEvent::DebounceArmed, state.generation);
                    state.phase = phase;
                    spawn_generation = Some(state.generation);
                }
            }
            state
                .committed
                .clone()
                .unwrap_or_else(|| elbow_fallback(start, end))
        };

        if let Some(generation) = spawn_generation {
            let router = Arc::clone(self);
            let handle = tokio::spawn(async move {
                router.debounce_then_solve(link, generation).await;
            });
            // one timer outstanding per link: re-arming kills the
            // superseded task outright
            if let Some(previous) = self.timers.insert(link, handle.abort_handle()) {
                previous.abort();
            }
        }
        rendered
    }

    async fn debounce_then_solve(self: Arc<Self>, link: LinkId, generation: u64) {
        tokio::time::sleep(Duration::from_millis(self.model.debounce_ms)).await;

        let proceed = {
            let Some(mut state) = self.links.get_mut(&link) else {
                return;
            };
            let (phase, effect) = transition(
                state.phase,
                RouteEvent::DebounceFired { generation },
                state.generation,
            );
            state.phase = phase;
            effect == Some(Effect::StartSolve)
        };
        if !proceed {
            tracing::debug!(link = link.0, generation, "debounce timer superseded");
            return;
        }
        self.solve(link, generation).await;
    }

    async fn solve(self: &Arc<Self>, link: LinkId, generation: u64) {
        // Re-read the scene after the debounce settled; the positions the
        // timer was armed with may already be stale.
        let start = self.plan_endpoint(LinkEnd {
            link,
            side: EndSide::Source,
        });
        let end = self.plan_endpoint(LinkEnd {
            link,
            side: EndSide::Target,
        });
        let request = RouteRequest {
            start,
            end,
            start_owner: self
                .snapshot
                .owner_bounds(LinkEnd {
                    link,
                    side: EndSide::Source,
                })
                .map(|rect| rect_to_plan(&self.adapter, &rect)),
            end_owner: self
                .snapshot
                .owner_bounds(LinkEnd {
                    link,
                    side: EndSide::Target,
                })
                .map(|rect| rect_to_plan(&self.adapter, &rect)),
        };

        let builder = GridBuilder::new(self.resolution, &self.model);
        let region_world = rect_to_world(&self.adapter, &builder.region(&request));
        let mut obstacles = Vec::new();
        for rect in self.snapshot.obstacles(&region_world) {
            let rect = rect_to_plan(&self.adapter, &rect);
            if rect.is_well_formed() {
                obstacles.push(rect);
            } else {
                tracing::warn!(error = %RouteError::MalformedObstacle(rect), "skipping obstacle");
            }
        }
        let overlays: Vec<Polyline> = self
            .snapshot
            .committed_routes(link)
            .into_iter()
            .filter(|route| !route.dragging)
            .map(|route| route.path)
            .collect();

        let grid = builder.build(&request, &obstacles, &overlays);
        if let Ok(mut slot) = self.last_grid.lock() {
            *slot = Some(grid.export());
        }

        let (Some(start_cell), Some(goal_cell)) = (grid.cell_at(start), grid.cell_at(end)) else {
            let err = RouteError::OutsideRegion {
                x: start.x,
                y: start.y,
            };
            tracing::warn!(link = link.0, error = %err, "endpoint outside planning region");
            self.finish(link, generation, None);
            return;
        };

        let mut solver = GridSolver::new(&grid, start_cell, goal_cell, &self.model);
        let path = loop {
            match solver.step(self.model.solver_batch_size) {
                SolveProgress::InProgress => {
                    if self.stale(link, generation) {
                        tracing::debug!(link = link.0, generation, "abandoning superseded solve");
                        return;
                    }
                    tokio::task::yield_now().await;
                }
                SolveProgress::Found(raw) => {
                    break Some(refine_path(&raw, &grid, start, end, &self.model));
                }
                SolveProgress::Exhausted => {
                    tracing::warn!(
                        link = link.0,
                        visited = solver.nodes_visited(),
                        "no path through planning grid"
                    );
                    break None;
                }
            }
        };
        self.finish(link, generation, path);
    }

    fn stale(&self, link: LinkId, generation: u64) -> bool {
        self.links
            .get(&link)
            .map(|state| state.generation != generation)
            .unwrap_or(true)
    }

    fn finish(&self, link: LinkId, generation: u64, path: Option<Polyline>) {
        let Some(mut state) = self.links.get_mut(&link) else {
            return;
        };
        let outcome = if path.is_some() {
            SolveOutcome::Committed
        } else {
            SolveOutcome::Failed
        };
        let (phase, effect) = transition(
            state.phase,
            RouteEvent::SolveFinished {
                generation,
                outcome,
            },
            state.generation,
        );
        state.phase = phase;

        match (effect, path) {
            (Some(Effect::Commit), Some(path)) => {
                tracing::debug!(link = link.0, points = path.len(), "route committed");
                state.committed = Some(path.clone());
                let _ = self.update_tx.send(RouteUpdate { link, path });
            }
            _ => {
                tracing::debug!(link = link.0, generation, "solve result discarded");
            }
        }
    }

    /// Forget a deleted link, aborting any in-flight timer or solve.
    pub fn remove_link(&self, link: LinkId) {
        self.links.remove(&link);
        if let Some((_, timer)) = self.timers.remove(&link) {
            timer.abort();
        }
    }

    /// Snapshot of the most recently built planning grid, for debug
    /// visualization overlays.
    pub fn export_last_planning_grid(&self) -> Option<GridExport> {
        if let Ok(slot) = self.last_grid.lock() {
            slot.clone()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{CommittedRoute, IdentityAdapter};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wirepath_core::geometry::Rect;

    struct TestCanvas {
        pins: Mutex<HashMap<LinkEnd, (f64, f64)>>,
        nodes: Mutex<Vec<Rect>>,
        routes: Mutex<Vec<CommittedRoute>>,
        obstacle_queries: AtomicUsize,
    }

    impl TestCanvas {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                pins: Mutex::new(HashMap::new()),
                nodes: Mutex::new(Vec::new()),
                routes: Mutex::new(Vec::new()),
                obstacle_queries: AtomicUsize::new(0),
            })
        }

        fn set_pin(&self, end: LinkEnd, x: f64, y: f64) {
            self.pins.lock().unwrap().insert(end, (x, y));
        }

        fn grid_builds(&self) -> usize {
            self.obstacle_queries.load(Ordering::SeqCst)
        }
    }

    impl CanvasSnapshot for Arc<TestCanvas> {
        fn obstacles(&self, region: &Rect) -> Vec<Rect> {
            self.obstacle_queries.fetch_add(1, Ordering::SeqCst);
            self.nodes
                .lock()
                .unwrap()
                .iter()
                .filter(|rect| rect.intersects(region))
                .copied()
                .collect()
        }

        fn endpoint(&self, end: LinkEnd) -> (f64, f64) {
            self.pins.lock().unwrap()[&end]
        }

        fn owner_bounds(&self, _end: LinkEnd) -> Option<Rect> {
            None
        }

        fn committed_routes(&self, excluding: LinkId) -> Vec<CommittedRoute> {
            self.routes
                .lock()
                .unwrap()
                .iter()
                .filter(|route| route.link != excluding)
                .cloned()
                .collect()
        }
    }

    fn router(canvas: &Arc<TestCanvas>) -> Arc<LinkRouter<Arc<TestCanvas>, IdentityAdapter>> {
        let model = CostModel {
            debounce_ms: 20,
            ..CostModel::default()
        };
        LinkRouter::new(Arc::clone(canvas), IdentityAdapter, model, 1.0)
    }

    fn ends(link: LinkId) -> (LinkEnd, LinkEnd) {
        (
            LinkEnd {
                link,
                side: EndSide::Source,
            },
            LinkEnd {
                link,
                side: EndSide::Target,
            },
        )
    }

    async fn recv(rx: &mut mpsc::UnboundedReceiver<RouteUpdate>) -> RouteUpdate {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for a route update")
            .expect("update channel closed")
    }

    #[tokio::test]
    async fn commits_route_after_debounce() {
        let canvas = TestCanvas::new();
        let link = LinkId(1);
        let (source, target) = ends(link);
        canvas.set_pin(source, 0.0, 0.0);
        canvas.set_pin(target, 20.0, 0.0);

        let router = router(&canvas);
        let mut rx = router.updates().unwrap();

        let placeholder = router.current_path(link);
        assert_eq!(placeholder.first(), Some(&PlanPoint::new(0.0, 0.0)));
        assert_eq!(placeholder.last(), Some(&PlanPoint::new(20.0, 0.0)));

        let update = recv(&mut rx).await;
        assert_eq!(update.link, link);
        assert_eq!(update.path.first(), Some(&PlanPoint::new(0.0, 0.0)));
        assert_eq!(update.path.last(), Some(&PlanPoint::new(20.0, 0.0)));

        // subsequent reads serve the committed path
        assert_eq!(router.current_path(link), update.path);
    }

    #[tokio::test]
    async fn routed_path_detours_around_a_node() {
        let canvas = TestCanvas::new();
        let link = LinkId(2);
        let (source, target) = ends(link);
        canvas.set_pin(source, 0.0, 0.0);
        canvas.set_pin(target, 30.0, 0.0);
        canvas
            .nodes
            .lock()
            .unwrap()
            .push(Rect::new(12.0, -6.0, 18.0, 6.0));

        let router = router(&canvas);
        let mut rx = router.updates().unwrap();
        router.current_path(link);

        let update = recv(&mut rx).await;
        assert!(update.path.len() > 2, "expected a detour, got {:?}", update.path);
        let node = Rect::new(12.0, -6.0, 18.0, 6.0);
        for point in &update.path {
            assert!(!node.contains_interior(*point), "path enters node at {point:?}");
        }
    }

    #[tokio::test]
    async fn same_signature_skips_recompute() {
        let canvas = TestCanvas::new();
        let link = LinkId(3);
        let (source, target) = ends(link);
        canvas.set_pin(source, 0.0, 0.0);
        canvas.set_pin(target, 16.0, 4.0);

        let router = router(&canvas);
        let mut rx = router.updates().unwrap();
        router.current_path(link);
        recv(&mut rx).await;
        assert_eq!(canvas.grid_builds(), 1);

        // sub-quantum jitter keeps the signature; nothing is scheduled
        canvas.set_pin(target, 16.1, 4.05);
        router.current_path(link);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(canvas.grid_builds(), 1);
    }

    #[tokio::test]
    async fn moving_a_pin_recomputes_the_route() {
        let canvas = TestCanvas::new();
        let link = LinkId(4);
        let (source, target) = ends(link);
        canvas.set_pin(source, 0.0, 0.0);
        canvas.set_pin(target, 16.0, 0.0);

        let router = router(&canvas);
        let mut rx = router.updates().unwrap();
        router.current_path(link);
        recv(&mut rx).await;

        canvas.set_pin(target, 16.0, 10.0);
        router.current_path(link);
        let update = recv(&mut rx).await;
        assert_eq!(update.path.last(), Some(&PlanPoint::new(16.0, 10.0)));
        assert_eq!(canvas.grid_builds(), 2);
    }

    #[tokio::test]
    async fn rapid_moves_coalesce_into_one_solve() {
        let canvas = TestCanvas::new();
        let link = LinkId(5);
        let (source, target) = ends(link);
        canvas.set_pin(source, 0.0, 0.0);

        let router = router(&canvas);
        let mut rx = router.updates().unwrap();

        // five drag frames inside one debounce window
        for i in 0..5 {
            canvas.set_pin(target, 20.0 + i as f64 * 3.0, 0.0);
            router.current_path(link);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let update = recv(&mut rx).await;
        assert_eq!(update.path.last(), Some(&PlanPoint::new(32.0, 0.0)));
        assert_eq!(canvas.grid_builds(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err(), "stale generations must not commit");
    }

    #[tokio::test]
    async fn reinvalidation_restarts_the_debounce_window() {
        let canvas = TestCanvas::new();
        let link = LinkId(8);
        let (source, target) = ends(link);
        canvas.set_pin(source, 0.0, 0.0);
        canvas.set_pin(target, 10.0, 0.0);

        let model = CostModel {
            debounce_ms: 100,
            ..CostModel::default()
        };
        let router = LinkRouter::new(Arc::clone(&canvas), IdentityAdapter, model, 1.0);
        let mut rx = router.updates().unwrap();

        router.current_path(link);
        tokio::time::sleep(Duration::from_millis(60)).await;
        canvas.set_pin(target, 20.0, 0.0);
        router.current_path(link);

        // past the first window but inside the restarted one: the aborted
        // timer must not have solved anything
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(canvas.grid_builds(), 0);

        let update = recv(&mut rx).await;
        assert_eq!(update.path.last(), Some(&PlanPoint::new(20.0, 0.0)));
        assert_eq!(canvas.grid_builds(), 1);
    }

    #[tokio::test]
    async fn removed_link_drops_state_and_skips_pending_solve() {
        let canvas = TestCanvas::new();
        let link = LinkId(6);
        let (source, target) = ends(link);
        canvas.set_pin(source, 0.0, 0.0);
        canvas.set_pin(target, 12.0, 0.0);

        let router = router(&canvas);
        let mut rx = router.updates().unwrap();
        router.current_path(link);
        router.remove_link(link);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(canvas.grid_builds(), 0);
    }

    #[tokio::test]
    async fn planning_grid_export_is_available_after_a_solve() {
        let canvas = TestCanvas::new();
        let link = LinkId(7);
        let (source, target) = ends(link);
        canvas.set_pin(source, 0.0, 0.0);
        canvas.set_pin(target, 10.0, 5.0);

        let router = router(&canvas);
        assert!(router.export_last_planning_grid().is_none());

        let mut rx = router.updates().unwrap();
        router.current_path(link);
        recv(&mut rx).await;

        let export = router.export_last_planning_grid().unwrap();
        assert!(export.rows > 0 && export.cols > 0);
    }
}
