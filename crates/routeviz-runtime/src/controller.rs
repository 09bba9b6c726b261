#![forbid(unsafe_code)]

//! Interaction state machine over the route graph.
//!
//! The controller owns the active route tree and the current positioned
//! snapshot. Rebuilds are synchronous and memoized on `(route id,
//! direction)`; a new rebuild supersedes the previous snapshot wholesale.
//! The refocus after a rebuild is returned as a deferred [`Cmd`] so it runs
//! only after the host has committed the new positions — and because
//! `FocusRoot` re-reads current state instead of captured state, a stale
//! scheduled refocus is harmless.

use std::fmt;

use routeviz_graph::graph::{GraphError, Route, RouteGraph, build};
use routeviz_graph::layout::{Direction, LayoutConfig, LayoutError, layout};

use crate::command::Cmd;
use crate::viewport::{CameraTransform, ViewportController};

/// Events the host feeds into [`InteractionController::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum GraphMsg {
    /// The user picked a new draw direction.
    DirectionChanged(Direction),
    /// The user clicked the node with this build-pass id.
    NodeClicked(String),
    /// The route source supplied a new tree (navigation).
    RouteReplaced(Route),
    /// Deferred: center the camera on the current root.
    FocusRoot,
}

/// External route-selection collaborator, invoked exactly once per
/// qualifying click.
pub trait RouteSelection {
    fn select(&mut self, route: &Route);
}

impl<F: FnMut(&Route)> RouteSelection for F {
    fn select(&mut self, route: &Route) {
        self(route);
    }
}

/// Rebuild failure, propagated from the builder or the layout engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerError {
    Graph(GraphError),
    Layout(LayoutError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph(err) => write!(f, "graph build failed: {err}"),
            Self::Layout(err) => write!(f, "layout failed: {err}"),
        }
    }
}

impl std::error::Error for ControllerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Graph(err) => Some(err),
            Self::Layout(err) => Some(err),
        }
    }
}

impl From<GraphError> for ControllerError {
    fn from(err: GraphError) -> Self {
        Self::Graph(err)
    }
}

impl From<LayoutError> for ControllerError {
    fn from(err: LayoutError) -> Self {
        Self::Layout(err)
    }
}

/// Orchestrates rebuilds and delegates route selection.
pub struct InteractionController<S> {
    route: Route,
    config: LayoutConfig,
    viewport: ViewportController,
    selector: S,
    snapshot: RouteGraph,
    camera: Option<CameraTransform>,
    /// `(route id, direction)` of the committed snapshot.
    memo: Option<(String, Direction)>,
    layout_passes: u64,
}

impl<S: RouteSelection> InteractionController<S> {
    /// Build the initial snapshot for `route` and hand back the controller
    /// plus the deferred first refocus.
    pub fn new(
        route: Route,
        config: LayoutConfig,
        selector: S,
    ) -> Result<(Self, Cmd<GraphMsg>), ControllerError> {
        let mut controller = Self {
            route,
            config,
            viewport: ViewportController::default(),
            selector,
            snapshot: RouteGraph::default(),
            camera: None,
            memo: None,
            layout_passes: 0,
        };
        controller.rebuild()?;
        Ok((controller, Cmd::msg(GraphMsg::FocusRoot)))
    }

    /// The current positioned snapshot, valid until the next rebuild.
    #[must_use]
    pub fn snapshot(&self) -> &RouteGraph {
        &self.snapshot
    }

    /// The most recent focus transform, if any refocus has run.
    #[must_use]
    pub fn camera(&self) -> Option<CameraTransform> {
        self.camera
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.config.direction
    }

    #[must_use]
    pub fn active_route(&self) -> &Route {
        &self.route
    }

    /// Number of layout passes actually computed (memo hits excluded).
    #[must_use]
    pub fn layout_passes(&self) -> u64 {
        self.layout_passes
    }

    /// Apply one event. The returned command must be run by the host after
    /// the new snapshot has been committed to the rendering surface.
    pub fn update(&mut self, msg: GraphMsg) -> Result<Cmd<GraphMsg>, ControllerError> {
        match msg {
            GraphMsg::DirectionChanged(direction) => {
                if direction == self.config.direction {
                    return Ok(Cmd::none());
                }
                self.config.direction = direction;
                self.rebuild()?;
                Ok(Cmd::msg(GraphMsg::FocusRoot))
            }
            GraphMsg::RouteReplaced(route) => {
                // Memoized on route identity: unchanged id, no recompute.
                if route.id == self.route.id {
                    return Ok(Cmd::none());
                }
                self.route = route;
                self.rebuild()?;
                Ok(Cmd::msg(GraphMsg::FocusRoot))
            }
            GraphMsg::FocusRoot => {
                // Re-reads current state, so a schedule that outlived its
                // graph focuses whatever root is committed now.
                if let Some(root) = self.snapshot.root() {
                    self.camera = Some(self.viewport.focus(root));
                    tracing::debug!(x = root.x, y = root.y, "refocused root");
                }
                Ok(Cmd::none())
            }
            GraphMsg::NodeClicked(node_id) => {
                let Some(node) = self.snapshot.node(&node_id) else {
                    return Ok(Cmd::none());
                };
                if node.route_id == self.route.id {
                    // Clicking the active route is a no-op.
                    return Ok(Cmd::none());
                }
                let route_id = node.route_id.clone();
                if let Some(route) = self.route.find(&route_id) {
                    tracing::debug!(route = route_id.as_str(), "route selected");
                    self.selector.select(route);
                }
                Ok(Cmd::none())
            }
        }
    }

    /// Recompute the snapshot unless `(route id, direction)` is unchanged.
    fn rebuild(&mut self) -> Result<(), ControllerError> {
        let key = (self.route.id.clone(), self.config.direction);
        if self.memo.as_ref() == Some(&key) {
            return Ok(());
        }
        let mut graph = build(&self.route)?;
        let stats = layout(&mut graph, &self.config)?;
        tracing::debug!(
            nodes = graph.nodes.len(),
            ranks = stats.ranks,
            direction = self.config.direction.as_str(),
            "snapshot rebuilt"
        );
        self.snapshot = graph;
        self.memo = Some(key);
        self.layout_passes += 1;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample_tree() -> Route {
        Route::with_children(
            "root",
            "/",
            "root",
            vec![
                Route::with_children("a", "/a", "a", vec![Route::leaf("a1", "/a/1", "a1")]),
                Route::leaf("b", "/b", "b"),
            ],
        )
    }

    type Selected = Rc<RefCell<Vec<String>>>;

    fn controller() -> (InteractionController<impl RouteSelection>, Selected) {
        let selected: Selected = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&selected);
        let (controller, first) = InteractionController::new(
            sample_tree(),
            LayoutConfig::default(),
            move |route: &Route| sink.borrow_mut().push(route.id.clone()),
        )
        .unwrap();
        assert_eq!(first, Cmd::Msg(GraphMsg::FocusRoot));
        (controller, selected)
    }

    #[test]
    fn initial_snapshot_is_positioned() {
        let (controller, _) = controller();
        assert_eq!(controller.snapshot().nodes.len(), 4);
        assert_eq!(controller.layout_passes(), 1);
        let a1 = controller.snapshot().node("3").unwrap();
        assert_eq!(a1.rank, 2);
    }

    #[test]
    fn direction_change_rebuilds_and_schedules_refocus() {
        let (mut controller, _) = controller();
        let cmd = controller.update(GraphMsg::DirectionChanged(Direction::LR)).unwrap();
        assert_eq!(cmd, Cmd::Msg(GraphMsg::FocusRoot));
        assert_eq!(controller.direction(), Direction::LR);
        assert_eq!(controller.layout_passes(), 2);
        // Camera is untouched until the deferred command runs.
        assert!(controller.camera().is_none());
        let cmd = controller.update(GraphMsg::FocusRoot).unwrap();
        assert!(cmd.is_none());
        let camera = controller.camera().unwrap();
        let root = controller.snapshot().root().unwrap();
        assert_eq!(camera.x, root.x + root.width / 2.0);
        assert_eq!(camera.zoom, 0.5);
        assert_eq!(camera.duration_ms, 1000);
    }

    #[test]
    fn unchanged_direction_is_a_no_op() {
        let (mut controller, _) = controller();
        let cmd = controller.update(GraphMsg::DirectionChanged(Direction::TB)).unwrap();
        assert!(cmd.is_none());
        assert_eq!(controller.layout_passes(), 1);
    }

    #[test]
    fn click_on_active_route_does_not_select() {
        let (mut controller, selected) = controller();
        // Node "1" is the root, which is the active route.
        controller.update(GraphMsg::NodeClicked("1".into())).unwrap();
        assert!(selected.borrow().is_empty());
    }

    #[test]
    fn click_on_other_node_selects_exactly_once() {
        let (mut controller, selected) = controller();
        controller.update(GraphMsg::NodeClicked("3".into())).unwrap();
        assert_eq!(*selected.borrow(), vec!["a1".to_string()]);
    }

    #[test]
    fn click_on_unknown_node_is_ignored() {
        let (mut controller, selected) = controller();
        controller.update(GraphMsg::NodeClicked("99".into())).unwrap();
        assert!(selected.borrow().is_empty());
    }

    #[test]
    fn route_replacement_is_memoized_on_id() {
        let (mut controller, _) = controller();
        let cmd = controller.update(GraphMsg::RouteReplaced(sample_tree())).unwrap();
        assert!(cmd.is_none());
        assert_eq!(controller.layout_passes(), 1);

        let other = Route::leaf("other", "/other", "other");
        let cmd = controller.update(GraphMsg::RouteReplaced(other)).unwrap();
        assert_eq!(cmd, Cmd::Msg(GraphMsg::FocusRoot));
        assert_eq!(controller.layout_passes(), 2);
        assert_eq!(controller.snapshot().nodes.len(), 1);
    }

    #[test]
    fn stale_refocus_reads_current_state() {
        let (mut controller, _) = controller();
        // Schedule a refocus, then supersede the graph before running it.
        let stale = controller.update(GraphMsg::DirectionChanged(Direction::LR)).unwrap();
        controller
            .update(GraphMsg::RouteReplaced(Route::leaf("other", "/o", "o")))
            .unwrap();
        for msg in stale.into_messages() {
            controller.update(msg).unwrap();
        }
        let camera = controller.camera().unwrap();
        let root = controller.snapshot().root().unwrap();
        assert_eq!(root.route_id, "other");
        assert_eq!(camera.x, root.x + root.width / 2.0);
    }

    #[test]
    fn duplicate_route_ids_propagate_as_errors() {
        let bad = Route::with_children(
            "dup",
            "/",
            "dup",
            vec![Route::leaf("dup", "/dup", "dup")],
        );
        let result = InteractionController::new(
            bad,
            LayoutConfig::default(),
            |_: &Route| {},
        );
        assert!(matches!(
            result,
            Err(ControllerError::Graph(GraphError::DuplicateRouteId(_)))
        ));
    }
}
