#![forbid(unsafe_code)]

//! Route tree model and graph builder.
//!
//! [`build`] converts an immutable [`Route`] tree into a flat [`RouteGraph`]
//! snapshot: one [`GraphNode`] per route, one [`GraphEdge`] per parent→child
//! pair. Node identities are pre-order sequence numbers scoped to a single
//! build pass; they are not stable across rebuilds. The stable key carried
//! on every node is `route_id`.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

// ── Colors ───────────────────────────────────────────────────────────

/// An opaque RGB color in sRGB space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Fixed color of the root node. Deliberately absent from [`BRANCH_PALETTE`]
/// so the root is always visually distinct from every branch.
pub const ROOT_COLOR: Color = Color::rgb(0x33, 0x33, 0x33);

/// Neutral color for edges leaving the root.
pub const NEUTRAL_EDGE: Color = Color::rgb(0xb8, 0xb8, 0xb8);

/// Branch colors, one per root subtree (d3 category10).
///
/// Depth-1 child `i` gets `BRANCH_PALETTE[i % len]`; everything deeper
/// inherits its parent's color, so each root subtree reads as one hue.
pub const BRANCH_PALETTE: &[Color] = &[
    Color::rgb(0x1f, 0x77, 0xb4),
    Color::rgb(0xff, 0x7f, 0x0e),
    Color::rgb(0x2c, 0xa0, 0x2c),
    Color::rgb(0xd6, 0x27, 0x28),
    Color::rgb(0x94, 0x67, 0xbd),
    Color::rgb(0x8c, 0x56, 0x4b),
    Color::rgb(0xe3, 0x77, 0xc2),
    Color::rgb(0x7f, 0x7f, 0x7f),
    Color::rgb(0xbc, 0xbd, 0x22),
    Color::rgb(0x17, 0xbe, 0xcf),
];

// ── Route tree ───────────────────────────────────────────────────────

/// One node of the immutable input tree, owned by the external route source.
///
/// The `routes` map forms a tree: ids are unique across the whole structure
/// and there are no cycles. Children iterate in ascending key order, which
/// is the order the builder and layout preserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub id: String,
    pub path: String,
    pub name: String,
    pub routes: BTreeMap<String, Route>,
}

impl Route {
    /// A leaf route with no children.
    #[must_use]
    pub fn leaf(id: impl Into<String>, path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            name: name.into(),
            routes: BTreeMap::new(),
        }
    }

    /// A route with the given children, keyed by child id.
    #[must_use]
    pub fn with_children(
        id: impl Into<String>,
        path: impl Into<String>,
        name: impl Into<String>,
        children: Vec<Route>,
    ) -> Self {
        let routes = children
            .into_iter()
            .map(|child| (child.id.clone(), child))
            .collect();
        Self {
            id: id.into(),
            path: path.into(),
            name: name.into(),
            routes,
        }
    }

    /// Find a route by id anywhere in this subtree.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Route> {
        if self.id == id {
            return Some(self);
        }
        self.routes.values().find_map(|child| child.find(id))
    }

    /// Number of routes in this subtree, including `self`.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.routes.values().map(Route::count).sum::<usize>()
    }
}

// ── Graph snapshot ───────────────────────────────────────────────────

/// Distinguishes the single incoming-edge-free root from internal nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Internal,
}

/// A positioned graph node.
///
/// `id` is the pre-order visitation number as a string (`"1"` = root) and is
/// only meaningful within one build pass. `rank`, `order`, `x`, `y`, `width`
/// and `height` are zero until a layout pass fills them in; `x`/`y` are the
/// top-left corner of the node's bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    /// Stable route identity; survives rebuilds, unlike `id`.
    pub route_id: String,
    pub name: String,
    pub path: String,
    pub depth: usize,
    pub rank: usize,
    pub order: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: Color,
}

/// One parent→child relationship, colored by the subtree it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub color: Color,
}

/// One build's node/edge snapshot. `|edges| == |nodes| - 1` for any
/// non-empty tree; the structure is isomorphic to the input tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl RouteGraph {
    /// The root node, if the snapshot is non-empty.
    #[must_use]
    pub fn root(&self) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.kind == NodeKind::Root)
    }

    /// Look up a node by its build-pass id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

// ── Errors ───────────────────────────────────────────────────────────

/// Structural violation in the input tree. Signals a bug in the route
/// source; propagated up, never repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    DuplicateRouteId(String),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRouteId(id) => {
                write!(f, "route id {id:?} appears more than once in the tree")
            }
        }
    }
}

impl std::error::Error for GraphError {}

// ── Builder ──────────────────────────────────────────────────────────

/// Build a fresh node/edge snapshot from a route tree.
///
/// Pre-order traversal with an explicit counter: the root becomes node
/// `"1"`, each visited child takes the next unused id before its own
/// children are descended into. Every parent→child pair yields one edge
/// with id `"e<parent><child>"`. The input tree is never mutated.
pub fn build(route: &Route) -> Result<RouteGraph, GraphError> {
    let mut nodes = Vec::with_capacity(route.count());
    let mut edges = Vec::with_capacity(route.count().saturating_sub(1));
    let mut seen = HashSet::new();
    let mut next_id = 0u64;

    visit(
        route, None, 0, 0, &mut next_id, &mut nodes, &mut edges, &mut seen,
    )?;

    tracing::debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        root = route.id.as_str(),
        "route graph built"
    );
    Ok(RouteGraph { nodes, edges })
}

/// Recursive pre-order visit. `parent` is the already-assigned parent node
/// id plus the parent's color; `sibling` is the child's position in its
/// parent's `routes` map.
#[allow(clippy::too_many_arguments)]
fn visit(
    route: &Route,
    parent: Option<(&str, Color)>,
    depth: usize,
    sibling: usize,
    next_id: &mut u64,
    nodes: &mut Vec<GraphNode>,
    edges: &mut Vec<GraphEdge>,
    seen: &mut HashSet<String>,
) -> Result<(), GraphError> {
    if !seen.insert(route.id.clone()) {
        return Err(GraphError::DuplicateRouteId(route.id.clone()));
    }

    *next_id += 1;
    let id = next_id.to_string();

    let color = match (depth, parent) {
        (0, _) => ROOT_COLOR,
        (1, _) => BRANCH_PALETTE[sibling % BRANCH_PALETTE.len()],
        (_, Some((_, parent_color))) => parent_color,
        // Unreachable: depth > 0 always has a parent.
        (_, None) => ROOT_COLOR,
    };

    if let Some((parent_id, _)) = parent {
        let edge_color = if depth == 1 { NEUTRAL_EDGE } else { color };
        edges.push(GraphEdge {
            id: format!("e{parent_id}{id}"),
            source: parent_id.to_string(),
            target: id.clone(),
            color: edge_color,
        });
    }

    nodes.push(GraphNode {
        id: id.clone(),
        kind: if depth == 0 {
            NodeKind::Root
        } else {
            NodeKind::Internal
        },
        route_id: route.id.clone(),
        name: route.name.clone(),
        path: route.path.clone(),
        depth,
        rank: 0,
        order: 0,
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
        color,
    });

    for (i, child) in route.routes.values().enumerate() {
        visit(
            child,
            Some((id.as_str(), color)),
            depth + 1,
            i,
            next_id,
            nodes,
            edges,
            seen,
        )?;
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Route {
        // root → {a, b}, a → {a1}
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

    #[test]
    fn single_route_builds_one_node_no_edges() {
        let graph = build(&Route::leaf("home", "/", "home")).unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
        assert_eq!(graph.nodes[0].id, "1");
        assert_eq!(graph.nodes[0].kind, NodeKind::Root);
        assert_eq!(graph.nodes[0].color, ROOT_COLOR);
    }

    #[test]
    fn edge_count_is_node_count_minus_one() {
        let graph = build(&sample_tree()).unwrap();
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.edges.len(), 3);
    }

    #[test]
    fn exactly_one_root_node() {
        let graph = build(&sample_tree()).unwrap();
        let roots = graph
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Root)
            .count();
        assert_eq!(roots, 1);
        assert_eq!(graph.root().unwrap().route_id, "root");
    }

    #[test]
    fn ids_follow_preorder_visitation() {
        let graph = build(&sample_tree()).unwrap();
        let ids: Vec<(&str, &str)> = graph
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n.route_id.as_str()))
            .collect();
        // BTreeMap order: a before b; a1 visited before b (pre-order).
        assert_eq!(
            ids,
            vec![("1", "root"), ("2", "a"), ("3", "a1"), ("4", "b")]
        );
    }

    #[test]
    fn edge_ids_concatenate_endpoint_ids() {
        let graph = build(&sample_tree()).unwrap();
        let ids: Vec<&str> = graph.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e12", "e23", "e14"]);
        for edge in &graph.edges {
            assert_eq!(edge.id, format!("e{}{}", edge.source, edge.target));
        }
    }

    #[test]
    fn branch_colors_inherit_below_depth_one() {
        let graph = build(&sample_tree()).unwrap();
        let a = graph.node("2").unwrap();
        let a1 = graph.node("3").unwrap();
        let b = graph.node("4").unwrap();
        assert_eq!(a.color, BRANCH_PALETTE[0]);
        assert_eq!(b.color, BRANCH_PALETTE[1]);
        assert_eq!(a1.color, a.color);
        assert_ne!(graph.root().unwrap().color, a.color);
    }

    #[test]
    fn edge_colors_follow_subtree() {
        let graph = build(&sample_tree()).unwrap();
        let root_edges: Vec<&GraphEdge> =
            graph.edges.iter().filter(|e| e.source == "1").collect();
        assert!(root_edges.iter().all(|e| e.color == NEUTRAL_EDGE));
        let deep = graph.edges.iter().find(|e| e.id == "e23").unwrap();
        assert_eq!(deep.color, BRANCH_PALETTE[0]);
    }

    #[test]
    fn duplicate_route_id_is_rejected() {
        let tree = Route::with_children(
            "root",
            "/",
            "root",
            vec![
                Route::with_children("a", "/a", "a", vec![Route::leaf("root", "/a/r", "r")]),
            ],
        );
        assert_eq!(
            build(&tree),
            Err(GraphError::DuplicateRouteId("root".into()))
        );
    }

    #[test]
    fn build_does_not_mutate_the_input() {
        let tree = sample_tree();
        let before = tree.clone();
        let _ = build(&tree).unwrap();
        assert_eq!(tree, before);
    }

    #[test]
    fn palette_wraps_past_ten_branches() {
        let children: Vec<Route> = (0..12)
            .map(|i| Route::leaf(format!("c{i:02}"), format!("/c{i:02}"), format!("c{i:02}")))
            .collect();
        let graph = build(&Route::with_children("root", "/", "root", children)).unwrap();
        let first = graph.nodes[1].color;
        let eleventh = graph.nodes[11].color;
        assert_eq!(first, eleventh);
    }

    #[test]
    fn find_locates_deep_routes() {
        let tree = sample_tree();
        assert_eq!(tree.find("a1").map(|r| r.path.as_str()), Some("/a/1"));
        assert!(tree.find("missing").is_none());
    }

    #[test]
    fn color_formats_as_hex() {
        assert_eq!(Color::rgb(0x1f, 0x77, 0xb4).to_string(), "#1f77b4");
    }
}
