#![forbid(unsafe_code)]

//! Deterministic layered layout for route graphs.
//!
//! Sugiyama-style pipeline, specialized for the tree-shaped graphs the
//! builder emits (the ranking phase still works on arbitrary DAG input):
//!   1. Rank assignment (longest path from sources, Kahn order)
//!   2. Ordering within ranks (pre-order sequence, crossing-free for trees)
//!   3. Coordinate assignment (direction-aware, ranks centered)
//!
//! All output is deterministic: identical input and configuration produce
//! byte-identical rank, order, and coordinate fields. Each call builds a
//! fresh working graph; no state leaks between invocations.

use std::collections::HashMap;
use std::env;
use std::fmt;

use crate::graph::{GraphEdge, RouteGraph};

// ── Direction ────────────────────────────────────────────────────────

/// Draw direction: which way ranks advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    TB,
    BT,
    LR,
    RL,
}

/// Side of a node's bounding box where edges visually attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorSide {
    Top,
    Bottom,
    Left,
    Right,
}

impl Direction {
    /// Parse a direction token. Anything unrecognized is a configuration
    /// error for the caller to reject before computing a layout.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tb" => Some(Self::TB),
            "bt" => Some(Self::BT),
            "lr" => Some(Self::LR),
            "rl" => Some(Self::RL),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TB => "TB",
            Self::BT => "BT",
            Self::LR => "LR",
            Self::RL => "RL",
        }
    }

    /// Ranks advance along the vertical axis.
    #[must_use]
    pub const fn is_vertical(self) -> bool {
        matches!(self, Self::TB | Self::BT)
    }

    /// (incoming, outgoing) anchor sides for this direction.
    #[must_use]
    pub const fn anchors(self) -> (AnchorSide, AnchorSide) {
        match self {
            Self::TB => (AnchorSide::Top, AnchorSide::Bottom),
            Self::BT => (AnchorSide::Bottom, AnchorSide::Top),
            Self::LR => (AnchorSide::Left, AnchorSide::Right),
            Self::RL => (AnchorSide::Right, AnchorSide::Left),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Configuration ────────────────────────────────────────────────────

/// One invalid configuration field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl LayoutConfigError {
    fn new(field: &'static str, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LayoutConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for LayoutConfigError {}

/// Layout parameters, immutable per pass. Dimensions and gaps are in
/// world units.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub direction: Direction,
    pub node_width: f64,
    pub node_height: f64,
    /// Gap between adjacent nodes within one rank.
    pub node_sep: f64,
    /// Gap between adjacent ranks.
    pub rank_sep: f64,
    /// Gap reserved between parallel edges at a node border.
    pub edge_sep: f64,
    /// When set, a JSONL trace of the layout phases is appended here.
    pub trace_path: Option<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: Direction::TB,
            node_width: 150.0,
            node_height: 50.0,
            node_sep: 50.0,
            rank_sep: 70.0,
            edge_sep: 10.0,
            trace_path: None,
        }
    }
}

/// Config parse result with accumulated diagnostics.
#[derive(Debug, Clone)]
pub struct LayoutConfigParse {
    pub config: LayoutConfig,
    pub errors: Vec<LayoutConfigError>,
}

impl LayoutConfig {
    /// Parse config from `ROUTEVIZ_*` environment variables, keeping
    /// defaults for anything unset or invalid.
    #[must_use]
    pub fn from_env() -> LayoutConfig {
        Self::from_env_with_diagnostics().config
    }

    /// Parse config from environment variables and return diagnostics.
    #[must_use]
    pub fn from_env_with_diagnostics() -> LayoutConfigParse {
        from_env_with(|key| env::var(key).ok())
    }

    /// Validate config constraints and return all violations.
    pub fn validate(&self) -> Result<(), Vec<LayoutConfigError>> {
        let mut errors = Vec::new();
        validate_dimension("node_width", self.node_width, &mut errors);
        validate_dimension("node_height", self.node_height, &mut errors);
        validate_gap("node_sep", self.node_sep, &mut errors);
        validate_gap("rank_sep", self.rank_sep, &mut errors);
        validate_gap("edge_sep", self.edge_sep, &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

fn validate_dimension(field: &'static str, value: f64, errors: &mut Vec<LayoutConfigError>) {
    if !(value.is_finite() && value > 0.0) {
        errors.push(LayoutConfigError::new(
            field,
            value.to_string(),
            "must be finite and positive",
        ));
    }
}

fn validate_gap(field: &'static str, value: f64, errors: &mut Vec<LayoutConfigError>) {
    if !(value.is_finite() && value >= 0.0) {
        errors.push(LayoutConfigError::new(
            field,
            value.to_string(),
            "must be finite and non-negative",
        ));
    }
}

fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> LayoutConfigParse {
    let mut config = LayoutConfig::default();
    let mut errors = Vec::new();

    if let Some(value) = lookup("ROUTEVIZ_DIRECTION") {
        match Direction::parse(&value) {
            Some(direction) => config.direction = direction,
            None => errors.push(LayoutConfigError::new(
                "direction",
                value,
                "expected one of TB, BT, LR, RL",
            )),
        }
    }

    let mut parse_f64 = |key: &'static str, field: &'static str, slot: &mut f64| {
        if let Some(value) = lookup(key) {
            match value.trim().parse::<f64>() {
                Ok(parsed) => *slot = parsed,
                Err(_) => errors.push(LayoutConfigError::new(field, value, "expected a number")),
            }
        }
    };
    parse_f64("ROUTEVIZ_NODE_WIDTH", "node_width", &mut config.node_width);
    parse_f64("ROUTEVIZ_NODE_HEIGHT", "node_height", &mut config.node_height);
    parse_f64("ROUTEVIZ_NODE_SEP", "node_sep", &mut config.node_sep);
    parse_f64("ROUTEVIZ_RANK_SEP", "rank_sep", &mut config.rank_sep);
    parse_f64("ROUTEVIZ_EDGE_SEP", "edge_sep", &mut config.edge_sep);
    drop(parse_f64);

    if let Some(value) = lookup("ROUTEVIZ_TRACE_PATH") {
        if !value.trim().is_empty() {
            config.trace_path = Some(value);
        }
    }

    if let Err(violations) = config.validate() {
        errors.extend(violations);
        config = LayoutConfig::default();
    }

    LayoutConfigParse { config, errors }
}

// ── Errors ───────────────────────────────────────────────────────────

/// Fatal layout failure. `MissingNode` is a structural-invariant
/// violation: the builder can never produce such an edge, so it is
/// surfaced to the caller rather than repaired.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    MissingNode { edge_id: String, node_id: String },
    InvalidConfig(Vec<LayoutConfigError>),
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingNode { edge_id, node_id } => {
                write!(f, "edge {edge_id:?} references missing node {node_id:?}")
            }
            Self::InvalidConfig(errors) => {
                write!(f, "invalid layout config: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{err}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for LayoutError {}

// ── Layout output ────────────────────────────────────────────────────

/// A point in layout space (world units).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutPoint {
    pub x: f64,
    pub y: f64,
}

/// Statistics from one layout pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutStats {
    pub ranks: usize,
    pub max_rank_width: usize,
    pub crossings: usize,
}

/// Named stage snapshot for the layout trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutStageSnapshot {
    pub stage: &'static str,
    pub nodes: usize,
    pub crossings: usize,
}

/// Per-stage trace of a layout pass, emitted as JSONL evidence lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutTrace {
    pub stages: Vec<LayoutStageSnapshot>,
}

impl LayoutTrace {
    pub fn record(&mut self, stage: &'static str, nodes: usize, crossings: usize) {
        self.stages.push(LayoutStageSnapshot {
            stage,
            nodes,
            crossings,
        });
    }

    /// Append the trace to `path`, one JSON object per line.
    pub fn emit_jsonl(&self, path: &str) {
        for (i, snap) in self.stages.iter().enumerate() {
            let json = serde_json::json!({
                "event": "layout_trace",
                "stage_index": i,
                "stage": snap.stage,
                "node_count": snap.nodes,
                "crossings": snap.crossings,
            });
            let _ = append_jsonl_line(path, &json.to_string());
        }
    }
}

fn append_jsonl_line(path: &str, line: &str) -> std::io::Result<()> {
    use std::io::Write as _;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{line}")
}

// ── Internal working graph ───────────────────────────────────────────

/// Adjacency lists for one layout pass. Constructed fresh per call and
/// never escapes it.
struct LayoutGraph {
    n: usize,
    /// Forward edges: adj[u] = list of v where u→v.
    adj: Vec<Vec<usize>>,
    /// Reverse edges: rev[v] = list of u where u→v.
    rev: Vec<Vec<usize>>,
}

impl LayoutGraph {
    fn from_graph(graph: &RouteGraph) -> Result<Self, LayoutError> {
        let n = graph.nodes.len();
        let index: HashMap<&str, usize> = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.as_str(), i))
            .collect();

        let mut adj = vec![vec![]; n];
        let mut rev = vec![vec![]; n];
        for edge in &graph.edges {
            let u = resolve(&index, edge, &edge.source)?;
            let v = resolve(&index, edge, &edge.target)?;
            adj[u].push(v);
            rev[v].push(u);
        }

        // Sort adjacency lists for determinism.
        for list in &mut adj {
            list.sort_unstable();
            list.dedup();
        }
        for list in &mut rev {
            list.sort_unstable();
            list.dedup();
        }

        Ok(Self { n, adj, rev })
    }
}

fn resolve(
    index: &HashMap<&str, usize>,
    edge: &GraphEdge,
    node_id: &str,
) -> Result<usize, LayoutError> {
    index
        .get(node_id)
        .copied()
        .ok_or_else(|| LayoutError::MissingNode {
            edge_id: edge.id.clone(),
            node_id: node_id.to_string(),
        })
}

// ── Phase 1: Rank assignment ─────────────────────────────────────────

/// Assign ranks via longest-path layering (deterministic).
///
/// Nodes with no predecessors get rank 0; every other node gets
/// 1 + max(rank of predecessors). Kahn's topological order keeps the
/// traversal deterministic. On tree input this collapses to depth, but
/// the phase does not assume a single incoming edge.
fn assign_ranks(graph: &LayoutGraph) -> Vec<usize> {
    let n = graph.n;
    if n == 0 {
        return vec![];
    }

    let mut in_degree: Vec<usize> = graph.rev.iter().map(|preds| preds.len()).collect();
    let mut queue: Vec<usize> = (0..n).filter(|&v| in_degree[v] == 0).collect();

    let mut ranks = vec![0usize; n];
    let mut visited = 0usize;
    let mut head = 0;
    while head < queue.len() {
        let u = queue[head];
        head += 1;
        visited += 1;

        for &v in &graph.adj[u] {
            ranks[v] = ranks[v].max(ranks[u] + 1);
            in_degree[v] -= 1;
            if in_degree[v] == 0 {
                queue.push(v);
            }
        }
    }

    // Anything left unvisited sits on a cycle; park it below the deepest rank.
    if visited < n {
        let max_rank = ranks.iter().copied().max().unwrap_or(0);
        for (v, rank) in ranks.iter_mut().enumerate() {
            if in_degree[v] > 0 {
                *rank = max_rank + 1;
            }
        }
    }

    ranks
}

// ── Phase 2: Ordering within ranks ───────────────────────────────────

/// Bucket nodes by rank. Within each rank, nodes keep ascending index
/// order — the pre-order sequence from the builder — which preserves the
/// source mapping order and is crossing-free for tree input. No
/// barycenter iteration: determinism over heuristic churn.
fn build_rank_buckets(ranks: &[usize]) -> Vec<Vec<usize>> {
    if ranks.is_empty() {
        return vec![];
    }
    let max_rank = ranks.iter().copied().max().unwrap_or(0);
    let mut buckets = vec![vec![]; max_rank + 1];
    for (v, &r) in ranks.iter().enumerate() {
        buckets[r].push(v);
    }
    buckets
}

/// Count edge crossings between two adjacent ranks (inversion count).
fn count_crossings(rank_a: &[usize], rank_b: &[usize], graph: &LayoutGraph) -> usize {
    let mut pos_b = vec![usize::MAX; graph.n];
    let mut in_b = vec![false; graph.n];
    for (i, &v) in rank_b.iter().enumerate() {
        pos_b[v] = i;
        in_b[v] = true;
    }

    let mut edges: Vec<(usize, usize)> = Vec::new();
    for (i, &u) in rank_a.iter().enumerate() {
        for &v in &graph.adj[u] {
            if in_b[v] {
                edges.push((i, pos_b[v]));
            }
        }
    }

    let mut crossings = 0usize;
    for i in 0..edges.len() {
        for j in (i + 1)..edges.len() {
            let (a1, b1) = edges[i];
            let (a2, b2) = edges[j];
            if (a1 < a2 && b1 > b2) || (a1 > a2 && b1 < b2) {
                crossings += 1;
            }
        }
    }
    crossings
}

fn total_crossings(rank_order: &[Vec<usize>], graph: &LayoutGraph) -> usize {
    let mut total = 0;
    for r in 0..rank_order.len().saturating_sub(1) {
        total += count_crossings(&rank_order[r], &rank_order[r + 1], graph);
    }
    total
}

// ── Phase 3: Coordinate assignment ───────────────────────────────────

/// Compute the center point of every node.
///
/// For TB/BT, rank → y and order → x; for LR/RL the axes swap. BT and RL
/// reverse the rank axis. Each rank is centered against the widest rank.
fn assign_centers(
    rank_order: &[Vec<usize>],
    config: &LayoutConfig,
    n: usize,
) -> Vec<LayoutPoint> {
    let (span, rank_dim) = if config.direction.is_vertical() {
        (config.node_width, config.node_height)
    } else {
        (config.node_height, config.node_width)
    };
    let rank_step = rank_dim + config.rank_sep;
    let num_ranks = rank_order.len();

    let rank_width = |nodes: &[usize]| -> f64 {
        if nodes.is_empty() {
            return 0.0;
        }
        nodes.len() as f64 * span + (nodes.len() - 1) as f64 * config.node_sep
    };
    let max_width = rank_order
        .iter()
        .map(|nodes| rank_width(nodes))
        .fold(0.0_f64, f64::max);

    let mut centers = vec![LayoutPoint { x: 0.0, y: 0.0 }; n];
    for (r, rank_nodes) in rank_order.iter().enumerate() {
        let effective_rank = match config.direction {
            Direction::TB | Direction::LR => r,
            Direction::BT | Direction::RL => num_ranks.saturating_sub(1).saturating_sub(r),
        };
        let rank_center = effective_rank as f64 * rank_step + rank_dim / 2.0;
        let shift = (max_width - rank_width(rank_nodes)) / 2.0;

        let mut order_offset = shift;
        for &node in rank_nodes {
            let order_center = order_offset + span / 2.0;
            centers[node] = if config.direction.is_vertical() {
                LayoutPoint {
                    x: order_center,
                    y: rank_center,
                }
            } else {
                LayoutPoint {
                    x: rank_center,
                    y: order_center,
                }
            };
            order_offset += span + config.node_sep;
        }
    }
    centers
}

// ── Entry point ──────────────────────────────────────────────────────

/// Compute ranks, orders, and coordinates for every node in `graph`.
///
/// Mutates only the `rank`, `order`, `x`, `y`, `width`, and `height`
/// fields of the caller's nodes; ids, colors, and element order are left
/// untouched. Final `x`/`y` are the top-left corner of the node box
/// (`center - size / 2`). Fails fast on invalid configuration before any
/// state is touched.
pub fn layout(graph: &mut RouteGraph, config: &LayoutConfig) -> Result<LayoutStats, LayoutError> {
    if let Err(errors) = config.validate() {
        return Err(LayoutError::InvalidConfig(errors));
    }

    let n = graph.nodes.len();
    if n == 0 {
        return Ok(LayoutStats::default());
    }

    let mut trace = LayoutTrace::default();
    let working = LayoutGraph::from_graph(graph)?;

    let ranks = assign_ranks(&working);
    trace.record("rank_assignment", n, 0);

    let rank_order = build_rank_buckets(&ranks);
    let crossings = total_crossings(&rank_order, &working);
    trace.record("ordering", n, crossings);

    let centers = assign_centers(&rank_order, config, n);
    trace.record("coordinate_assignment", n, crossings);

    let mut order_map = vec![0usize; n];
    for bucket in &rank_order {
        for (order, &node) in bucket.iter().enumerate() {
            order_map[node] = order;
        }
    }

    for (i, node) in graph.nodes.iter_mut().enumerate() {
        node.rank = ranks[i];
        node.order = order_map[i];
        node.width = config.node_width;
        node.height = config.node_height;
        node.x = centers[i].x - config.node_width / 2.0;
        node.y = centers[i].y - config.node_height / 2.0;
    }

    let stats = LayoutStats {
        ranks: rank_order.len(),
        max_rank_width: rank_order.iter().map(Vec::len).max().unwrap_or(0),
        crossings,
    };

    tracing::debug!(
        nodes = n,
        ranks = stats.ranks,
        crossings = stats.crossings,
        direction = config.direction.as_str(),
        "layout computed"
    );
    if let Some(path) = config.trace_path.as_deref() {
        trace.emit_jsonl(path);
    }

    Ok(stats)
}

// ── Edge anchors ─────────────────────────────────────────────────────

/// Attach points for one edge: the outgoing anchor on the source box and
/// the incoming anchor on the target box, per the layout direction.
///
/// A source with several outgoing edges fans them out along its anchor
/// side, `edge_sep` apart and centered on the side's midpoint, in the
/// order the edges appear in the snapshot.
///
/// `None` if either endpoint is missing from the snapshot; after a
/// successful [`layout`] pass this cannot happen for edges the builder
/// produced.
#[must_use]
pub fn edge_endpoints(
    graph: &RouteGraph,
    edge: &GraphEdge,
    config: &LayoutConfig,
) -> Option<(LayoutPoint, LayoutPoint)> {
    let source = graph.node(&edge.source)?;
    let target = graph.node(&edge.target)?;
    let (incoming, outgoing) = config.direction.anchors();

    let siblings: Vec<&str> = graph
        .edges
        .iter()
        .filter(|e| e.source == edge.source)
        .map(|e| e.id.as_str())
        .collect();
    let fan = siblings.iter().position(|&id| id == edge.id)? as f64;
    let spread = (fan - (siblings.len() as f64 - 1.0) / 2.0) * config.edge_sep;

    let mut from = anchor_point(source.x, source.y, source.width, source.height, outgoing);
    if config.direction.is_vertical() {
        from.x += spread;
    } else {
        from.y += spread;
    }
    Some((
        from,
        anchor_point(target.x, target.y, target.width, target.height, incoming),
    ))
}

fn anchor_point(x: f64, y: f64, width: f64, height: f64, side: AnchorSide) -> LayoutPoint {
    match side {
        AnchorSide::Top => LayoutPoint {
            x: x + width / 2.0,
            y,
        },
        AnchorSide::Bottom => LayoutPoint {
            x: x + width / 2.0,
            y: y + height,
        },
        AnchorSide::Left => LayoutPoint {
            x,
            y: y + height / 2.0,
        },
        AnchorSide::Right => LayoutPoint {
            x: x + width,
            y: y + height / 2.0,
        },
    }
}

// ── Tests ────────────────────────────────────────────────────────────
