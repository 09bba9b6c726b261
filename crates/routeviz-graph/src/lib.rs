#![forbid(unsafe_code)]

//! Route-tree visualization core: graph construction and layered layout.
//!
//! A rooted tree of named route segments goes in; a fully positioned
//! directed graph comes out. The pipeline has two stages:
//!
//! 1. [`graph::build`] flattens the route tree into node and edge lists,
//!    assigning pre-order identities and branch-membership colors.
//! 2. [`layout::layout`] assigns every node a rank (depth tier), an order
//!    within its rank, and final coordinates for a given draw direction.
//!
//! All output is deterministic: identical input trees and configuration
//! produce byte-identical rank, order, and coordinate fields. Coordinates
//! are in abstract world units; the rendering surface is an external
//! consumer of the positioned snapshot.

pub mod graph;
pub mod layout;

pub use graph::{Color, GraphEdge, GraphError, GraphNode, NodeKind, Route, RouteGraph, build};
pub use layout::{
    AnchorSide, Direction, LayoutConfig, LayoutError, LayoutPoint, LayoutStats, edge_endpoints,
    layout,
};
