#![forbid(unsafe_code)]

//! Camera focus computation.

use routeviz_graph::graph::GraphNode;

/// Zoom level applied when focusing a node.
pub const FOCUS_ZOOM: f64 = 0.5;

/// Duration of the focus transition.
pub const FOCUS_DURATION_MS: u64 = 1000;

/// A camera move for the rendering surface to animate: center the view on
/// `(x, y)` at `zoom` over `duration_ms`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTransform {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
    pub duration_ms: u64,
}

/// Computes camera transforms from committed node positions.
///
/// Must only be handed nodes that have been through a layout pass; it
/// reads the node's final bounding box as-is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportController {
    pub zoom: f64,
    pub duration_ms: u64,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self {
            zoom: FOCUS_ZOOM,
            duration_ms: FOCUS_DURATION_MS,
        }
    }
}

impl ViewportController {
    /// A transform centering the camera on `node`'s box center.
    #[must_use]
    pub fn focus(&self, node: &GraphNode) -> CameraTransform {
        CameraTransform {
            x: node.x + node.width / 2.0,
            y: node.y + node.height / 2.0,
            zoom: self.zoom,
            duration_ms: self.duration_ms,
        }
    }
}
