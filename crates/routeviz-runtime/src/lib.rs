#![forbid(unsafe_code)]

//! Controllers for the route graph visualization.
//!
//! Single-threaded and event-driven: the host feeds [`controller::GraphMsg`]
//! values into [`controller::InteractionController::update`], commits the
//! returned snapshot to its rendering surface, and then runs whatever
//! [`command::Cmd`] came back. Deferred commands are how the refocus step is
//! ordered strictly after new node positions are committed: `update` never
//! focuses inline, it schedules a follow-up message instead.

pub mod command;
pub mod controller;
pub mod viewport;

pub use command::Cmd;
pub use controller::{ControllerError, GraphMsg, InteractionController, RouteSelection};
pub use viewport::{CameraTransform, ViewportController};
