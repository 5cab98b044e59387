//! Map selection/hover synchronization.
//!
//! [`SelectionController`] owns the single [`SelectionState`] of one map
//! instance and keeps markers, the detail popup and the camera consistent
//! with it while clicks, hovers, data refreshes and animation completions
//! arrive in arbitrary order.

pub mod backend;
pub mod camera;
pub mod config;
pub mod controller;
pub mod entity;
pub mod error;
pub mod marker;
pub mod popup;
pub mod recording;
pub mod state;

pub use backend::*;
pub use config::{CameraConfig, ConfigError, ControllerConfig, FocusOffset};
pub use controller::*;
pub use entity::*;
pub use error::*;
pub use state::SelectionState;
