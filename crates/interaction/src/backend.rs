use foundation::{EntityId, LatLng};
use runtime::Seq;
use serde::{Deserialize, Serialize};

use crate::entity::GeoEntity;
use crate::error::BackendError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MarkerHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PopupHandle(pub u64);

/// A content rendering context owned by one popup.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RenderRoot(pub u64);

/// Visual class of a marker.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerStyle {
    #[default]
    None,
    Hovered,
    Selected,
}

/// Current camera and canvas size, as reported by the map.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: f64,
    pub width_px: f64,
    pub height_px: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: LatLng::new(0.0, 0.0),
            zoom: 2.0,
            width_px: 1280.0,
            height_px: 720.0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct CameraTarget {
    pub center: LatLng,
    pub zoom: f64,
}

/// Map-rendering collaborator.
///
/// Methods issue commands only. Asynchronous results (popup open, camera
/// settle) come back to the controller as [`crate::MapEvent`]s carrying the
/// `Seq` passed here.
pub trait MapSurface {
    fn initialize(&mut self, access_token: &str) -> Result<(), BackendError>;

    fn viewport(&self) -> Viewport;

    fn create_marker(&mut self, id: &EntityId, at: LatLng) -> Result<MarkerHandle, BackendError>;
    fn destroy_marker(&mut self, marker: MarkerHandle);
    fn set_marker_style(&mut self, marker: MarkerHandle, style: MarkerStyle);

    fn create_popup(&mut self, id: &EntityId) -> Result<PopupHandle, BackendError>;
    /// Anchor `popup` at `marker` and start showing it. Completion is
    /// reported as `PopupMounted { seq }`.
    fn open_popup(
        &mut self,
        popup: PopupHandle,
        marker: MarkerHandle,
        seq: Seq,
    ) -> Result<(), BackendError>;
    /// Move a showing popup onto another marker without hiding it.
    fn attach_popup(&mut self, popup: PopupHandle, marker: MarkerHandle);
    fn close_popup(&mut self, popup: PopupHandle);
    fn remove_popup(&mut self, popup: PopupHandle);

    /// Ease towards `target`. A new call retargets any animation in flight.
    fn animate_camera_to(
        &mut self,
        target: CameraTarget,
        duration_ms: u32,
        seq: Seq,
    ) -> Result<(), BackendError>;
}

/// UI-rendering collaborator for popup content.
///
/// `render` may be called any number of times against the same root; each
/// call replaces the previous tree.
pub trait ContentRenderer {
    fn create_root(&mut self, popup: PopupHandle) -> Result<RenderRoot, BackendError>;
    fn render(&mut self, root: RenderRoot, entity: &GeoEntity) -> Result<(), BackendError>;
    fn unmount(&mut self, root: RenderRoot);
}
