use foundation::math::{project, unproject, zoom_to_fit};
use foundation::{EntityId, LatLng, LatLngBounds};
use runtime::Seq;
use tracing::{debug, warn};

use crate::backend::{CameraTarget, MapSurface, Viewport};
use crate::config::CameraConfig;
use crate::state::SelectionState;

#[derive(Debug, Clone, PartialEq)]
enum Flight {
    Focus { id: EntityId, seq: Seq },
    Frame { seq: Seq },
}

impl Flight {
    fn seq(&self) -> Seq {
        match self {
            Flight::Focus { seq, .. } | Flight::Frame { seq } => *seq,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FocusOutcome {
    Started(CameraTarget),
    /// The camera already settled on this entity.
    AlreadyCentered,
    /// An animation towards this entity is still running.
    AlreadyInFlight,
    Failed,
}

/// Decides when the camera moves and where to.
///
/// It never writes [`SelectionState`]: a settled focus is handed back to
/// the controller from [`CameraCoordinator::complete`].
#[derive(Debug)]
pub struct CameraCoordinator {
    config: CameraConfig,
    in_flight: Option<Flight>,
    framed: bool,
}

impl CameraCoordinator {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            in_flight: None,
            framed: false,
        }
    }

    /// Ease towards `anchor` unless the camera is already there or headed
    /// there. A focus on a different entity retargets any running animation.
    pub fn focus<M>(
        &mut self,
        map: &mut M,
        state: &SelectionState,
        id: &EntityId,
        anchor: LatLng,
        seq: Seq,
    ) -> FocusOutcome
    where
        M: MapSurface + ?Sized,
    {
        match &self.in_flight {
            Some(Flight::Focus { id: target, .. }) if target == id => {
                return FocusOutcome::AlreadyInFlight;
            }
            None if state.previous_selected_id() == Some(id) => {
                return FocusOutcome::AlreadyCentered;
            }
            _ => {}
        }

        let target = self.focus_target(&map.viewport(), anchor);
        match map.animate_camera_to(target, self.config.duration_ms, seq) {
            Ok(()) => {
                self.in_flight = Some(Flight::Focus { id: id.clone(), seq });
                FocusOutcome::Started(target)
            }
            Err(e) => {
                warn!(%id, error = %e, "camera focus failed");
                self.in_flight = None;
                FocusOutcome::Failed
            }
        }
    }

    /// Camera position that puts `anchor` at the configured offset from the
    /// viewport center.
    pub fn focus_target(&self, viewport: &Viewport, anchor: LatLng) -> CameraTarget {
        let zoom = viewport.zoom.max(self.config.min_focus_zoom);
        let px = project(anchor, zoom);
        let dx = self.config.focus_offset.x * viewport.width_px;
        let dy = self.config.focus_offset.y * viewport.height_px;
        CameraTarget {
            center: unproject([px[0] - dx, px[1] - dy], zoom),
            zoom,
        }
    }

    /// Fit `bounds` into view, once per coordinator lifetime.
    pub fn frame_once<M>(&mut self, map: &mut M, bounds: &LatLngBounds, seq: Seq) -> bool
    where
        M: MapSurface + ?Sized,
    {
        if self.framed || !self.config.frame_on_first_load {
            return false;
        }
        self.framed = true;

        let vp = map.viewport();
        let zoom = zoom_to_fit(
            bounds,
            vp.width_px,
            vp.height_px,
            self.config.frame_padding_px,
            self.config.max_frame_zoom,
        );
        let target = CameraTarget {
            center: bounds.center(),
            zoom,
        };
        match map.animate_camera_to(target, self.config.duration_ms, seq) {
            Ok(()) => {
                self.in_flight = Some(Flight::Frame { seq });
                true
            }
            Err(e) => {
                warn!(error = %e, "initial framing failed");
                false
            }
        }
    }

    /// Animation completion. Returns the entity the camera settled on, or
    /// `None` for framing moves and stale completions.
    pub fn complete(&mut self, seq: Seq) -> Option<EntityId> {
        if self.in_flight.as_ref().map(Flight::seq) != Some(seq) {
            debug!(seq = seq.get(), "stale camera completion ignored");
            return None;
        }
        match self.in_flight.take() {
            Some(Flight::Focus { id, .. }) => Some(id),
            _ => None,
        }
    }

    /// Animation failure. Returns `false` when `seq` is stale.
    pub fn fail(&mut self, seq: Seq) -> bool {
        if self.in_flight.as_ref().map(Flight::seq) != Some(seq) {
            return false;
        }
        self.in_flight = None;
        true
    }

    /// Forget any running focus; its completion will be treated as stale.
    pub fn reset(&mut self) {
        self.in_flight = None;
    }

    pub fn is_animating(&self) -> bool {
        self.in_flight.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraCoordinator, FocusOutcome};
    use crate::backend::Viewport;
    use crate::config::CameraConfig;
    use crate::recording::RecordingMap;
    use crate::state::SelectionState;
    use foundation::math::project;
    use foundation::{EntityId, LatLng, LatLngBounds};
    use runtime::Seq;

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    const A: LatLng = LatLng {
        lat: 40.0,
        lng: -73.0,
    };

    #[test]
    fn target_places_marker_right_of_and_below_center() {
        let cam = CameraCoordinator::new(CameraConfig::default());
        let vp = Viewport {
            zoom: 14.0,
            ..Viewport::default()
        };
        let t = cam.focus_target(&vp, A);
        assert_eq!(t.zoom, 14.0);

        let marker = project(A, t.zoom);
        let center = project(t.center, t.zoom);
        let dx = marker[0] - center[0];
        let dy = marker[1] - center[1];
        assert!((dx - 0.18 * vp.width_px).abs() < 1e-6);
        assert!((dy - 0.22 * vp.height_px).abs() < 1e-6);
    }

    #[test]
    fn focus_never_zooms_out() {
        let cam = CameraCoordinator::new(CameraConfig::default());
        let far = Viewport {
            zoom: 4.0,
            ..Viewport::default()
        };
        assert_eq!(cam.focus_target(&far, A).zoom, 13.0);
    }

    #[test]
    fn repeated_focus_animates_once() {
        let mut map = RecordingMap::new();
        let mut cam = CameraCoordinator::new(CameraConfig::default());
        let state = SelectionState::new();

        assert!(matches!(
            cam.focus(&mut map, &state, &id("a"), A, Seq::new(1)),
            FocusOutcome::Started(_)
        ));
        assert_eq!(
            cam.focus(&mut map, &state, &id("a"), A, Seq::new(2)),
            FocusOutcome::AlreadyInFlight
        );
        assert_eq!(map.camera_animation_count(), 1);
    }

    #[test]
    fn settled_entity_is_not_refocused() {
        let mut map = RecordingMap::new();
        let mut cam = CameraCoordinator::new(CameraConfig::default());
        let mut state = SelectionState::new();

        cam.focus(&mut map, &state, &id("a"), A, Seq::new(1));
        assert_eq!(cam.complete(Seq::new(1)), Some(id("a")));
        state.set_previous_selected(Some(id("a")));

        assert_eq!(
            cam.focus(&mut map, &state, &id("a"), A, Seq::new(2)),
            FocusOutcome::AlreadyCentered
        );
        assert_eq!(map.camera_animation_count(), 1);
    }

    #[test]
    fn new_focus_supersedes_running_one() {
        let mut map = RecordingMap::new();
        let mut cam = CameraCoordinator::new(CameraConfig::default());
        let state = SelectionState::new();

        cam.focus(&mut map, &state, &id("a"), A, Seq::new(1));
        cam.focus(&mut map, &state, &id("b"), LatLng::new(40.1, -73.1), Seq::new(2));
        assert_eq!(cam.complete(Seq::new(1)), None);
        assert_eq!(cam.complete(Seq::new(2)), Some(id("b")));
        assert!(!cam.is_animating());
    }

    #[test]
    fn reset_makes_pending_completion_stale() {
        let mut map = RecordingMap::new();
        let mut cam = CameraCoordinator::new(CameraConfig::default());
        cam.focus(&mut map, &SelectionState::new(), &id("a"), A, Seq::new(1));
        cam.reset();
        assert_eq!(cam.complete(Seq::new(1)), None);
    }

    #[test]
    fn failed_animation_is_reported() {
        let mut map = RecordingMap::new();
        map.fail_camera(true);
        let mut cam = CameraCoordinator::new(CameraConfig::default());
        assert_eq!(
            cam.focus(&mut map, &SelectionState::new(), &id("a"), A, Seq::new(1)),
            FocusOutcome::Failed
        );
        assert!(!cam.is_animating());
    }

    #[test]
    fn framing_happens_once() {
        let mut map = RecordingMap::new();
        let mut cam = CameraCoordinator::new(CameraConfig::default());
        let b = LatLngBounds::from_points([A, LatLng::new(40.1, -73.1)]).unwrap();
        assert!(cam.frame_once(&mut map, &b, Seq::new(1)));
        assert!(!cam.frame_once(&mut map, &b, Seq::new(2)));
        assert_eq!(cam.complete(Seq::new(1)), None);
        assert_eq!(map.camera_animation_count(), 1);
    }
}
