use foundation::{EntityId, Time};
use runtime::{EventBus, Seq, SeqCounter};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::backend::{ContentRenderer, MapSurface, MarkerStyle};
use crate::camera::{CameraCoordinator, FocusOutcome};
use crate::config::ControllerConfig;
use crate::entity::{EntitySet, GeoEntity};
use crate::error::MapError;
use crate::marker::{MarkerRegistry, RebuildSummary};
use crate::popup::PopupManager;
use crate::state::SelectionState;

/// Inputs to the selection state machine.
///
/// Pointer and list events come from the host page; the mount and camera
/// variants are completions reported by the map for commands tagged with
/// `seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapEvent {
    MarkerClicked { id: EntityId },
    MarkerHoverEnter { id: EntityId },
    MarkerHoverLeave { id: EntityId },
    /// Pointer over a row of the listing panel; `None` when it leaves.
    ListHover { id: Option<EntityId> },
    /// The user closed the popup through its close affordance.
    PopupDismissed { id: EntityId },
    PopupMounted { id: EntityId, seq: Seq },
    PopupMountFailed { id: EntityId, seq: Seq, reason: String },
    CameraSettled { seq: Seq },
    CameraFailed { seq: Seq, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Ready,
    /// Inline error state: the map never came up.
    Failed(MapError),
    ShutDown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum HoverSource {
    Marker,
    List,
}

/// Single writer of [`SelectionState`] for one map instance.
///
/// Every accepted transition mutates the state completely before any
/// command is sent to the marker registry, the popup manager or the camera.
pub struct SelectionController<M, R>
where
    M: MapSurface,
    R: ContentRenderer,
{
    map: M,
    content: R,
    config: ControllerConfig,
    status: Status,
    state: SelectionState,
    entities: EntitySet,
    markers: MarkerRegistry,
    popups: PopupManager,
    camera: CameraCoordinator,
    seq: SeqCounter,
    suppress_hover_until: Option<Time>,
    trace: EventBus,
}

impl<M, R> SelectionController<M, R>
where
    M: MapSurface,
    R: ContentRenderer,
{
    /// Bring up the map. On failure the controller is still returned, in
    /// the [`Status::Failed`] state, so the host can show [`Self::error`].
    pub fn new(mut map: M, content: R, config: ControllerConfig) -> Self {
        let status = match Self::init(&mut map, &config) {
            Ok(()) => Status::Ready,
            Err(e) => {
                error!(error = %e, "map controller disabled");
                Status::Failed(e)
            }
        };
        let camera = CameraCoordinator::new(config.camera.clone());
        let trace = EventBus::with_capacity(config.trace_capacity);
        Self {
            map,
            content,
            config,
            status,
            state: SelectionState::new(),
            entities: EntitySet::default(),
            markers: MarkerRegistry::new(),
            popups: PopupManager::new(),
            camera,
            seq: SeqCounter::new(),
            suppress_hover_until: None,
            trace,
        }
    }

    fn init(map: &mut M, config: &ControllerConfig) -> Result<(), MapError> {
        config.validate()?;
        let token = config.access_token().ok_or(MapError::MissingAccessToken)?;
        map.initialize(token)?;
        Ok(())
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == Status::Ready
    }

    /// Text for the inline error state, if the map is unavailable.
    pub fn error(&self) -> Option<String> {
        match &self.status {
            Status::Failed(e) => Some(e.to_string()),
            _ => None,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// For highlighting the matching row of the listing panel.
    pub fn selected_id(&self) -> Option<&EntityId> {
        self.state.selected_id()
    }

    pub fn hovered_id(&self) -> Option<&EntityId> {
        self.state.hovered_id()
    }

    pub fn open_popup_id(&self) -> Option<&EntityId> {
        self.state.open_popup_id()
    }

    pub fn marker_style(&self, id: &EntityId) -> Option<MarkerStyle> {
        self.markers.style(id)
    }

    pub fn markers(&self) -> &MarkerRegistry {
        &self.markers
    }

    pub fn popups(&self) -> &PopupManager {
        &self.popups
    }

    pub fn entities(&self) -> &EntitySet {
        &self.entities
    }

    pub fn trace(&self) -> &EventBus {
        &self.trace
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn content(&self) -> &R {
        &self.content
    }

    /// Host hook for listing-panel hover.
    pub fn on_entity_hover(&mut self, id: Option<EntityId>, now: Time) {
        self.handle(MapEvent::ListHover { id }, now);
    }

    pub fn handle(&mut self, event: MapEvent, now: Time) {
        if !self.is_ready() {
            trace!(?event, "controller not ready; event dropped");
            return;
        }
        match event {
            MapEvent::MarkerClicked { id } => self.on_click(id, now),
            MapEvent::MarkerHoverEnter { id } => self.on_hover_enter(id, HoverSource::Marker, now),
            MapEvent::MarkerHoverLeave { id } => self.on_hover_leave(Some(id)),
            MapEvent::ListHover { id: Some(id) } => self.on_hover_enter(id, HoverSource::List, now),
            MapEvent::ListHover { id: None } => self.on_hover_leave(None),
            MapEvent::PopupDismissed { id } => self.on_dismiss(id),
            MapEvent::PopupMounted { id, seq } => self.on_popup_mounted(id, seq),
            MapEvent::PopupMountFailed { id, seq, reason } => {
                if self.popups.on_mount_failed(&id, seq) {
                    error!(%id, seq = seq.get(), %reason, "popup failed to mount");
                    self.trace.emit(seq, "popup.mount_failed", id.to_string());
                }
            }
            MapEvent::CameraSettled { seq } => self.on_camera_settled(seq),
            MapEvent::CameraFailed { seq, reason } => {
                if self.camera.fail(seq) {
                    warn!(seq = seq.get(), %reason, "camera animation failed");
                    self.trace.emit(seq, "camera.failed", reason);
                }
            }
        }
    }

    /// Replace the entity list: rebuild every marker, then re-apply the
    /// current selection, keeping the open popup if its entity survived.
    pub fn rebuild(&mut self, entities: Vec<GeoEntity>) -> RebuildSummary {
        if !self.is_ready() {
            return RebuildSummary::default();
        }
        let seq = self.seq.next();
        self.entities = EntitySet::new(self.entities.revision() + 1, entities);

        // State first: forget hover/popup ids whose entity has no marker.
        let placeable = |id: &EntityId| self.entities.get(id).and_then(GeoEntity::position).is_some();
        if let Some(h) = self.state.hovered_id()
            && !placeable(h)
        {
            self.state.set_hovered(None);
        }
        let vanished = self
            .state
            .open_popup_id()
            .filter(|id| !placeable(id))
            .cloned();
        if let Some(id) = &vanished {
            self.state.close_popup_only();
            info!(%id, "open entity left the list; popup discarded");
        }

        let summary = self.markers.rebuild(&mut self.map, &self.entities, &self.state);
        self.trace.emit(
            seq,
            "marker.rebuild",
            format!(
                "created={} skipped={} failed={}",
                summary.created, summary.skipped, summary.failed
            ),
        );
        debug!(
            revision = self.entities.revision(),
            created = summary.created,
            skipped = summary.skipped,
            "markers rebuilt"
        );

        let keep = self.state.open_popup_id().cloned();
        for id in self
            .popups
            .retain_only(&mut self.map, &mut self.content, keep.as_ref())
        {
            self.trace.emit(seq, "popup.discard", id.to_string());
        }

        if let Some(id) = keep
            && let Some(marker) = self.markers.handle(&id)
        {
            if self.popups.reattach(&mut self.map, &id, marker) {
                self.trace.emit(seq, "popup.reattach", id.to_string());
            }
            if let Some(entity) = self.entities.get(&id)
                && self.popups.rerender(&mut self.content, &id, entity)
            {
                self.trace.emit(seq, "popup.rerender", id.to_string());
            }
        }

        if self.state.selected_id().is_none()
            && let Some(bounds) = self.markers.bounds()
            && self.camera.frame_once(&mut self.map, &bounds, seq)
        {
            self.trace.emit(seq, "camera.frame", format!("{} markers", self.markers.len()));
        }

        summary
    }

    /// Remove every marker and popup. The controller ignores everything
    /// afterwards.
    pub fn shutdown(&mut self) {
        if self.status == Status::ShutDown {
            return;
        }
        let seq = self.seq.next();
        self.state = SelectionState::new();
        self.markers.clear(&mut self.map);
        self.popups.retain_only(&mut self.map, &mut self.content, None);
        self.camera.reset();
        self.status = Status::ShutDown;
        self.trace.emit(seq, "controller.shutdown", "");
    }

    fn on_click(&mut self, id: EntityId, now: Time) {
        // A popup that failed to mount still counts as open; clicking again
        // does not retry it. Dismiss clears it.
        if self.state.is_selected(&id) && self.state.open_popup_id() == Some(&id) {
            debug!(%id, "repeated click on selected marker ignored");
            return;
        }
        let (Some(marker), Some(anchor)) = (self.markers.handle(&id), self.markers.anchor(&id)) else {
            debug!(%id, "click on unknown marker ignored");
            return;
        };

        let seq = self.seq.next();
        let previous = self.state.select(id.clone());
        if self.config.hover_suppress_ms > 0 {
            self.suppress_hover_until = Some(now.plus_millis(self.config.hover_suppress_ms));
        }

        if let Some(prev) = previous.as_ref().filter(|p| **p != id) {
            self.restyle(prev, seq);
        }
        self.restyle(&id, seq);

        match self
            .popups
            .open(&mut self.map, &mut self.content, &id, marker, seq)
        {
            Ok(replaced) => {
                if let Some(old) = replaced {
                    self.trace.emit(seq, "popup.close", old.to_string());
                }
                self.trace.emit(seq, "popup.open", id.to_string());
            }
            Err(e) => error!(%id, error = %e, "popup open failed"),
        }

        match self
            .camera
            .focus(&mut self.map, &self.state, &id, anchor, seq)
        {
            FocusOutcome::Started(target) => self.trace.emit(
                seq,
                "camera.focus",
                format!(
                    "{id} -> ({:.5}, {:.5}) z{:.2}",
                    target.center.lat, target.center.lng, target.zoom
                ),
            ),
            outcome => trace!(%id, ?outcome, "camera focus skipped"),
        }
    }

    fn on_hover_enter(&mut self, id: EntityId, source: HoverSource, now: Time) {
        if self.hover_suppressed(source, now) {
            return;
        }
        if self.state.is_selected(&id) || self.state.hovered_id() == Some(&id) {
            return;
        }
        if !self.markers.contains(&id) {
            trace!(%id, "hover on entity without marker ignored");
            return;
        }
        let seq = self.seq.next();
        let previous = self.state.set_hovered(Some(id.clone()));
        if let Some(prev) = previous {
            self.restyle(&prev, seq);
        }
        self.restyle(&id, seq);
    }

    /// Never suppressed: a leave can only clear a hover, and the selected
    /// marker is never the hovered one.
    fn on_hover_leave(&mut self, id: Option<EntityId>) {
        let Some(hovered) = self.state.hovered_id() else {
            return;
        };
        if id.as_ref().is_some_and(|i| i != hovered) {
            return;
        }
        let seq = self.seq.next();
        if let Some(prev) = self.state.set_hovered(None) {
            self.restyle(&prev, seq);
        }
    }

    fn on_dismiss(&mut self, id: EntityId) {
        if self.state.open_popup_id() != Some(&id) {
            debug!(%id, "dismiss for a popup that is not open ignored");
            return;
        }
        let seq = self.seq.next();
        let previous = self.state.clear_selection();
        self.suppress_hover_until = None;
        self.camera.reset();

        if self.popups.close(&mut self.map, &id) {
            self.trace.emit(seq, "popup.close", id.to_string());
        }
        if let Some(prev) = previous {
            self.restyle(&prev, seq);
        }
    }

    fn on_popup_mounted(&mut self, id: EntityId, seq: Seq) {
        let entity = self.entities.get(&id);
        if self
            .popups
            .on_mounted(&mut self.content, &id, seq, entity)
        {
            self.trace.emit(seq, "popup.mount", id.to_string());
        }
    }

    fn on_camera_settled(&mut self, seq: Seq) {
        if let Some(id) = self.camera.complete(seq) {
            self.trace.emit(seq, "camera.settled", id.to_string());
            self.state.set_previous_selected(Some(id));
        }
    }

    fn hover_suppressed(&mut self, source: HoverSource, now: Time) -> bool {
        if source != HoverSource::Marker {
            return false;
        }
        match self.suppress_hover_until {
            Some(until) if now < until => {
                trace!(now = now.0, until = until.0, "marker hover suppressed after click");
                self.trace.emit(self.seq.current(), "hover.suppressed", "");
                true
            }
            Some(_) => {
                self.suppress_hover_until = None;
                false
            }
            None => false,
        }
    }

    fn restyle(&mut self, id: &EntityId, seq: Seq) {
        let style = self.state.style_for(id);
        if self.markers.set_style(&mut self.map, id, style) {
            self.trace.emit(seq, "marker.style", format!("{id}={style:?}"));
        }
    }
}
