//! In-memory collaborators that record every call.
//!
//! Used by the tests and by the replay tool. `RecordingMap` also queues the
//! completions a real map would deliver later; [`RecordingMap::settle`]
//! hands them back as [`MapEvent`]s.

use std::collections::{BTreeMap, BTreeSet};

use foundation::{EntityId, LatLng};
use runtime::Seq;
use serde::Serialize;

use crate::backend::{
    CameraTarget, ContentRenderer, MapSurface, MarkerHandle, MarkerStyle, PopupHandle, RenderRoot,
    Viewport,
};
use crate::controller::MapEvent;
use crate::entity::GeoEntity;
use crate::error::BackendError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum MapCall {
    Initialize,
    CreateMarker { id: EntityId, marker: MarkerHandle },
    DestroyMarker { marker: MarkerHandle },
    SetMarkerStyle { marker: MarkerHandle, style: MarkerStyle },
    CreatePopup { id: EntityId, popup: PopupHandle },
    OpenPopup { popup: PopupHandle, marker: MarkerHandle, seq: Seq },
    AttachPopup { popup: PopupHandle, marker: MarkerHandle },
    ClosePopup { popup: PopupHandle },
    RemovePopup { popup: PopupHandle },
    AnimateCamera { target: CameraTarget, duration_ms: u32, seq: Seq },
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveMarker {
    pub id: EntityId,
    pub style: MarkerStyle,
}

#[derive(Debug, Clone)]
struct LivePopup {
    id: EntityId,
    showing: bool,
}

#[derive(Debug, Default)]
pub struct RecordingMap {
    calls: Vec<MapCall>,
    viewport: Viewport,
    next_handle: u64,
    markers: BTreeMap<MarkerHandle, LiveMarker>,
    popups: BTreeMap<PopupHandle, LivePopup>,
    pending: Vec<MapEvent>,
    pending_camera: Option<CameraTarget>,
    fail_init: Option<BackendError>,
    fail_markers: BTreeSet<EntityId>,
    fail_camera: bool,
}

impl RecordingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_viewport(viewport: Viewport) -> Self {
        Self {
            viewport,
            ..Self::default()
        }
    }

    pub fn fail_init(&mut self, err: BackendError) {
        self.fail_init = Some(err);
    }

    pub fn fail_marker_for(&mut self, id: EntityId) {
        self.fail_markers.insert(id);
    }

    pub fn fail_camera(&mut self, fail: bool) {
        self.fail_camera = fail;
    }

    pub fn calls(&self) -> &[MapCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Deliver every queued completion, oldest first. The viewport jumps to
    /// the last camera target.
    pub fn settle(&mut self) -> Vec<MapEvent> {
        if let Some(target) = self.pending_camera.take() {
            self.viewport.center = target.center;
            self.viewport.zoom = target.zoom;
        }
        std::mem::take(&mut self.pending)
    }

    pub fn live_marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn marker_style(&self, id: &EntityId) -> Option<MarkerStyle> {
        self.markers
            .values()
            .find(|m| &m.id == id)
            .map(|m| m.style)
    }

    pub fn live_markers(&self) -> Vec<LiveMarker> {
        self.markers.values().cloned().collect()
    }

    pub fn showing_popups(&self) -> Vec<EntityId> {
        self.popups
            .values()
            .filter(|p| p.showing)
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn camera_animation_count(&self) -> usize {
        self.count(|c| matches!(c, MapCall::AnimateCamera { .. }))
    }

    pub fn popup_open_count(&self) -> usize {
        self.count(|c| matches!(c, MapCall::OpenPopup { .. }))
    }

    pub fn popup_close_count(&self) -> usize {
        self.count(|c| matches!(c, MapCall::ClosePopup { .. }))
    }

    pub fn count<F>(&self, pred: F) -> usize
    where
        F: Fn(&MapCall) -> bool,
    {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl MapSurface for RecordingMap {
    fn initialize(&mut self, _access_token: &str) -> Result<(), BackendError> {
        self.calls.push(MapCall::Initialize);
        match self.fail_init.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn create_marker(&mut self, id: &EntityId, _at: LatLng) -> Result<MarkerHandle, BackendError> {
        if self.fail_markers.contains(id) {
            return Err(BackendError::Failed(format!("marker for {id} rejected")));
        }
        let marker = MarkerHandle(self.next_handle());
        self.markers.insert(
            marker,
            LiveMarker {
                id: id.clone(),
                style: MarkerStyle::None,
            },
        );
        self.calls.push(MapCall::CreateMarker {
            id: id.clone(),
            marker,
        });
        Ok(marker)
    }

    fn destroy_marker(&mut self, marker: MarkerHandle) {
        self.markers.remove(&marker);
        self.calls.push(MapCall::DestroyMarker { marker });
    }

    fn set_marker_style(&mut self, marker: MarkerHandle, style: MarkerStyle) {
        if let Some(m) = self.markers.get_mut(&marker) {
            m.style = style;
        }
        self.calls.push(MapCall::SetMarkerStyle { marker, style });
    }

    fn create_popup(&mut self, id: &EntityId) -> Result<PopupHandle, BackendError> {
        let popup = PopupHandle(self.next_handle());
        self.popups.insert(
            popup,
            LivePopup {
                id: id.clone(),
                showing: false,
            },
        );
        self.calls.push(MapCall::CreatePopup {
            id: id.clone(),
            popup,
        });
        Ok(popup)
    }

    fn open_popup(
        &mut self,
        popup: PopupHandle,
        marker: MarkerHandle,
        seq: Seq,
    ) -> Result<(), BackendError> {
        let Some(p) = self.popups.get_mut(&popup) else {
            return Err(BackendError::UnknownHandle(popup.0));
        };
        p.showing = true;
        let id = p.id.clone();
        self.calls.push(MapCall::OpenPopup { popup, marker, seq });
        self.pending.push(MapEvent::PopupMounted { id, seq });
        Ok(())
    }

    fn attach_popup(&mut self, popup: PopupHandle, marker: MarkerHandle) {
        self.calls.push(MapCall::AttachPopup { popup, marker });
    }

    fn close_popup(&mut self, popup: PopupHandle) {
        if let Some(p) = self.popups.get_mut(&popup) {
            p.showing = false;
        }
        self.calls.push(MapCall::ClosePopup { popup });
    }

    fn remove_popup(&mut self, popup: PopupHandle) {
        self.popups.remove(&popup);
        self.calls.push(MapCall::RemovePopup { popup });
    }

    fn animate_camera_to(
        &mut self,
        target: CameraTarget,
        duration_ms: u32,
        seq: Seq,
    ) -> Result<(), BackendError> {
        if self.fail_camera {
            return Err(BackendError::Failed("camera animation rejected".to_string()));
        }
        self.calls.push(MapCall::AnimateCamera {
            target,
            duration_ms,
            seq,
        });
        self.pending_camera = Some(target);
        self.pending.push(MapEvent::CameraSettled { seq });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingRenderer {
    next_root: u64,
    live: BTreeSet<RenderRoot>,
    renders: Vec<(RenderRoot, EntityId, String)>,
    unmounts: usize,
    double_unmounts: usize,
    fail_render: bool,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_render(&mut self, fail: bool) {
        self.fail_render = fail;
    }

    pub fn created_roots(&self) -> u64 {
        self.next_root
    }

    pub fn live_roots(&self) -> usize {
        self.live.len()
    }

    pub fn render_count(&self) -> usize {
        self.renders.len()
    }

    pub fn renders_into(&self, root: RenderRoot) -> usize {
        self.renders.iter().filter(|(r, _, _)| *r == root).count()
    }

    pub fn last_rendered_name(&self) -> Option<&str> {
        self.renders.last().map(|(_, _, name)| name.as_str())
    }

    pub fn unmount_count(&self) -> usize {
        self.unmounts
    }

    /// Unmounts of roots that were not live. Always zero when contexts are
    /// released exactly once.
    pub fn double_unmounts(&self) -> usize {
        self.double_unmounts
    }
}

impl ContentRenderer for RecordingRenderer {
    fn create_root(&mut self, _popup: PopupHandle) -> Result<RenderRoot, BackendError> {
        self.next_root += 1;
        let root = RenderRoot(self.next_root);
        self.live.insert(root);
        Ok(root)
    }

    fn render(&mut self, root: RenderRoot, entity: &GeoEntity) -> Result<(), BackendError> {
        if !self.live.contains(&root) {
            return Err(BackendError::UnknownHandle(root.0));
        }
        if self.fail_render {
            return Err(BackendError::Failed("render rejected".to_string()));
        }
        self.renders
            .push((root, entity.id.clone(), entity.name.clone()));
        Ok(())
    }

    fn unmount(&mut self, root: RenderRoot) {
        if self.live.remove(&root) {
            self.unmounts += 1;
        } else {
            self.double_unmounts += 1;
        }
    }
}
