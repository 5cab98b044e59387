use std::collections::BTreeMap;

use foundation::EntityId;
use runtime::Seq;
use serde::Serialize;
use tracing::{debug, error, trace};

use crate::backend::{ContentRenderer, MapSurface, MarkerHandle, PopupHandle, RenderRoot};
use crate::entity::GeoEntity;
use crate::error::BackendError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MountState {
    #[default]
    Unmounted,
    Mounting,
    Mounted,
    Closing,
}

#[derive(Debug)]
struct PopupSlot {
    handle: PopupHandle,
    /// `None` once released; release happens at most once.
    root: Option<RenderRoot>,
    state: MountState,
    seq: Seq,
}

/// Owns every popup created for the current marker set and guarantees that
/// at most one of them is showing.
///
/// Popups are created lazily on first open and reused across re-opens of the
/// same entity. Their render roots live until the popup is discarded.
#[derive(Debug, Default)]
pub struct PopupManager {
    slots: BTreeMap<EntityId, PopupSlot>,
    active: Option<EntityId>,
}

impl PopupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the popup for `id` anchored at `marker`.
    ///
    /// A different active popup is unmounted first. Returns the id of the
    /// popup that was replaced, if any. Opening the popup that is already
    /// mounting or mounted is a no-op.
    pub fn open<M, R>(
        &mut self,
        map: &mut M,
        content: &mut R,
        id: &EntityId,
        marker: MarkerHandle,
        seq: Seq,
    ) -> Result<Option<EntityId>, BackendError>
    where
        M: MapSurface + ?Sized,
        R: ContentRenderer + ?Sized,
    {
        if self.active.as_ref() == Some(id)
            && matches!(self.state(id), MountState::Mounting | MountState::Mounted)
        {
            return Ok(None);
        }

        let replaced = match self.active.take() {
            Some(other) if &other != id => {
                self.unmount(map, &other);
                Some(other)
            }
            _ => None,
        };

        if !self.slots.contains_key(id) {
            let handle = map.create_popup(id)?;
            let root = match content.create_root(handle) {
                Ok(root) => root,
                Err(e) => {
                    map.remove_popup(handle);
                    return Err(e);
                }
            };
            self.slots.insert(
                id.clone(),
                PopupSlot {
                    handle,
                    root: Some(root),
                    state: MountState::Unmounted,
                    seq: Seq::default(),
                },
            );
        }
        let Some(slot) = self.slots.get_mut(id) else {
            return Ok(replaced);
        };

        map.open_popup(slot.handle, marker, seq)?;
        slot.state = MountState::Mounting;
        slot.seq = seq;
        self.active = Some(id.clone());
        trace!(%id, seq = seq.get(), "popup mounting");
        Ok(replaced)
    }

    /// Mount completion from the map. Renders content into the popup.
    ///
    /// Returns `false` for stale completions (wrong id, superseded `seq`, or
    /// the popup was closed meanwhile).
    pub fn on_mounted<R>(
        &mut self,
        content: &mut R,
        id: &EntityId,
        seq: Seq,
        entity: Option<&GeoEntity>,
    ) -> bool
    where
        R: ContentRenderer + ?Sized,
    {
        if self.active.as_ref() != Some(id) {
            debug!(%id, seq = seq.get(), "mount completion for inactive popup ignored");
            return false;
        }
        let Some(slot) = self.slots.get_mut(id) else {
            return false;
        };
        if slot.state != MountState::Mounting || slot.seq != seq {
            debug!(%id, seq = seq.get(), "stale mount completion ignored");
            return false;
        }
        slot.state = MountState::Mounted;
        if let (Some(root), Some(entity)) = (slot.root, entity)
            && let Err(e) = content.render(root, entity)
        {
            error!(%id, error = %e, "popup content render failed");
        }
        true
    }

    /// The map could not show the popup. The slot goes back to unmounted.
    pub fn on_mount_failed(&mut self, id: &EntityId, seq: Seq) -> bool {
        if self.active.as_ref() != Some(id) {
            return false;
        }
        let Some(slot) = self.slots.get_mut(id) else {
            return false;
        };
        if slot.state != MountState::Mounting || slot.seq != seq {
            return false;
        }
        slot.state = MountState::Unmounted;
        self.active = None;
        true
    }

    /// Hide the popup for `id` if it is the active one.
    pub fn close<M>(&mut self, map: &mut M, id: &EntityId) -> bool
    where
        M: MapSurface + ?Sized,
    {
        if self.active.as_ref() != Some(id) {
            return false;
        }
        self.active = None;
        self.unmount(map, id);
        true
    }

    /// Re-render the active popup in place. No unmount/remount happens.
    pub fn rerender<R>(&mut self, content: &mut R, id: &EntityId, entity: &GeoEntity) -> bool
    where
        R: ContentRenderer + ?Sized,
    {
        if self.active.as_ref() != Some(id) {
            return false;
        }
        let Some(slot) = self.slots.get(id) else {
            return false;
        };
        if slot.state != MountState::Mounted {
            return false;
        }
        let Some(root) = slot.root else {
            return false;
        };
        if let Err(e) = content.render(root, entity) {
            error!(%id, error = %e, "popup content re-render failed");
        }
        true
    }

    /// Move the active popup onto a freshly created marker.
    pub fn reattach<M>(&mut self, map: &mut M, id: &EntityId, marker: MarkerHandle) -> bool
    where
        M: MapSurface + ?Sized,
    {
        if self.active.as_ref() != Some(id) {
            return false;
        }
        let Some(slot) = self.slots.get(id) else {
            return false;
        };
        if !matches!(slot.state, MountState::Mounting | MountState::Mounted) {
            return false;
        }
        map.attach_popup(slot.handle, marker);
        true
    }

    /// Discard every popup except `keep`. Returns the discarded ids.
    pub fn retain_only<M, R>(
        &mut self,
        map: &mut M,
        content: &mut R,
        keep: Option<&EntityId>,
    ) -> Vec<EntityId>
    where
        M: MapSurface + ?Sized,
        R: ContentRenderer + ?Sized,
    {
        let doomed: Vec<EntityId> = self
            .slots
            .keys()
            .filter(|id| Some(*id) != keep)
            .cloned()
            .collect();
        for id in &doomed {
            self.discard(map, content, id);
        }
        doomed
    }

    /// Release the render root of `id`. Releasing twice is a no-op.
    pub fn release_context<R>(&mut self, content: &mut R, id: &EntityId) -> bool
    where
        R: ContentRenderer + ?Sized,
    {
        let Some(root) = self.slots.get_mut(id).and_then(|s| s.root.take()) else {
            trace!(%id, "render context already released");
            return false;
        };
        content.unmount(root);
        true
    }

    pub fn state(&self, id: &EntityId) -> MountState {
        self.slots.get(id).map(|s| s.state).unwrap_or_default()
    }

    pub fn active(&self) -> Option<&EntityId> {
        self.active.as_ref()
    }

    pub fn root(&self, id: &EntityId) -> Option<RenderRoot> {
        self.slots.get(id).and_then(|s| s.root)
    }

    pub fn handle(&self, id: &EntityId) -> Option<PopupHandle> {
        self.slots.get(id).map(|s| s.handle)
    }

    pub fn mounted_count(&self) -> usize {
        self.slots
            .values()
            .filter(|s| s.state == MountState::Mounted)
            .count()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn unmount<M>(&mut self, map: &mut M, id: &EntityId)
    where
        M: MapSurface + ?Sized,
    {
        let Some(slot) = self.slots.get_mut(id) else {
            return;
        };
        if slot.state == MountState::Unmounted {
            return;
        }
        slot.state = MountState::Closing;
        map.close_popup(slot.handle);
        slot.state = MountState::Unmounted;
        trace!(%id, "popup unmounted");
    }

    fn discard<M, R>(&mut self, map: &mut M, content: &mut R, id: &EntityId)
    where
        M: MapSurface + ?Sized,
        R: ContentRenderer + ?Sized,
    {
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
        self.unmount(map, id);
        self.release_context(content, id);
        if let Some(slot) = self.slots.remove(id) {
            map.remove_popup(slot.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MountState, PopupManager};
    use crate::backend::{MapSurface, MarkerHandle};
    use crate::entity::GeoEntity;
    use crate::recording::{MapCall, RecordingMap, RecordingRenderer};
    use foundation::{EntityId, LatLng};
    use runtime::Seq;

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    struct Fixture {
        map: RecordingMap,
        content: RecordingRenderer,
        popups: PopupManager,
        a: MarkerHandle,
        b: MarkerHandle,
    }

    fn fixture() -> Fixture {
        let mut map = RecordingMap::new();
        let a = map.create_marker(&id("a"), LatLng::new(40.0, -73.0)).unwrap();
        let b = map.create_marker(&id("b"), LatLng::new(40.1, -73.1)).unwrap();
        Fixture {
            map,
            content: RecordingRenderer::new(),
            popups: PopupManager::new(),
            a,
            b,
        }
    }

    #[test]
    fn open_then_mount_renders_content() {
        let mut f = fixture();
        f.popups
            .open(&mut f.map, &mut f.content, &id("a"), f.a, Seq::new(1))
            .unwrap();
        assert_eq!(f.popups.state(&id("a")), MountState::Mounting);

        let entity = GeoEntity::new("a", "A");
        assert!(f.popups.on_mounted(&mut f.content, &id("a"), Seq::new(1), Some(&entity)));
        assert_eq!(f.popups.state(&id("a")), MountState::Mounted);
        assert_eq!(f.content.render_count(), 1);
    }

    #[test]
    fn opening_another_unmounts_the_first_synchronously() {
        let mut f = fixture();
        f.popups
            .open(&mut f.map, &mut f.content, &id("a"), f.a, Seq::new(1))
            .unwrap();
        f.popups.on_mounted(&mut f.content, &id("a"), Seq::new(1), None);

        let replaced = f
            .popups
            .open(&mut f.map, &mut f.content, &id("b"), f.b, Seq::new(2))
            .unwrap();
        assert_eq!(replaced, Some(id("a")));
        assert_eq!(f.popups.state(&id("a")), MountState::Unmounted);
        assert_eq!(f.popups.active(), Some(&id("b")));

        let close_pos = f
            .map
            .calls()
            .iter()
            .position(|c| matches!(c, MapCall::ClosePopup { .. }))
            .unwrap();
        let open_b_pos = f
            .map
            .calls()
            .iter()
            .rposition(|c| matches!(c, MapCall::OpenPopup { .. }))
            .unwrap();
        assert!(close_pos < open_b_pos);
    }

    #[test]
    fn stale_mount_completion_is_ignored() {
        let mut f = fixture();
        f.popups
            .open(&mut f.map, &mut f.content, &id("a"), f.a, Seq::new(1))
            .unwrap();
        f.popups
            .open(&mut f.map, &mut f.content, &id("b"), f.b, Seq::new(2))
            .unwrap();

        assert!(!f.popups.on_mounted(&mut f.content, &id("a"), Seq::new(1), None));
        assert_eq!(f.popups.state(&id("a")), MountState::Unmounted);
        assert!(f.popups.on_mounted(&mut f.content, &id("b"), Seq::new(2), None));
        assert_eq!(f.popups.mounted_count(), 1);
    }

    #[test]
    fn reopen_reuses_popup_and_context() {
        let mut f = fixture();
        f.popups
            .open(&mut f.map, &mut f.content, &id("a"), f.a, Seq::new(1))
            .unwrap();
        let handle = f.popups.handle(&id("a"));
        let root = f.popups.root(&id("a"));
        assert!(f.popups.close(&mut f.map, &id("a")));
        assert!(!f.popups.close(&mut f.map, &id("a")));

        f.popups
            .open(&mut f.map, &mut f.content, &id("a"), f.a, Seq::new(3))
            .unwrap();
        assert_eq!(f.popups.handle(&id("a")), handle);
        assert_eq!(f.popups.root(&id("a")), root);
        assert_eq!(f.content.created_roots(), 1);
    }

    #[test]
    fn rerender_only_applies_to_mounted_active_popup() {
        let mut f = fixture();
        let entity = GeoEntity::new("a", "A v2");
        assert!(!f.popups.rerender(&mut f.content, &id("a"), &entity));

        f.popups
            .open(&mut f.map, &mut f.content, &id("a"), f.a, Seq::new(1))
            .unwrap();
        assert!(!f.popups.rerender(&mut f.content, &id("a"), &entity));
        f.popups.on_mounted(&mut f.content, &id("a"), Seq::new(1), None);
        assert!(f.popups.rerender(&mut f.content, &id("a"), &entity));
        assert_eq!(f.popups.state(&id("a")), MountState::Mounted);
        assert_eq!(f.content.last_rendered_name(), Some("A v2"));
    }

    #[test]
    fn context_release_happens_exactly_once() {
        let mut f = fixture();
        f.popups
            .open(&mut f.map, &mut f.content, &id("a"), f.a, Seq::new(1))
            .unwrap();
        assert!(f.popups.release_context(&mut f.content, &id("a")));
        assert!(!f.popups.release_context(&mut f.content, &id("a")));

        let discarded = f.popups.retain_only(&mut f.map, &mut f.content, None);
        assert_eq!(discarded, vec![id("a")]);
        assert_eq!(f.content.unmount_count(), 1);
        assert_eq!(f.content.double_unmounts(), 0);
        assert!(f.popups.is_empty());
        assert_eq!(f.popups.active(), None);
    }

    #[test]
    fn retain_only_keeps_the_open_popup_untouched() {
        let mut f = fixture();
        f.popups
            .open(&mut f.map, &mut f.content, &id("a"), f.a, Seq::new(1))
            .unwrap();
        f.popups
            .open(&mut f.map, &mut f.content, &id("b"), f.b, Seq::new(2))
            .unwrap();
        f.popups.on_mounted(&mut f.content, &id("b"), Seq::new(2), None);
        let root_b = f.popups.root(&id("b"));

        let discarded = f.popups.retain_only(&mut f.map, &mut f.content, Some(&id("b")));
        assert_eq!(discarded, vec![id("a")]);
        assert_eq!(f.popups.state(&id("b")), MountState::Mounted);
        assert_eq!(f.popups.root(&id("b")), root_b);
    }
}
