use foundation::EntityId;
use serde::Serialize;

use crate::backend::MarkerStyle;

/// The authoritative selection record of one map instance.
///
/// Only the controller mutates it (the setters are crate-private); the
/// marker registry, popup manager and camera coordinator read it.
///
/// Invariants:
/// - `open_popup_id` is `None` or equal to `selected_id`.
/// - `hovered_id` never equals `selected_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionState {
    selected_id: Option<EntityId>,
    hovered_id: Option<EntityId>,
    open_popup_id: Option<EntityId>,
    previous_selected_id: Option<EntityId>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_id(&self) -> Option<&EntityId> {
        self.selected_id.as_ref()
    }

    pub fn hovered_id(&self) -> Option<&EntityId> {
        self.hovered_id.as_ref()
    }

    pub fn open_popup_id(&self) -> Option<&EntityId> {
        self.open_popup_id.as_ref()
    }

    /// Entity the camera last settled on.
    pub fn previous_selected_id(&self) -> Option<&EntityId> {
        self.previous_selected_id.as_ref()
    }

    pub fn is_selected(&self, id: &EntityId) -> bool {
        self.selected_id.as_ref() == Some(id)
    }

    /// Style implied for `id`: selected wins over hovered wins over none.
    pub fn style_for(&self, id: &EntityId) -> MarkerStyle {
        if self.selected_id.as_ref() == Some(id) {
            MarkerStyle::Selected
        } else if self.hovered_id.as_ref() == Some(id) {
            MarkerStyle::Hovered
        } else {
            MarkerStyle::None
        }
    }

    /// Select `id` with its popup open. Returns the previously selected id.
    pub(crate) fn select(&mut self, id: EntityId) -> Option<EntityId> {
        if self.hovered_id.as_ref() == Some(&id) {
            self.hovered_id = None;
        }
        self.open_popup_id = Some(id.clone());
        self.selected_id.replace(id)
    }

    /// Drop selection, popup and camera memory. Returns the previously selected id.
    pub(crate) fn clear_selection(&mut self) -> Option<EntityId> {
        self.open_popup_id = None;
        self.previous_selected_id = None;
        self.selected_id.take()
    }

    /// Returns the previously hovered id.
    pub(crate) fn set_hovered(&mut self, id: Option<EntityId>) -> Option<EntityId> {
        std::mem::replace(&mut self.hovered_id, id)
    }

    pub(crate) fn close_popup_only(&mut self) -> Option<EntityId> {
        self.open_popup_id.take()
    }

    pub(crate) fn set_previous_selected(&mut self, id: Option<EntityId>) {
        self.previous_selected_id = id;
    }
}
