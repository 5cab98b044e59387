use std::collections::BTreeMap;

use foundation::{EntityId, LatLng, LatLngBounds};
use tracing::{debug, warn};

use crate::backend::{MapSurface, MarkerHandle, MarkerStyle};
use crate::entity::EntitySet;
use crate::state::SelectionState;

#[derive(Debug, Clone)]
struct MarkerSlot {
    handle: MarkerHandle,
    anchor: LatLng,
    style: MarkerStyle,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RebuildSummary {
    pub destroyed: usize,
    pub created: usize,
    /// Entities without usable coordinates.
    pub skipped: usize,
    /// Entities the map refused to create a marker for.
    pub failed: usize,
}

/// One marker per placeable entity, keyed by entity id.
#[derive(Debug, Default)]
pub struct MarkerRegistry {
    markers: BTreeMap<EntityId, MarkerSlot>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tear down every marker and create one per placeable entity, styled
    /// from `state`.
    pub fn rebuild<M>(&mut self, map: &mut M, entities: &EntitySet, state: &SelectionState) -> RebuildSummary
    where
        M: MapSurface + ?Sized,
    {
        let mut summary = RebuildSummary {
            destroyed: self.clear(map),
            ..RebuildSummary::default()
        };

        for entity in entities.iter() {
            let Some(anchor) = entity.position() else {
                debug!(id = %entity.id, "entity has no usable coordinates; no marker");
                summary.skipped += 1;
                continue;
            };
            let handle = match map.create_marker(&entity.id, anchor) {
                Ok(h) => h,
                Err(e) => {
                    warn!(id = %entity.id, error = %e, "marker creation failed");
                    summary.failed += 1;
                    continue;
                }
            };
            let style = state.style_for(&entity.id);
            if style != MarkerStyle::None {
                map.set_marker_style(handle, style);
            }
            self.markers.insert(
                entity.id.clone(),
                MarkerSlot {
                    handle,
                    anchor,
                    style,
                },
            );
            summary.created += 1;
        }
        summary
    }

    /// Destroy all markers. Returns how many there were.
    pub fn clear<M>(&mut self, map: &mut M) -> usize
    where
        M: MapSurface + ?Sized,
    {
        let n = self.markers.len();
        for slot in std::mem::take(&mut self.markers).into_values() {
            map.destroy_marker(slot.handle);
        }
        n
    }

    /// Set one marker's style. Returns `true` if anything changed.
    pub fn set_style<M>(&mut self, map: &mut M, id: &EntityId, style: MarkerStyle) -> bool
    where
        M: MapSurface + ?Sized,
    {
        let Some(slot) = self.markers.get_mut(id) else {
            return false;
        };
        if slot.style == style {
            return false;
        }
        slot.style = style;
        map.set_marker_style(slot.handle, style);
        true
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.markers.contains_key(id)
    }

    pub fn handle(&self, id: &EntityId) -> Option<MarkerHandle> {
        self.markers.get(id).map(|s| s.handle)
    }

    /// Geographic anchor of the marker, used for camera math.
    pub fn anchor(&self, id: &EntityId) -> Option<LatLng> {
        self.markers.get(id).map(|s| s.anchor)
    }

    pub fn style(&self, id: &EntityId) -> Option<MarkerStyle> {
        self.markers.get(id).map(|s| s.style)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> + '_ {
        self.markers.keys()
    }

    pub fn count_with_style(&self, style: MarkerStyle) -> usize {
        self.markers.values().filter(|s| s.style == style).count()
    }

    pub fn bounds(&self) -> Option<LatLngBounds> {
        LatLngBounds::from_points(self.markers.values().map(|s| s.anchor))
    }
}
