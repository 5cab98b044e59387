use std::collections::BTreeMap;

use foundation::{EntityId, LatLng};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// A point-located venue as delivered by the data layer.
///
/// Coordinates are optional: partially geocoded records are normal and
/// simply never get a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoEntity {
    pub id: EntityId,
    #[serde(default, deserialize_with = "numeric_or_none")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "numeric_or_none")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Price / booking terms line shown in the popup.
    #[serde(default)]
    pub terms: Option<String>,
}

impl GeoEntity {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            latitude: None,
            longitude: None,
            image_url: None,
            name: name.into(),
            tags: Vec::new(),
            terms: None,
        }
    }

    pub fn at(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Marker position, if both coordinates are present and usable.
    pub fn position(&self) -> Option<LatLng> {
        let p = LatLng::new(self.latitude?, self.longitude?);
        p.is_valid().then_some(p)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCoord {
    Number(f64),
    Other(IgnoredAny),
}

fn numeric_or_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawCoord>::deserialize(deserializer)? {
        Some(RawCoord::Number(v)) => Some(v),
        Some(RawCoord::Other(_)) | None => None,
    })
}

/// Ordered, immutable entity list for one render pass.
///
/// Ids are unique: when the input repeats an id, the first occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    revision: u64,
    entities: Vec<GeoEntity>,
    index: BTreeMap<EntityId, usize>,
}

impl EntitySet {
    pub fn new(revision: u64, entities: Vec<GeoEntity>) -> Self {
        let mut kept = Vec::with_capacity(entities.len());
        let mut index = BTreeMap::new();
        for entity in entities {
            if index.contains_key(&entity.id) {
                debug!(id = %entity.id, revision, "duplicate entity id skipped");
                continue;
            }
            index.insert(entity.id.clone(), kept.len());
            kept.push(entity);
        }
        Self {
            revision,
            entities: kept,
            index,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: &EntityId) -> Option<&GeoEntity> {
        self.index.get(id).map(|&i| &self.entities[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeoEntity> + '_ {
        self.entities.iter()
    }

    /// Entities that can be placed on the map, in input order.
    pub fn positioned(&self) -> impl Iterator<Item = (&GeoEntity, LatLng)> + '_ {
        self.entities
            .iter()
            .filter_map(|e| e.position().map(|p| (e, p)))
    }

    /// Entities excluded from the marker set for lack of coordinates.
    pub fn unplaceable(&self) -> impl Iterator<Item = &GeoEntity> + '_ {
        self.entities.iter().filter(|e| e.position().is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::{EntitySet, GeoEntity};
    use foundation::{EntityId, LatLng};

    #[test]
    fn position_requires_both_coordinates() {
        assert_eq!(
            GeoEntity::new("a", "A").at(40.0, -73.0).position(),
            Some(LatLng::new(40.0, -73.0))
        );
        let mut c = GeoEntity::new("c", "C");
        c.latitude = Some(40.2);
        assert_eq!(c.position(), None);
        assert_eq!(GeoEntity::new("x", "X").at(f64::NAN, 1.0).position(), None);
    }

    #[test]
    fn non_numeric_coordinates_deserialize_as_missing() {
        let json = r#"[
            {"id": "a", "latitude": 40.0, "longitude": -73.0, "name": "A"},
            {"id": "b", "latitude": "40.1", "longitude": -73.1},
            {"id": "c", "latitude": 40.2, "longitude": null},
            {"id": "d", "latitude": {"deg": 1}, "longitude": [1, 2]},
            {"id": "e"}
        ]"#;
        let list: Vec<GeoEntity> = serde_json::from_str(json).unwrap();
        assert_eq!(list.len(), 5);
        assert_eq!(list[0].position(), Some(LatLng::new(40.0, -73.0)));
        assert_eq!(list[1].latitude, None);
        assert_eq!(list[2].longitude, None);
        assert_eq!(list[3].latitude, None);
        assert!(list.iter().skip(1).all(|e| e.position().is_none()));
    }

    #[test]
    fn set_keeps_first_duplicate_and_input_order() {
        let set = EntitySet::new(
            3,
            vec![
                GeoEntity::new("b", "first b").at(1.0, 1.0),
                GeoEntity::new("a", "A").at(2.0, 2.0),
                GeoEntity::new("b", "second b").at(3.0, 3.0),
                GeoEntity::new("c", "C"),
            ],
        );
        assert_eq!(set.revision(), 3);
        assert_eq!(set.len(), 3);
        assert_eq!(set.get(&EntityId::from("b")).unwrap().name, "first b");

        let placed: Vec<_> = set.positioned().map(|(e, _)| e.id.as_str()).collect();
        assert_eq!(placed, vec!["b", "a"]);
        let skipped: Vec<_> = set.unplaceable().map(|e| e.id.as_str()).collect();
        assert_eq!(skipped, vec!["c"]);
    }
}
