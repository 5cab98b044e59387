use serde::{Deserialize, Serialize};

/// Opaque entity identity as supplied by the data layer.
///
/// Ordering is lexical, so maps keyed by `EntityId` iterate in a stable order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        EntityId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId(s)
    }
}

#[cfg(test)]
mod tests {
    use super::EntityId;

    #[test]
    fn serializes_as_plain_string() {
        let id = EntityId::new("venue-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"venue-7\"");
        let back: EntityId = serde_json::from_str("\"venue-7\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn orders_lexically() {
        let mut ids = vec![EntityId::from("b"), EntityId::from("a"), EntityId::from("c")];
        ids.sort();
        let got: Vec<_> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(got, vec!["a", "b", "c"]);
    }
}
