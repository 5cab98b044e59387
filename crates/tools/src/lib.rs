//! Offline driver for the selection controller.
//!
//! A script is a JSON document with an initial entity list and a sequence of
//! steps. Steps are replayed against the recording collaborators and the
//! resulting command trace, map calls and final state are reported.

use foundation::{EntityId, LatLngBounds, Time};
use interaction::recording::{LiveMarker, MapCall, RecordingMap, RecordingRenderer};
use interaction::{ControllerConfig, EntitySet, GeoEntity, MapEvent, SelectionController, SelectionState};
use runtime::Seq;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub entities: Vec<GeoEntity>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Event {
        #[serde(default)]
        at_ms: u64,
        event: MapEvent,
    },
    /// Deliver every completion the map has queued so far.
    Settle {
        #[serde(default)]
        at_ms: u64,
    },
    Rebuild {
        #[serde(default)]
        at_ms: u64,
        entities: Vec<GeoEntity>,
    },
}

impl Step {
    fn at_ms(&self) -> u64 {
        match self {
            Step::Event { at_ms, .. } | Step::Settle { at_ms } | Step::Rebuild { at_ms, .. } => *at_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    Parse(String),
    TimeWentBackwards { step: usize, at_ms: u64, previous_ms: u64 },
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayError::Parse(msg) => write!(f, "script parse error: {msg}"),
            ReplayError::TimeWentBackwards {
                step,
                at_ms,
                previous_ms,
            } => write!(
                f,
                "step {step}: at_ms={at_ms} is earlier than the previous step ({previous_ms})"
            ),
        }
    }
}

impl std::error::Error for ReplayError {}

#[derive(Debug, Clone, Serialize)]
pub struct TraceLine {
    pub seq: Seq,
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    /// Inline error text when the map could not be brought up.
    pub error: Option<String>,
    pub trace: Vec<TraceLine>,
    pub map_calls: Vec<MapCall>,
    pub state: SelectionState,
    pub markers: Vec<LiveMarker>,
}

pub fn parse_script(raw: &str) -> Result<Script, ReplayError> {
    serde_json::from_str(raw).map_err(|e| ReplayError::Parse(e.to_string()))
}

pub fn replay(script: Script, config: ControllerConfig) -> Result<ReplayReport, ReplayError> {
    let mut previous_ms = 0u64;
    for (i, step) in script.steps.iter().enumerate() {
        let at_ms = step.at_ms();
        if at_ms < previous_ms {
            return Err(ReplayError::TimeWentBackwards {
                step: i,
                at_ms,
                previous_ms,
            });
        }
        previous_ms = at_ms;
    }

    let mut ctl = SelectionController::new(RecordingMap::new(), RecordingRenderer::new(), config);
    ctl.rebuild(script.entities);

    for step in script.steps {
        let now = Time::from_millis(step.at_ms());
        match step {
            Step::Event { event, .. } => ctl.handle(event, now),
            Step::Settle { .. } => {
                let completions = ctl.map_mut().settle();
                debug!(count = completions.len(), "delivering completions");
                for event in completions {
                    ctl.handle(event, now);
                }
            }
            Step::Rebuild { entities, .. } => {
                ctl.rebuild(entities);
            }
        }
    }

    Ok(ReplayReport {
        error: ctl.error(),
        trace: ctl
            .trace()
            .events()
            .iter()
            .map(|e| TraceLine {
                seq: e.seq,
                kind: e.kind,
                message: e.message.clone(),
            })
            .collect(),
        map_calls: ctl.map().calls().to_vec(),
        state: ctl.state().clone(),
        markers: ctl.map().live_markers(),
    })
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CheckReport {
    pub total: usize,
    pub duplicates: usize,
    pub placeable: Vec<EntityId>,
    pub skipped: Vec<EntityId>,
    /// `[south, west, north, east]` of the placeable entities.
    pub bounds: Option<[f64; 4]>,
}

/// Which entities would get a marker.
pub fn check_entities(entities: Vec<GeoEntity>) -> CheckReport {
    let total = entities.len();
    let set = EntitySet::new(0, entities);
    let bounds = LatLngBounds::from_points(set.positioned().map(|(_, p)| p)).map(|b| {
        [
            b.south_west.lat,
            b.south_west.lng,
            b.north_east.lat,
            b.north_east.lng,
        ]
    });
    CheckReport {
        total,
        duplicates: total - set.len(),
        placeable: set.positioned().map(|(e, _)| e.id.clone()).collect(),
        skipped: set.unplaceable().map(|e| e.id.clone()).collect(),
        bounds,
    }
}

#[cfg(test)]
mod tests {
    use super::{ReplayError, check_entities, parse_script, replay};
    use foundation::EntityId;
    use interaction::{ControllerConfig, MarkerStyle};
    use pretty_assertions::assert_eq;

    fn config() -> ControllerConfig {
        let mut cfg = ControllerConfig {
            access_token: Some("pk.test".to_string()),
            ..ControllerConfig::default()
        };
        cfg.camera.frame_on_first_load = false;
        cfg
    }

    const SCRIPT: &str = r#"{
        "entities": [
            {"id": "a", "latitude": 40.0, "longitude": -73.0, "name": "Loft"},
            {"id": "b", "latitude": 40.1, "longitude": -73.1, "name": "Garden"},
            {"id": "c", "latitude": 40.2, "name": "Rooftop"}
        ],
        "steps": [
            {"step": "event", "at_ms": 0, "event": {"type": "marker_clicked", "id": "a"}},
            {"step": "settle", "at_ms": 900},
            {"step": "event", "at_ms": 1000, "event": {"type": "list_hover", "id": "b"}},
            {"step": "event", "at_ms": 1100, "event": {"type": "marker_clicked", "id": "a"}},
            {"step": "event", "at_ms": 1200, "event": {"type": "popup_dismissed", "id": "a"}}
        ]
    }"#;

    #[test]
    fn replays_the_listing_scenario() {
        let report = replay(parse_script(SCRIPT).unwrap(), config()).unwrap();
        assert_eq!(report.error, None);
        assert_eq!(report.state.selected_id(), None);
        assert_eq!(report.state.hovered_id(), Some(&EntityId::from("b")));
        assert_eq!(report.markers.len(), 2);

        let kinds: Vec<_> = report.trace.iter().map(|l| l.kind).collect();
        assert_eq!(kinds.iter().filter(|k| **k == "camera.focus").count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == "popup.open").count(), 1);
        assert_eq!(kinds.last(), Some(&"marker.style"));

        let b = report
            .markers
            .iter()
            .find(|m| m.id == EntityId::from("b"))
            .unwrap();
        assert_eq!(b.style, MarkerStyle::Hovered);
    }

    #[test]
    fn missing_token_reports_inline_error() {
        let report = replay(parse_script(SCRIPT).unwrap(), ControllerConfig::default()).unwrap();
        assert!(report.error.is_some());
        assert!(report.map_calls.is_empty());
        assert!(report.trace.is_empty());
    }

    #[test]
    fn rejects_out_of_order_steps() {
        let script = parse_script(
            r#"{"steps": [
                {"step": "settle", "at_ms": 50},
                {"step": "settle", "at_ms": 10}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            replay(script, config()).unwrap_err(),
            ReplayError::TimeWentBackwards {
                step: 1,
                at_ms: 10,
                previous_ms: 50
            }
        );
    }

    #[test]
    fn bad_json_is_a_parse_error() {
        assert!(matches!(parse_script("{\"steps\": 3}"), Err(ReplayError::Parse(_))));
    }

    #[test]
    fn check_splits_placeable_and_skipped() {
        let script = parse_script(SCRIPT).unwrap();
        let mut entities = script.entities;
        entities.push(entities[0].clone());
        let report = check_entities(entities);
        assert_eq!(report.total, 4);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.placeable, vec![EntityId::from("a"), EntityId::from("b")]);
        assert_eq!(report.skipped, vec![EntityId::from("c")]);
        assert_eq!(report.bounds, Some([40.0, -73.1, 40.1, -73.0]));
    }
}
