use std::env;

use runtime::DEFAULT_TRACE_CAPACITY;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "config parse error: {msg}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Where the focused marker should land, as a fraction of the viewport
/// measured from its center. Positive `x` is right, positive `y` is down.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusOffset {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub duration_ms: u32,
    pub focus_offset: FocusOffset,
    /// Focusing zooms in to at least this level; it never zooms out.
    pub min_focus_zoom: f64,
    /// Fit all markers into view on the first rebuild that has any.
    pub frame_on_first_load: bool,
    pub frame_padding_px: f64,
    pub max_frame_zoom: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            duration_ms: 800,
            // Lower-right of center: the popup opens above the marker and
            // the listing panel covers the left edge.
            focus_offset: FocusOffset { x: 0.18, y: 0.22 },
            min_focus_zoom: 13.0,
            frame_on_first_load: true,
            frame_padding_px: 48.0,
            max_frame_zoom: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub access_token: Option<String>,
    /// Marker hover events are dropped for this long after a click.
    /// `0` disables the window.
    pub hover_suppress_ms: u64,
    /// Most recent commands kept in the controller trace. `0` turns the
    /// trace off.
    pub trace_capacity: usize,
    pub camera: CameraConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            hover_suppress_ms: 150,
            trace_capacity: DEFAULT_TRACE_CAPACITY,
            camera: CameraConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `VENUE_MAP_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`Self::from_env`] but reading from an arbitrary source.
    /// Unparseable values fall back to the default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let cfg = Self {
            access_token: lookup("VENUE_MAP_ACCESS_TOKEN"),
            hover_suppress_ms: parse_or(&lookup, "VENUE_MAP_HOVER_SUPPRESS_MS", d.hover_suppress_ms),
            trace_capacity: parse_or(&lookup, "VENUE_MAP_TRACE_CAPACITY", d.trace_capacity),
            camera: CameraConfig {
                duration_ms: parse_or(&lookup, "VENUE_MAP_CAMERA_DURATION_MS", d.camera.duration_ms),
                min_focus_zoom: parse_or(&lookup, "VENUE_MAP_MIN_FOCUS_ZOOM", d.camera.min_focus_zoom),
                ..d.camera
            },
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.camera;
        let FocusOffset { x, y } = c.focus_offset;
        if !(x.is_finite() && y.is_finite()) || x.abs() >= 0.5 || y.abs() >= 0.5 {
            return Err(ConfigError::Invalid(format!(
                "focus_offset must lie inside the viewport (|x|, |y| < 0.5), got ({x}, {y})"
            )));
        }
        for (name, zoom) in [
            ("min_focus_zoom", c.min_focus_zoom),
            ("max_frame_zoom", c.max_frame_zoom),
        ] {
            if !(0.0..=24.0).contains(&zoom) {
                return Err(ConfigError::Invalid(format!("{name} out of range: {zoom}")));
            }
        }
        if !c.frame_padding_px.is_finite() || c.frame_padding_px < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "frame_padding_px must be >= 0, got {}",
                c.frame_padding_px
            )));
        }
        Ok(())
    }

    /// The configured token, if it is not blank.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
