//! The key mapping document.
//!
//! A mapping is authored as JSON with every position given as a fraction of
//! the screen. It is validated and converted once, at load time, into a
//! [`Mapping`] holding pixel positions and an [`ActionKind`] per key, so
//! that nothing on the event path has to look at JSON again.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use touchslot_types::keys::is_wheel_key;
use touchslot_types::{PixelPoint, ScreenSize, CANONICAL_MAX};
use tracing::warn;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("invalid mapping JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SCREEN.SIZE must be non-zero")]
    ZeroScreen,

    #[error("{key}: {kind} needs POS")]
    MissingPos { key: String, kind: String },

    #[error("{key}: {kind} needs POS_S")]
    MissingPoints { key: String, kind: String },

    #[error("{key}: {kind} needs INTERVAL with at least {needed} value(s)")]
    MissingInterval {
        key: String,
        kind: String,
        needed: usize,
    },

    #[error("{key}: DRAG needs at least 2 points, got {got}")]
    TooFewDragPoints { key: String, got: usize },

    #[error("{key}: MULT_PRESS needs at least one point")]
    EmptyMultPress { key: String },

    #[error("{key}: a wheel tick has no release, it cannot drive {kind}")]
    WheelKeyHeld { key: String, kind: String },

    #[error("{key}: unknown action type {kind:?}")]
    UnknownType { key: String, kind: String },
}

// ---------------------------------------------------------------------------
// Document layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct MappingDoc {
    screen: ScreenDoc,
    mouse: MouseDoc,
    wheel: WheelDoc,
    #[serde(default)]
    key_maps: BTreeMap<String, ActionDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct ScreenDoc {
    size: [u32; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct MouseDoc {
    #[serde(default)]
    switch_keys: Vec<String>,
    pos: [f64; 2],
    speed: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct WheelDoc {
    pos: [f64; 2],
    range: f64,
    #[serde(default)]
    shift_range: f64,
    #[serde(default)]
    shift_range_enable: bool,
    #[serde(default)]
    shift_range_switch_enable: bool,
    wasd: [String; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct ActionDoc {
    #[serde(rename = "TYPE")]
    kind: String,
    #[serde(default)]
    pos: Option<[f64; 2]>,
    #[serde(default)]
    pos_s: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    interval: Option<Vec<u64>>,
}

// ---------------------------------------------------------------------------
// Validated mapping
// ---------------------------------------------------------------------------

/// What a mapped key does, with positions already in mapping pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Finger down while the key is held.
    Press { at: PixelPoint },
    /// A fixed-length tap on key down.
    Click { at: PixelPoint },
    /// Repeated taps while the key is held.
    AutoFire {
        at: PixelPoint,
        down: Duration,
        interval: Duration,
    },
    /// Several fingers down while the key is held.
    MultPress { points: Vec<PixelPoint> },
    /// One finger swiped through a path on key down.
    Drag {
        points: Vec<PixelPoint>,
        interval: Duration,
    },
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Press { .. } => "PRESS",
            Self::Click { .. } => "CLICK",
            Self::AutoFire { .. } => "AUTO_FIRE",
            Self::MultPress { .. } => "MULT_PRESS",
            Self::Drag { .. } => "DRAG",
        }
    }

    /// Whether the action keeps per-key state between DOWN and UP.
    pub fn is_held(&self) -> bool {
        matches!(
            self,
            Self::Press { .. } | Self::AutoFire { .. } | Self::MultPress { .. }
        )
    }
}

/// The virtual left stick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelConfig {
    pub home: PixelPoint,
    pub range: i32,
    pub shift_range: i32,
    /// Whether KEY_LEFTSHIFT swaps in `shift_range`.
    pub shift_enabled: bool,
    /// Shift toggles on each press instead of acting while held.
    pub shift_toggle: bool,
    /// Direction keys in the order up, left, down, right.
    pub keys: [String; 4],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub screen: ScreenSize,
    pub switch_keys: Vec<String>,
    pub view_home: PixelPoint,
    /// Canonical units per relative mouse unit, both scaled by width.
    pub view_speed: (i64, i64),
    pub wheel: WheelConfig,
    pub actions: HashMap<String, ActionKind>,
}

impl Mapping {
    pub fn from_json(text: &str) -> Result<Self, MappingError> {
        let doc: MappingDoc = serde_json::from_str(text)?;
        Self::from_doc(doc)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, MappingError> {
        let doc: MappingDoc = serde_json::from_value(value)?;
        Self::from_doc(doc)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_doc(doc: MappingDoc) -> Result<Self, MappingError> {
        let [width, height] = doc.screen.size;
        if width == 0 || height == 0 {
            return Err(MappingError::ZeroScreen);
        }
        let screen = ScreenSize::new(width, height);
        let px = |pos: [f64; 2]| screen.fraction(pos[0], pos[1]);
        let width_px = |fraction: f64| (fraction * f64::from(width)) as i32;
        let speed = |s: f64| (s * f64::from(CANONICAL_MAX) / f64::from(width)) as i64;

        let mut switch_keys = Vec::with_capacity(doc.mouse.switch_keys.len());
        for key in doc.mouse.switch_keys {
            if key.is_empty() {
                warn!("mapping has an empty switch key, skipping it");
            } else {
                switch_keys.push(key);
            }
        }

        let mut actions = HashMap::with_capacity(doc.key_maps.len());
        for (key, action) in doc.key_maps {
            let kind = convert_action(&key, action, &px)?;
            if is_wheel_key(&key) && kind.is_held() {
                return Err(MappingError::WheelKeyHeld {
                    key,
                    kind: kind.name().to_string(),
                });
            }
            actions.insert(key, kind);
        }

        Ok(Self {
            screen,
            switch_keys,
            view_home: px(doc.mouse.pos),
            view_speed: (speed(doc.mouse.speed[0]), speed(doc.mouse.speed[1])),
            wheel: WheelConfig {
                home: px(doc.wheel.pos),
                range: width_px(doc.wheel.range),
                shift_range: width_px(doc.wheel.shift_range),
                shift_enabled: doc.wheel.shift_range_enable,
                shift_toggle: doc.wheel.shift_range_switch_enable,
                keys: doc.wheel.wasd,
            },
            actions,
        })
    }
}

fn convert_action(
    key: &str,
    action: ActionDoc,
    px: &impl Fn([f64; 2]) -> PixelPoint,
) -> Result<ActionKind, MappingError> {
    let kind = action.kind.as_str();
    let pos = || {
        action.pos.map(px).ok_or_else(|| MappingError::MissingPos {
            key: key.to_string(),
            kind: kind.to_string(),
        })
    };
    let points = || {
        action
            .pos_s
            .as_ref()
            .map(|points| points.iter().copied().map(px).collect::<Vec<_>>())
            .ok_or_else(|| MappingError::MissingPoints {
                key: key.to_string(),
                kind: kind.to_string(),
            })
    };
    let interval = |needed: usize| match action.interval.as_deref() {
        Some(values) if values.len() >= needed => Ok(values
            .iter()
            .take(needed)
            .map(|ms| Duration::from_millis(*ms))
            .collect::<Vec<_>>()),
        _ => Err(MappingError::MissingInterval {
            key: key.to_string(),
            kind: kind.to_string(),
            needed,
        }),
    };

    match kind {
        "PRESS" => Ok(ActionKind::Press { at: pos()? }),
        "CLICK" => Ok(ActionKind::Click { at: pos()? }),
        "AUTO_FIRE" => {
            let at = pos()?;
            let timing = interval(2)?;
            Ok(ActionKind::AutoFire {
                at,
                down: timing[0],
                interval: timing[1],
            })
        }
        "MULT_PRESS" => {
            let points = points()?;
            if points.is_empty() {
                return Err(MappingError::EmptyMultPress {
                    key: key.to_string(),
                });
            }
            Ok(ActionKind::MultPress { points })
        }
        "DRAG" => {
            let points = points()?;
            if points.len() < 2 {
                return Err(MappingError::TooFewDragPoints {
                    key: key.to_string(),
                    got: points.len(),
                });
            }
            let timing = interval(1)?;
            Ok(ActionKind::Drag {
                points,
                interval: timing[0],
            })
        }
        other => Err(MappingError::UnknownType {
            key: key.to_string(),
            kind: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> serde_json::Value {
        json!({
            "SCREEN": {"SIZE": [2000, 1000]},
            "MOUSE": {"SWITCH_KEYS": ["KEY_GRAVE", ""], "POS": [0.5, 0.5], "SPEED": [1.0, 0.5]},
            "WHEEL": {
                "POS": [0.2, 0.7], "RANGE": 0.05, "SHIFT_RANGE": 0.1,
                "SHIFT_RANGE_ENABLE": true, "SHIFT_RANGE_SWITCH_ENABLE": false,
                "WASD": ["KEY_W", "KEY_A", "KEY_S", "KEY_D"]
            },
            "KEY_MAPS": {}
        })
    }

    fn with_action(key: &str, action: serde_json::Value) -> serde_json::Value {
        let mut doc = base();
        doc["KEY_MAPS"][key] = action;
        doc
    }

    #[test]
    fn converts_fractions_to_pixels() {
        let mapping = Mapping::from_value(base()).unwrap();
        assert_eq!(mapping.screen, ScreenSize::new(2000, 1000));
        assert_eq!(mapping.view_home, PixelPoint::new(1000, 500));
        assert_eq!(mapping.wheel.home, PixelPoint::new(400, 700));
        assert_eq!(mapping.wheel.range, 100);
        assert_eq!(mapping.wheel.shift_range, 200);
        assert!(mapping.wheel.shift_enabled);
        assert!(!mapping.wheel.shift_toggle);
        assert_eq!(mapping.wheel.keys[3], "KEY_D");
    }

    #[test]
    fn view_speed_scales_both_axes_by_width() {
        let mapping = Mapping::from_value(base()).unwrap();
        assert_eq!(mapping.view_speed.0, i64::from(CANONICAL_MAX) / 2000);
        assert_eq!(mapping.view_speed.1, i64::from(CANONICAL_MAX) / 4000);
    }

    #[test]
    fn empty_switch_keys_are_skipped() {
        let mapping = Mapping::from_value(base()).unwrap();
        assert_eq!(mapping.switch_keys, vec!["KEY_GRAVE".to_string()]);
    }

    #[test]
    fn parses_every_action_kind() {
        let mut doc = base();
        doc["KEY_MAPS"] = json!({
            "BTN_LEFT": {"TYPE": "PRESS", "POS": [0.1, 0.2]},
            "KEY_F": {"TYPE": "CLICK", "POS": [0.5, 0.5], "INTERVAL": [18]},
            "KEY_R": {"TYPE": "AUTO_FIRE", "POS": [0.5, 0.5], "INTERVAL": [30, 70]},
            "KEY_Q": {"TYPE": "MULT_PRESS", "POS_S": [[0.1, 0.1], [0.2, 0.2]]},
            "KEY_E": {"TYPE": "DRAG", "POS_S": [[0.1, 0.1], [0.3, 0.1]], "INTERVAL": [20]},
            "REL_WHEEL_UP": {"TYPE": "CLICK", "POS": [0.9, 0.9]}
        });
        let mapping = Mapping::from_value(doc).unwrap();
        assert_eq!(
            mapping.actions["BTN_LEFT"],
            ActionKind::Press {
                at: PixelPoint::new(200, 200)
            }
        );
        assert_eq!(
            mapping.actions["KEY_R"],
            ActionKind::AutoFire {
                at: PixelPoint::new(1000, 500),
                down: Duration::from_millis(30),
                interval: Duration::from_millis(70),
            }
        );
        assert_eq!(
            mapping.actions["KEY_E"],
            ActionKind::Drag {
                points: vec![PixelPoint::new(200, 100), PixelPoint::new(600, 100)],
                interval: Duration::from_millis(20),
            }
        );
        assert_eq!(mapping.actions["KEY_Q"].name(), "MULT_PRESS");
        assert_eq!(mapping.actions["REL_WHEEL_UP"].name(), "CLICK");
    }

    #[test]
    fn rejects_zero_screen() {
        let mut doc = base();
        doc["SCREEN"]["SIZE"] = json!([0, 1000]);
        assert!(matches!(
            Mapping::from_value(doc),
            Err(MappingError::ZeroScreen)
        ));
    }

    #[test]
    fn rejects_missing_pos() {
        let doc = with_action("KEY_F", json!({"TYPE": "PRESS"}));
        assert!(matches!(
            Mapping::from_value(doc),
            Err(MappingError::MissingPos { .. })
        ));
    }

    #[test]
    fn rejects_missing_points() {
        let doc = with_action("KEY_F", json!({"TYPE": "MULT_PRESS", "POS": [0.1, 0.1]}));
        assert!(matches!(
            Mapping::from_value(doc),
            Err(MappingError::MissingPoints { .. })
        ));
    }

    #[test]
    fn rejects_short_auto_fire_interval() {
        let doc = with_action(
            "KEY_F",
            json!({"TYPE": "AUTO_FIRE", "POS": [0.1, 0.1], "INTERVAL": [30]}),
        );
        assert!(matches!(
            Mapping::from_value(doc),
            Err(MappingError::MissingInterval { needed: 2, .. })
        ));
    }

    #[test]
    fn rejects_single_point_drag() {
        let doc = with_action(
            "KEY_F",
            json!({"TYPE": "DRAG", "POS_S": [[0.1, 0.1]], "INTERVAL": [10]}),
        );
        assert!(matches!(
            Mapping::from_value(doc),
            Err(MappingError::TooFewDragPoints { got: 1, .. })
        ));
    }

    #[test]
    fn rejects_empty_mult_press() {
        let doc = with_action("KEY_F", json!({"TYPE": "MULT_PRESS", "POS_S": []}));
        assert!(matches!(
            Mapping::from_value(doc),
            Err(MappingError::EmptyMultPress { .. })
        ));
    }

    #[test]
    fn rejects_held_action_on_wheel_key() {
        let doc = with_action("REL_WHEEL_DOWN", json!({"TYPE": "PRESS", "POS": [0.1, 0.1]}));
        assert!(matches!(
            Mapping::from_value(doc),
            Err(MappingError::WheelKeyHeld { .. })
        ));
    }

    #[test]
    fn rejects_unknown_type() {
        let doc = with_action("KEY_F", json!({"TYPE": "HOLD", "POS": [0.1, 0.1]}));
        assert!(matches!(
            Mapping::from_value(doc),
            Err(MappingError::UnknownType { .. })
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Mapping::from_json("{\"SCREEN\":"),
            Err(MappingError::Json(_))
        ));
    }
}
