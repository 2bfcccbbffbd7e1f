//! Gamepad profiles: how a particular controller's raw codes map onto the
//! logical stick axes and button names the engine understands.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Name of the built-in profile used for relayed gamepads.
pub const RELAYED_PROFILE: &str = touchslot_types::relay::RELAYED_GAMEPAD;

const RELAYED_PROFILE_JSON: &str = include_str!("../assets/rjs.json");

/// Buttons `touchslot profile` asks for, in prompt order.
pub const RECORDED_BUTTONS: [&str; 11] = [
    "BTN_A",
    "BTN_B",
    "BTN_X",
    "BTN_Y",
    "BTN_LB",
    "BTN_RB",
    "BTN_SELECT",
    "BTN_START",
    "BTN_HOME",
    "BTN_LS",
    "BTN_RS",
];

/// Axes `touchslot profile` asks for, in prompt order.
pub const RECORDED_AXES: [&str; 8] = [
    "LS_X", "LS_Y", "RS_X", "RS_Y", "LT", "RT", "HAT0X", "HAT0Y",
];

/// Stick deadzone written into recorded profiles.
pub const RECORDED_DEADZONE: [f64; 2] = [0.4, 0.6];

/// A logical analog input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StickAxis {
    LsX,
    LsY,
    RsX,
    RsY,
    Hat0X,
    Hat0Y,
    Lt,
    Rt,
}

impl StickAxis {
    pub const ALL: [StickAxis; 8] = [
        Self::LsX,
        Self::LsY,
        Self::RsX,
        Self::RsY,
        Self::Hat0X,
        Self::Hat0Y,
        Self::Lt,
        Self::Rt,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "LS_X" => Self::LsX,
            "LS_Y" => Self::LsY,
            "RS_X" => Self::RsX,
            "RS_Y" => Self::RsY,
            "HAT0X" => Self::Hat0X,
            "HAT0Y" => Self::Hat0Y,
            "LT" => Self::Lt,
            "RT" => Self::Rt,
            _ => return None,
        })
    }

    /// Resting value: triggers rest released, everything else centred.
    pub fn rest(self) -> f64 {
        match self {
            Self::Lt | Self::Rt => 0.0,
            _ => 0.5,
        }
    }
}

/// The two analog sticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stick {
    Left,
    Right,
}

impl Stick {
    pub fn axes(self) -> (StickAxis, StickAxis) {
        match self {
            Self::Left => (StickAxis::LsX, StickAxis::LsY),
            Self::Right => (StickAxis::RsX, StickAxis::RsY),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsAxis {
    pub name: String,
    pub range: [i32; 2],
    #[serde(default)]
    pub reverse: bool,
}

impl AbsAxis {
    /// `(value - min) / (max - min)`, flipped when `reverse` is set.
    pub fn normalize(&self, value: i32) -> f64 {
        let [min, max] = self.range;
        if max == min {
            return 0.5;
        }
        let v = (f64::from(value) - f64::from(min)) / (f64::from(max) - f64::from(min));
        if self.reverse {
            1.0 - v
        } else {
            v
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct GamepadProfile {
    #[serde(default)]
    pub deadzone: HashMap<String, [f64; 2]>,
    #[serde(default)]
    pub abs: HashMap<u16, AbsAxis>,
    #[serde(default)]
    pub btn: HashMap<u16, String>,
    #[serde(default)]
    pub map_keyboard: HashMap<String, String>,
}

impl GamepadProfile {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The profile for gamepads that arrive over the relay.
    pub fn relayed() -> Result<Self, serde_json::Error> {
        Self::from_json(RELAYED_PROFILE_JSON)
    }

    /// A profile for recorded button and axis codes. Sticks get
    /// [`RECORDED_DEADZONE`] and buttons the relayed profile's keyboard
    /// mapping.
    pub fn recorded(
        btn: HashMap<u16, String>,
        abs: HashMap<u16, AbsAxis>,
    ) -> Result<Self, serde_json::Error> {
        let deadzone = ["LS", "RS"]
            .into_iter()
            .map(|stick| (stick.to_string(), RECORDED_DEADZONE))
            .collect();
        Ok(Self {
            deadzone,
            abs,
            btn,
            map_keyboard: Self::relayed()?.map_keyboard,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Apply this profile's deadzone for `stick` to a raw reading.
    ///
    /// A reading strictly inside `(lo, hi)` on both axes reads as centred.
    pub fn apply_deadzone(&self, stick: Stick, x: f64, y: f64) -> (f64, f64) {
        let key = match stick {
            Stick::Left => "LS",
            Stick::Right => "RS",
        };
        match self.deadzone.get(key) {
            Some(&[lo, hi]) if lo < x && x < hi && lo < y && y < hi => (0.5, 0.5),
            _ => (x, y),
        }
    }
}
