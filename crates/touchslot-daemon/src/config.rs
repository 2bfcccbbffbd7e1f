//! Runtime settings loaded from TOML.
//!
//! The key mapping itself is a separate JSON document (see
//! [`crate::mapping`]); these settings choose the backend, the capture
//! filter and the optional subsystems around the engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use touchslot_types::overlay::DEFAULT_OVERLAY_PORT;
use touchslot_types::relay::DEFAULT_RELAY_PORT;

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub daemon: DaemonSettings,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub mixer: MixerSettings,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub overlay: OverlaySettings,
    #[serde(default)]
    pub profiles: ProfileSettings,
}

/// Engine and capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Regex matched against device names before a device is captured.
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// Idle time after which the view finger is lifted; 0 keeps it down.
    #[serde(default = "default_auto_release_ms")]
    pub auto_release_ms: u64,
    #[serde(default)]
    pub measure_mode: bool,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            pattern: default_pattern(),
            auto_release_ms: default_auto_release_ms(),
            measure_mode: false,
        }
    }
}

/// Which output adapter receives touch frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Uinput,
    Bridge,
    Serial,
    Gadget,
    Direct,
}

impl BackendKind {
    /// Backends that inject on this device rather than over a cable.
    pub fn is_local(self) -> bool {
        matches!(self, Self::Uinput | Self::Bridge | Self::Direct)
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uinput => "uinput",
            Self::Bridge => "bridge",
            Self::Serial => "serial",
            Self::Gadget => "gadget",
            Self::Direct => "direct",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub kind: BackendKind,
    #[serde(default)]
    pub display: u32,
    #[serde(default)]
    pub tty_path: Option<String>,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default = "default_gadget_path")]
    pub gadget_path: String,
    #[serde(default)]
    pub direct_index: Option<u32>,
    /// Fixed orientation for the HID backends, which cannot poll the
    /// device they are plugged into.
    #[serde(default = "default_rotation")]
    pub rotation: u8,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            display: 0,
            tty_path: None,
            baud: default_baud(),
            gadget_path: default_gadget_path(),
            direct_index: None,
            rotation: default_rotation(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default)]
    pub listen: bool,
    #[serde(default = "default_relay_port")]
    pub port: u16,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            listen: false,
            port: default_relay_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlaySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_overlay_addr")]
    pub addr: String,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_overlay_addr(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSettings {
    /// Directory of `<device name>.json` gamepad profiles.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_pattern() -> String {
    ".*".to_string()
}

fn default_auto_release_ms() -> u64 {
    200
}

fn default_true() -> bool {
    true
}

fn default_baud() -> u32 {
    touchslot_input::hid::DEFAULT_BAUD
}

fn default_gadget_path() -> String {
    touchslot_input::hid::DEFAULT_GADGET_PATH.to_string()
}

fn default_rotation() -> u8 {
    1
}

fn default_relay_port() -> u16 {
    DEFAULT_RELAY_PORT
}

fn default_overlay_addr() -> String {
    format!("127.0.0.1:{DEFAULT_OVERLAY_PORT}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serialize() {
        let settings = Settings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        assert!(toml_str.contains("auto_release_ms = 200"));
        assert!(toml_str.contains("kind = \"uinput\""));
        assert!(toml_str.contains("baud = 2000000"));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.backend.kind, BackendKind::Uinput);
        assert_eq!(settings.backend.rotation, 1);
        assert!(settings.mixer.enabled);
        assert_eq!(settings.relay.port, 61069);
        assert_eq!(settings.overlay.addr, "127.0.0.1:6533");
        assert!(settings.profiles.dir.is_none());
    }

    #[test]
    fn parse_example_settings() {
        let toml_str = r#"
[daemon]
log_level = "debug"
pattern = "^(Xbox|Logitech)"
auto_release_ms = 0
measure_mode = true

[backend]
kind = "serial"
tty_path = "/dev/ttyACM0"
rotation = 3

[mixer]
enabled = false

[relay]
listen = true
port = 7000

[profiles]
dir = "/data/local/tmp/joystickInfos"
"#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.daemon.pattern, "^(Xbox|Logitech)");
        assert_eq!(settings.daemon.auto_release_ms, 0);
        assert!(settings.daemon.measure_mode);
        assert_eq!(settings.backend.kind, BackendKind::Serial);
        assert_eq!(settings.backend.tty_path.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(settings.backend.baud, 2_000_000);
        assert_eq!(settings.backend.rotation, 3);
        assert!(!settings.mixer.enabled);
        assert!(settings.relay.listen);
        assert_eq!(settings.relay.port, 7000);
        assert_eq!(
            settings.profiles.dir,
            Some(PathBuf::from("/data/local/tmp/joystickInfos"))
        );
    }

    #[test]
    fn local_backends() {
        assert!(BackendKind::Uinput.is_local());
        assert!(BackendKind::Bridge.is_local());
        assert!(BackendKind::Direct.is_local());
        assert!(!BackendKind::Serial.is_local());
        assert!(!BackendKind::Gadget.is_local());
    }
}
