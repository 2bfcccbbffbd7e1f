//! Capability probing of evdev devices.

use std::collections::HashMap;
use std::path::PathBuf;

use evdev::{AbsoluteAxisCode, Device};
use regex::Regex;
use touchslot_types::DeviceKind;

use crate::probe::{is_own_device, DeviceCaps};

/// One `/dev/input` node as reported by `touchslot devices`.
#[derive(Debug, Clone)]
pub struct DeviceSummary {
    pub path: PathBuf,
    pub name: String,
    pub kind: DeviceKind,
}

/// Read the capability codes of an open device.
pub fn device_caps(device: &Device) -> DeviceCaps {
    DeviceCaps {
        keys: device
            .supported_keys()
            .map(|s| s.iter().map(|k| k.0).collect())
            .unwrap_or_default(),
        rel: device
            .supported_relative_axes()
            .map(|s| s.iter().map(|r| r.0).collect())
            .unwrap_or_default(),
        abs: device
            .supported_absolute_axes()
            .map(|s| s.iter().map(|a| a.0).collect())
            .unwrap_or_default(),
    }
}

/// The `ABS_MT_POSITION_X/Y` maxima of a touchscreen.
pub fn touch_range(device: &Device) -> Option<(i32, i32)> {
    let state = device.get_abs_state().ok()?;
    let x = state
        .get(usize::from(AbsoluteAxisCode::ABS_MT_POSITION_X.0))?
        .maximum;
    let y = state
        .get(usize::from(AbsoluteAxisCode::ABS_MT_POSITION_Y.0))?
        .maximum;
    (x > 0 && y > 0).then_some((x, y))
}

/// List every input device with its classified kind, sorted by path.
pub fn enumerate() -> Vec<DeviceSummary> {
    let mut out: Vec<DeviceSummary> = evdev::enumerate()
        .map(|(path, device)| DeviceSummary {
            name: device.name().unwrap_or("unnamed").to_string(),
            kind: device_caps(&device).classify(),
            path,
        })
        .collect();
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

/// The first real touchscreen with its multi-touch axis maxima.
pub fn find_touchscreen() -> Option<(DeviceSummary, (i32, i32))> {
    let mut found: Vec<(DeviceSummary, (i32, i32))> = evdev::enumerate()
        .filter_map(|(path, device)| {
            let name = device.name().unwrap_or("unnamed").to_string();
            if is_own_device(&name) {
                return None;
            }
            let kind = device_caps(&device).classify();
            if kind != DeviceKind::Touch {
                return None;
            }
            let range = touch_range(&device)?;
            Some((DeviceSummary { path, name, kind }, range))
        })
        .collect();
    found.sort_by(|a, b| a.0.path.cmp(&b.0.path));
    found.into_iter().next()
}

/// `[min, max]` of every absolute axis the device reports.
pub fn abs_ranges(device: &Device) -> HashMap<u16, [i32; 2]> {
    let Ok(state) = device.get_abs_state() else {
        return HashMap::new();
    };
    device
        .supported_absolute_axes()
        .map(|axes| {
            axes.iter()
                .filter_map(|axis| {
                    let info = state.get(usize::from(axis.0))?;
                    Some((axis.0, [info.minimum, info.maximum]))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Every gamepad whose name matches `pattern`, with its axis ranges.
pub fn find_gamepads(pattern: &Regex) -> Vec<(DeviceSummary, HashMap<u16, [i32; 2]>)> {
    let mut found: Vec<(DeviceSummary, HashMap<u16, [i32; 2]>)> = evdev::enumerate()
        .filter_map(|(path, device)| {
            let name = device.name().unwrap_or("unnamed").to_string();
            if is_own_device(&name) || !pattern.is_match(&name) {
                return None;
            }
            let kind = device_caps(&device).classify();
            if kind != DeviceKind::Gamepad {
                return None;
            }
            let ranges = abs_ranges(&device);
            Some((DeviceSummary { path, name, kind }, ranges))
        })
        .collect();
    found.sort_by(|a, b| a.0.path.cmp(&b.0.path));
    found
}
