//! Device classification from capability bits.

use touchslot_types::{codes, DeviceKind};

/// Name prefix shared by every virtual device this process creates.
pub const OWN_DEVICE_PREFIX: &str = "touchslot-";

/// Capability codes a device advertises, by event type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceCaps {
    pub keys: Vec<u16>,
    pub rel: Vec<u16>,
    pub abs: Vec<u16>,
}

impl DeviceCaps {
    fn has_key(&self, code: u16) -> bool {
        self.keys.contains(&code)
    }

    fn has_rel(&self, code: u16) -> bool {
        self.rel.contains(&code)
    }

    fn has_abs(&self, code: u16) -> bool {
        self.abs.contains(&code)
    }

    /// Decide what kind of device this is.
    ///
    /// Checked in order touch, mouse, keyboard, gamepad; a device that
    /// matches none is [`DeviceKind::Unknown`].
    pub fn classify(&self) -> DeviceKind {
        if self.has_abs(codes::ABS_MT_POSITION_X)
            && self.has_abs(codes::ABS_MT_POSITION_Y)
            && self.has_abs(codes::ABS_MT_SLOT)
            && self.has_abs(codes::ABS_MT_TRACKING_ID)
        {
            return DeviceKind::Touch;
        }
        if self.has_rel(codes::REL_X)
            && self.has_rel(codes::REL_Y)
            && self.has_rel(codes::REL_WHEEL)
            && self.has_key(codes::BTN_LEFT)
            && self.has_key(codes::BTN_RIGHT)
        {
            return DeviceKind::Mouse;
        }
        if (codes::KEY_ESC..=codes::KEY_SCROLLLOCK).all(|k| self.has_key(k)) {
            return DeviceKind::Keyboard;
        }
        let sticks = (codes::ABS_X..=codes::ABS_RZ)
            .filter(|a| self.has_abs(*a))
            .count();
        if sticks >= 4 {
            return DeviceKind::Gamepad;
        }
        DeviceKind::Unknown
    }
}

/// Whether `name` belongs to a virtual device created by this process.
pub fn is_own_device(name: &str) -> bool {
    name.starts_with(OWN_DEVICE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touchscreen_needs_all_mt_axes() {
        let mut caps = DeviceCaps {
            abs: vec![
                codes::ABS_MT_SLOT,
                codes::ABS_MT_POSITION_X,
                codes::ABS_MT_POSITION_Y,
            ],
            ..DeviceCaps::default()
        };
        assert_eq!(caps.classify(), DeviceKind::Unknown);
        caps.abs.push(codes::ABS_MT_TRACKING_ID);
        assert_eq!(caps.classify(), DeviceKind::Touch);
    }

    #[test]
    fn mouse_requires_wheel_and_two_buttons() {
        let caps = DeviceCaps {
            keys: vec![codes::BTN_LEFT, codes::BTN_RIGHT],
            rel: vec![codes::REL_X, codes::REL_Y, codes::REL_WHEEL],
            abs: vec![],
        };
        assert_eq!(caps.classify(), DeviceKind::Mouse);

        let touchpad = DeviceCaps {
            rel: vec![codes::REL_X, codes::REL_Y],
            ..caps
        };
        assert_eq!(touchpad.classify(), DeviceKind::Unknown);
    }

    #[test]
    fn keyboard_needs_the_full_main_block() {
        let mut caps = DeviceCaps {
            keys: (codes::KEY_ESC..=codes::KEY_SCROLLLOCK).collect(),
            ..DeviceCaps::default()
        };
        assert_eq!(caps.classify(), DeviceKind::Keyboard);
        caps.keys.retain(|k| *k != 30);
        assert_eq!(caps.classify(), DeviceKind::Unknown);
    }

    #[test]
    fn gamepad_needs_four_stick_axes() {
        let caps = DeviceCaps {
            abs: vec![0, 1, 3],
            ..DeviceCaps::default()
        };
        assert_eq!(caps.classify(), DeviceKind::Unknown);
        let caps = DeviceCaps {
            abs: vec![0, 1, 3, 4, 16, 17],
            ..DeviceCaps::default()
        };
        assert_eq!(caps.classify(), DeviceKind::Gamepad);
    }

    #[test]
    fn own_devices_are_recognized() {
        assert!(is_own_device("touchslot-touchscreen"));
        assert!(is_own_device("touchslot-virtual-input"));
        assert!(!is_own_device("Logitech USB Receiver"));
    }
}
