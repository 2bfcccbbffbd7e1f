//! Linux key code names.
//!
//! Mappings and gamepad profiles refer to keys by their kernel header names
//! (`KEY_A`, `BTN_LEFT`, ...). Where the kernel defines aliases for one code,
//! the table carries the name mappings conventionally use.

/// Synthetic key fired by one upward tick of the vertical wheel.
pub const REL_WHEEL_UP: &str = "REL_WHEEL_UP";
/// Synthetic key fired by one downward tick of the vertical wheel.
pub const REL_WHEEL_DOWN: &str = "REL_WHEEL_DOWN";
/// Synthetic key fired by one rightward tick of the horizontal wheel.
pub const REL_HWHEEL_UP: &str = "REL_HWHEEL_UP";
/// Synthetic key fired by one leftward tick of the horizontal wheel.
pub const REL_HWHEEL_DOWN: &str = "REL_HWHEEL_DOWN";

/// Names that never correspond to a held key.
pub const WHEEL_KEYS: [&str; 4] = [REL_WHEEL_UP, REL_WHEEL_DOWN, REL_HWHEEL_UP, REL_HWHEEL_DOWN];

pub const BTN_LT: &str = "BTN_LT";
pub const BTN_RT: &str = "BTN_RT";
pub const BTN_SELECT: &str = "BTN_SELECT";
pub const BTN_RS: &str = "BTN_RS";
pub const BTN_DPAD_UP: &str = "BTN_DPAD_UP";
pub const BTN_DPAD_DOWN: &str = "BTN_DPAD_DOWN";
pub const BTN_DPAD_LEFT: &str = "BTN_DPAD_LEFT";
pub const BTN_DPAD_RIGHT: &str = "BTN_DPAD_RIGHT";
pub const KEY_LEFTSHIFT: &str = "KEY_LEFTSHIFT";

static KEY_NAMES: &[(u16, &str)] = &[
    (1, "KEY_ESC"),
    (2, "KEY_1"),
    (3, "KEY_2"),
    (4, "KEY_3"),
    (5, "KEY_4"),
    (6, "KEY_5"),
    (7, "KEY_6"),
    (8, "KEY_7"),
    (9, "KEY_8"),
    (10, "KEY_9"),
    (11, "KEY_0"),
    (12, "KEY_MINUS"),
    (13, "KEY_EQUAL"),
    (14, "KEY_BACKSPACE"),
    (15, "KEY_TAB"),
    (16, "KEY_Q"),
    (17, "KEY_W"),
    (18, "KEY_E"),
    (19, "KEY_R"),
    (20, "KEY_T"),
    (21, "KEY_Y"),
    (22, "KEY_U"),
    (23, "KEY_I"),
    (24, "KEY_O"),
    (25, "KEY_P"),
    (26, "KEY_LEFTBRACE"),
    (27, "KEY_RIGHTBRACE"),
    (28, "KEY_ENTER"),
    (29, "KEY_LEFTCTRL"),
    (30, "KEY_A"),
    (31, "KEY_S"),
    (32, "KEY_D"),
    (33, "KEY_F"),
    (34, "KEY_G"),
    (35, "KEY_H"),
    (36, "KEY_J"),
    (37, "KEY_K"),
    (38, "KEY_L"),
    (39, "KEY_SEMICOLON"),
    (40, "KEY_APOSTROPHE"),
    (41, "KEY_GRAVE"),
    (42, "KEY_LEFTSHIFT"),
    (43, "KEY_BACKSLASH"),
    (44, "KEY_Z"),
    (45, "KEY_X"),
    (46, "KEY_C"),
    (47, "KEY_V"),
    (48, "KEY_B"),
    (49, "KEY_N"),
    (50, "KEY_M"),
    (51, "KEY_COMMA"),
    (52, "KEY_DOT"),
    (53, "KEY_SLASH"),
    (54, "KEY_RIGHTSHIFT"),
    (55, "KEY_KPASTERISK"),
    (56, "KEY_LEFTALT"),
    (57, "KEY_SPACE"),
    (58, "KEY_CAPSLOCK"),
    (59, "KEY_F1"),
    (60, "KEY_F2"),
    (61, "KEY_F3"),
    (62, "KEY_F4"),
    (63, "KEY_F5"),
    (64, "KEY_F6"),
    (65, "KEY_F7"),
    (66, "KEY_F8"),
    (67, "KEY_F9"),
    (68, "KEY_F10"),
    (69, "KEY_NUMLOCK"),
    (70, "KEY_SCROLLLOCK"),
    (71, "KEY_KP7"),
    (72, "KEY_KP8"),
    (73, "KEY_KP9"),
    (74, "KEY_KPMINUS"),
    (75, "KEY_KP4"),
    (76, "KEY_KP5"),
    (77, "KEY_KP6"),
    (78, "KEY_KPPLUS"),
    (79, "KEY_KP1"),
    (80, "KEY_KP2"),
    (81, "KEY_KP3"),
    (82, "KEY_KP0"),
    (83, "KEY_KPDOT"),
    (87, "KEY_F11"),
    (88, "KEY_F12"),
    (96, "KEY_KPENTER"),
    (97, "KEY_RIGHTCTRL"),
    (98, "KEY_KPSLASH"),
    (99, "KEY_SYSRQ"),
    (100, "KEY_RIGHTALT"),
    (102, "KEY_HOME"),
    (103, "KEY_UP"),
    (104, "KEY_PAGEUP"),
    (105, "KEY_LEFT"),
    (106, "KEY_RIGHT"),
    (107, "KEY_END"),
    (108, "KEY_DOWN"),
    (109, "KEY_PAGEDOWN"),
    (110, "KEY_INSERT"),
    (111, "KEY_DELETE"),
    (113, "KEY_MUTE"),
    (114, "KEY_VOLUMEDOWN"),
    (115, "KEY_VOLUMEUP"),
    (116, "KEY_POWER"),
    (117, "KEY_KPEQUAL"),
    (119, "KEY_PAUSE"),
    (125, "KEY_LEFTMETA"),
    (126, "KEY_RIGHTMETA"),
    (127, "KEY_COMPOSE"),
    (139, "KEY_MENU"),
    (158, "KEY_BACK"),
    (159, "KEY_FORWARD"),
    (163, "KEY_NEXTSONG"),
    (164, "KEY_PLAYPAUSE"),
    (165, "KEY_PREVIOUSSONG"),
    (166, "KEY_STOPCD"),
    (172, "KEY_HOMEPAGE"),
    (183, "KEY_F13"),
    (184, "KEY_F14"),
    (185, "KEY_F15"),
    (186, "KEY_F16"),
    (187, "KEY_F17"),
    (188, "KEY_F18"),
    (189, "KEY_F19"),
    (190, "KEY_F20"),
    (191, "KEY_F21"),
    (192, "KEY_F22"),
    (193, "KEY_F23"),
    (194, "KEY_F24"),
    (217, "KEY_SEARCH"),
    (0x110, "BTN_LEFT"),
    (0x111, "BTN_RIGHT"),
    (0x112, "BTN_MIDDLE"),
    (0x113, "BTN_SIDE"),
    (0x114, "BTN_EXTRA"),
    (0x115, "BTN_FORWARD"),
    (0x116, "BTN_BACK"),
    (0x117, "BTN_TASK"),
    (0x130, "BTN_A"),
    (0x131, "BTN_B"),
    (0x132, "BTN_C"),
    (0x133, "BTN_X"),
    (0x134, "BTN_Y"),
    (0x135, "BTN_Z"),
    (0x136, "BTN_TL"),
    (0x137, "BTN_TR"),
    (0x138, "BTN_TL2"),
    (0x139, "BTN_TR2"),
    (0x13a, "BTN_SELECT"),
    (0x13b, "BTN_START"),
    (0x13c, "BTN_MODE"),
    (0x13d, "BTN_THUMBL"),
    (0x13e, "BTN_THUMBR"),
    (0x14a, "BTN_TOUCH"),
    (0x220, "BTN_DPAD_UP"),
    (0x221, "BTN_DPAD_DOWN"),
    (0x222, "BTN_DPAD_LEFT"),
    (0x223, "BTN_DPAD_RIGHT"),
];

/// Kernel name for a key code.
#[must_use]
pub fn key_name(code: u16) -> Option<&'static str> {
    KEY_NAMES
        .binary_search_by_key(&code, |(c, _)| *c)
        .ok()
        .map(|i| KEY_NAMES[i].1)
}

/// Key code for a kernel name.
#[must_use]
pub fn key_code(name: &str) -> Option<u16> {
    KEY_NAMES.iter().find(|(_, n)| *n == name).map(|(c, _)| *c)
}

#[must_use]
pub fn is_wheel_key(name: &str) -> bool {
    WHEEL_KEYS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_for_lookup() {
        assert!(KEY_NAMES.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn names_and_codes_agree() {
        assert_eq!(key_name(30), Some("KEY_A"));
        assert_eq!(key_code("BTN_LEFT"), Some(0x110));
        assert_eq!(key_name(0x13a), Some(BTN_SELECT));
        assert_eq!(key_code(KEY_LEFTSHIFT), Some(42));
        assert_eq!(key_name(0x2ff), None);
        assert_eq!(key_code("KEY_NOPE"), None);
    }

    #[test]
    fn wheel_keys_are_recognised() {
        assert!(is_wheel_key("REL_WHEEL_UP"));
        assert!(!is_wheel_key("KEY_W"));
    }
}
