//! Linux evdev capture and uinput devices.

mod capture;
mod direct;
mod probe;
mod uinput;

pub use capture::HotplugCapture;
pub use direct::open_direct;
pub use probe::{
    abs_ranges, device_caps, enumerate, find_gamepads, find_touchscreen, touch_range,
    DeviceSummary,
};
pub use uinput::{UinputTouch, VirtualInput, TOUCHSCREEN_NAME, VIRTUAL_INPUT_NAME};
