//! Direct writes to a real touchscreen node.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use evdev::Device;
use touchslot_types::OrientationCell;
use tracing::info;

use super::probe::touch_range;
use crate::error::InputError;
use crate::stream::StreamSink;

/// Open `/dev/input/event<index>` for writing touch frames scaled to its
/// own multi-touch axis range.
pub fn open_direct(index: u32, orientation: OrientationCell) -> Result<StreamSink<File>, InputError> {
    let path = PathBuf::from(format!("/dev/input/event{index}"));
    let device =
        Device::open(&path).map_err(|e| InputError::DeviceOpen(format!("{}: {e}", path.display())))?;
    let (max_x, max_y) = touch_range(&device).ok_or_else(|| {
        InputError::DeviceOpen(format!("{}: not a multi-touch screen", path.display()))
    })?;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|e| InputError::DeviceOpen(format!("{}: {e}", path.display())))?;
    info!(
        device = device.name().unwrap_or_default(),
        path = %path.display(),
        max_x,
        max_y,
        "writing touches directly to touchscreen"
    );
    Ok(StreamSink::new(file, orientation, max_x, max_y))
}
