//! uinput virtual devices: the touchscreen the engine drives and the
//! keyboard/mouse that replays passthrough input.

use std::fs::File;
use std::os::fd::AsFd;

use async_trait::async_trait;
use evdev::uinput::VirtualDevice;
use evdev::{
    AbsInfo, AbsoluteAxisCode, AttributeSet, KeyCode, PropType, RelativeAxisCode, UinputAbsSetup,
};
use touchslot_types::{codes, OrientationCell, PassthroughEvent, TouchFrame, CANONICAL_MAX};
use tracing::{debug, info};

use crate::error::InputError;
use crate::stream::StreamSink;
use crate::{InputEmulation, TouchSink};

pub const TOUCHSCREEN_NAME: &str = "touchslot-touchscreen";
pub const VIRTUAL_INPUT_NAME: &str = "touchslot-virtual-input";

fn create_err(e: std::io::Error) -> InputError {
    InputError::VirtualDeviceCreate(e.to_string())
}

/// The virtual touchscreen.
///
/// Frames are encoded by a [`StreamSink`] writing raw kernel records to a
/// clone of the uinput fd; the device itself is kept so it lives as long
/// as the sink.
pub struct UinputTouch {
    _device: VirtualDevice,
    inner: StreamSink<File>,
}

impl UinputTouch {
    pub fn create(orientation: OrientationCell) -> Result<Self, InputError> {
        let mut keys = AttributeSet::<KeyCode>::new();
        keys.insert(KeyCode::BTN_TOUCH);
        let mut props = AttributeSet::<PropType>::new();
        props.insert(PropType::DIRECT);

        let position = AbsInfo::new(0, 0, CANONICAL_MAX, 0, 0, 0);
        let device = VirtualDevice::builder()
            .map_err(create_err)?
            .name(TOUCHSCREEN_NAME)
            .with_keys(&keys)
            .map_err(create_err)?
            .with_properties(&props)
            .map_err(create_err)?
            .with_absolute_axis(&UinputAbsSetup::new(
                AbsoluteAxisCode::ABS_MT_SLOT,
                AbsInfo::new(0, 0, 9, 0, 0, 0),
            ))
            .map_err(create_err)?
            .with_absolute_axis(&UinputAbsSetup::new(
                AbsoluteAxisCode::ABS_MT_TOUCH_MAJOR,
                AbsInfo::new(0, 0, 255, 0, 0, 0),
            ))
            .map_err(create_err)?
            .with_absolute_axis(&UinputAbsSetup::new(
                AbsoluteAxisCode::ABS_MT_POSITION_X,
                position,
            ))
            .map_err(create_err)?
            .with_absolute_axis(&UinputAbsSetup::new(
                AbsoluteAxisCode::ABS_MT_POSITION_Y,
                position,
            ))
            .map_err(create_err)?
            .with_absolute_axis(&UinputAbsSetup::new(
                AbsoluteAxisCode::ABS_MT_TRACKING_ID,
                AbsInfo::new(0, 0, 65535, 0, 0, 0),
            ))
            .map_err(create_err)?
            .build()
            .map_err(create_err)?;

        let fd = device.as_fd().try_clone_to_owned().map_err(create_err)?;
        info!(name = TOUCHSCREEN_NAME, "created virtual touchscreen");
        Ok(Self {
            _device: device,
            inner: StreamSink::new(File::from(fd), orientation, CANONICAL_MAX, CANONICAL_MAX),
        })
    }
}

#[async_trait]
impl TouchSink for UinputTouch {
    async fn apply(&mut self, frame: &TouchFrame) -> Result<(), InputError> {
        self.inner.apply(frame).await
    }

    async fn shutdown(&mut self) -> Result<(), InputError> {
        self.inner.shutdown().await?;
        info!(name = TOUCHSCREEN_NAME, "destroyed virtual touchscreen");
        Ok(())
    }
}

/// Virtual keyboard and mouse for passthrough while mapping is off.
pub struct VirtualInput {
    device: VirtualDevice,
}

impl VirtualInput {
    pub fn create() -> Result<Self, InputError> {
        let mut keys = AttributeSet::<KeyCode>::new();
        for code in 0..=255 {
            keys.insert(KeyCode(code));
        }
        for code in codes::BTN_LEFT..codes::BTN_TASK {
            keys.insert(KeyCode(code));
        }
        let mut rel = AttributeSet::<RelativeAxisCode>::new();
        rel.insert(RelativeAxisCode::REL_X);
        rel.insert(RelativeAxisCode::REL_Y);
        rel.insert(RelativeAxisCode::REL_WHEEL);
        rel.insert(RelativeAxisCode::REL_HWHEEL);

        let device = VirtualDevice::builder()
            .map_err(create_err)?
            .name(VIRTUAL_INPUT_NAME)
            .with_keys(&keys)
            .map_err(create_err)?
            .with_relative_axes(&rel)
            .map_err(create_err)?
            .build()
            .map_err(create_err)?;
        info!(name = VIRTUAL_INPUT_NAME, "created virtual keyboard/mouse");
        Ok(Self { device })
    }
}

#[async_trait]
impl InputEmulation for VirtualInput {
    async fn emit(&mut self, event: PassthroughEvent) -> Result<(), InputError> {
        // emit() appends its own SYN_REPORT.
        let events: Vec<evdev::InputEvent> = event
            .to_raw()
            .iter()
            .filter(|e| !e.is_syn_report())
            .map(|e| evdev::InputEvent::new(e.kind, e.code, e.value))
            .collect();
        self.device
            .emit(&events)
            .map_err(|e| InputError::Inject(e.to_string()))?;
        debug!(?event, "emitted passthrough event");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), InputError> {
        info!(name = VIRTUAL_INPUT_NAME, "destroyed virtual keyboard/mouse");
        Ok(())
    }
}
