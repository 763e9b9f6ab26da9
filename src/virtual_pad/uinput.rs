//! uinput backend. Presents itself like a wired pad driven by xpad, so
//! SDL and Wine pick it up as an Xbox 360 controller.

use std::io;

use evdev::{
    AbsInfo, AbsoluteAxisType, AttributeSet, BusType, EventType, InputEvent, InputId, Key,
    UinputAbsSetup,
    uinput::{VirtualDevice, VirtualDeviceBuilder},
};
use tracing::{debug, info};

use super::{PadDevice, PadError, PadReport};
use crate::constants::xusb_bits;

const DEVICE_NAME: &str = "Microsoft X-Box 360 pad";
const VENDOR_MICROSOFT: u16 = 0x045e;
const PRODUCT_X360_WIRED: u16 = 0x028e;

const BUTTON_KEYS: [(u16, Key); 10] = [
    (xusb_bits::A, Key::BTN_SOUTH),
    (xusb_bits::B, Key::BTN_EAST),
    (xusb_bits::X, Key::BTN_NORTH),
    (xusb_bits::Y, Key::BTN_WEST),
    (xusb_bits::LEFT_SHOULDER, Key::BTN_TL),
    (xusb_bits::RIGHT_SHOULDER, Key::BTN_TR),
    (xusb_bits::BACK, Key::BTN_SELECT),
    (xusb_bits::START, Key::BTN_START),
    (xusb_bits::LEFT_THUMB, Key::BTN_THUMBL),
    (xusb_bits::RIGHT_THUMB, Key::BTN_THUMBR),
];

const THUMB_AXES: [AbsoluteAxisType; 4] = [
    AbsoluteAxisType::ABS_X,
    AbsoluteAxisType::ABS_Y,
    AbsoluteAxisType::ABS_RX,
    AbsoluteAxisType::ABS_RY,
];

const TRIGGER_AXES: [AbsoluteAxisType; 2] = [AbsoluteAxisType::ABS_Z, AbsoluteAxisType::ABS_RZ];

pub struct UinputDevice {
    device: VirtualDevice,
}

impl UinputDevice {
    pub fn create() -> Result<Self, PadError> {
        let builder = VirtualDeviceBuilder::new()
            .map_err(|e| PadError::Connect(format!("/dev/uinput: {e}")))?;
        let device = describe(builder)
            .and_then(VirtualDeviceBuilder::build)
            .map_err(|e| PadError::Plugin(e.to_string()))?;
        info!("uinput Xbox 360 pad created");
        Ok(Self { device })
    }
}

fn describe(builder: VirtualDeviceBuilder<'_>) -> io::Result<VirtualDeviceBuilder<'_>> {
    let mut keys = AttributeSet::<Key>::new();
    for (_, key) in BUTTON_KEYS {
        keys.insert(key);
    }

    let mut builder = builder
        .name(DEVICE_NAME)
        .input_id(InputId::new(
            BusType::BUS_USB,
            VENDOR_MICROSOFT,
            PRODUCT_X360_WIRED,
            0x0114,
        ))
        .with_keys(&keys)?;

    for axis in THUMB_AXES {
        let info = AbsInfo::new(0, -32768, 32767, 16, 128, 0);
        builder = builder.with_absolute_axis(&UinputAbsSetup::new(axis, info))?;
    }
    for axis in TRIGGER_AXES {
        let info = AbsInfo::new(0, 0, 255, 0, 0, 0);
        builder = builder.with_absolute_axis(&UinputAbsSetup::new(axis, info))?;
    }
    Ok(builder)
}

fn abs(axis: AbsoluteAxisType, value: i32) -> InputEvent {
    InputEvent::new(EventType::ABSOLUTE, axis.0, value)
}

impl PadDevice for UinputDevice {
    fn submit(&mut self, report: &PadReport) -> Result<(), PadError> {
        let mut events = Vec::with_capacity(BUTTON_KEYS.len() + 6);
        for (mask, key) in BUTTON_KEYS {
            let held = report.buttons & mask != 0;
            events.push(InputEvent::new(EventType::KEY, key.code(), held as i32));
        }
        // xpad reports Y with the opposite sign of the XUSB report.
        events.push(abs(AbsoluteAxisType::ABS_X, report.thumb_lx as i32));
        events.push(abs(AbsoluteAxisType::ABS_Y, -(report.thumb_ly as i32)));
        events.push(abs(AbsoluteAxisType::ABS_RX, report.thumb_rx as i32));
        events.push(abs(AbsoluteAxisType::ABS_RY, -(report.thumb_ry as i32)));
        events.push(abs(AbsoluteAxisType::ABS_Z, report.left_trigger as i32));
        events.push(abs(AbsoluteAxisType::ABS_RZ, report.right_trigger as i32));

        debug!(?report, "uinput update");
        self.device
            .emit(&events)
            .map_err(|e| PadError::Submit(e.to_string()))
    }
}
