//! Output side: the emulated Xbox 360 pad.
//!
//! [`VirtualPad`] is what the frame loop talks to. Device backends only
//! implement [`PadDevice`]; [`BufferedPad`] turns the individual setters into
//! one [`PadReport`] that is pushed to the device on `commit`.

#[cfg(target_os = "linux")]
mod uinput;
#[cfg(windows)]
mod vigem;

use thiserror::Error;

use crate::{
    constants::{THUMB_MAX, TRIGGER_MAX, xusb_bits},
    pad_state::{Button, Trigger},
};

#[derive(Debug, Clone, Error)]
pub enum PadError {
    #[error("cannot reach the virtual gamepad driver: {0}")]
    Connect(String),
    #[error("cannot plug in the virtual controller: {0}")]
    Plugin(String),
    #[error("virtual controller rejected the update: {0}")]
    Submit(String),
    #[cfg_attr(any(windows, target_os = "linux"), allow(dead_code))]
    #[error("no virtual controller backend for {0}")]
    Unsupported(&'static str),
}

pub trait VirtualPad {
    fn set_left_stick(&mut self, x: f32, y: f32);
    fn set_right_stick(&mut self, x: f32, y: f32);
    fn set_trigger(&mut self, trigger: Trigger, value: f32);
    fn press_button(&mut self, button: Button);
    fn release_button(&mut self, button: Button);
    /// Neutral sticks, released triggers and buttons. Not visible until `commit`.
    fn reset_all(&mut self);
    fn commit(&mut self) -> Result<(), PadError>;
}

/// One XUSB input report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PadReport {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

pub trait PadDevice {
    fn submit(&mut self, report: &PadReport) -> Result<(), PadError>;
}

/// Report bit for a digital button. Triggers are analog and have none.
pub fn button_mask(button: Button) -> u16 {
    match button {
        Button::A => xusb_bits::A,
        Button::B => xusb_bits::B,
        Button::X => xusb_bits::X,
        Button::Y => xusb_bits::Y,
        Button::LeftShoulder => xusb_bits::LEFT_SHOULDER,
        Button::RightShoulder => xusb_bits::RIGHT_SHOULDER,
        Button::Start => xusb_bits::START,
        Button::Select => xusb_bits::BACK,
        Button::LeftThumbClick => xusb_bits::LEFT_THUMB,
        Button::RightThumbClick => xusb_bits::RIGHT_THUMB,
        Button::LeftTrigger | Button::RightTrigger => 0,
    }
}

#[inline]
fn thumb(v: f32) -> i16 {
    (v.clamp(-1.0, 1.0) * THUMB_MAX).round() as i16
}

#[inline]
fn trigger(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * TRIGGER_MAX).round() as u8
}

pub struct BufferedPad<D> {
    device: D,
    report: PadReport,
}

impl<D: PadDevice> BufferedPad<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            report: PadReport::default(),
        }
    }
}

impl<D: PadDevice> VirtualPad for BufferedPad<D> {
    fn set_left_stick(&mut self, x: f32, y: f32) {
        self.report.thumb_lx = thumb(x);
        self.report.thumb_ly = thumb(y);
    }

    fn set_right_stick(&mut self, x: f32, y: f32) {
        self.report.thumb_rx = thumb(x);
        self.report.thumb_ry = thumb(y);
    }

    fn set_trigger(&mut self, side: Trigger, value: f32) {
        match side {
            Trigger::Left => self.report.left_trigger = trigger(value),
            Trigger::Right => self.report.right_trigger = trigger(value),
        }
    }

    fn press_button(&mut self, button: Button) {
        self.report.buttons |= button_mask(button);
    }

    fn release_button(&mut self, button: Button) {
        self.report.buttons &= !button_mask(button);
    }

    fn reset_all(&mut self) {
        self.report = PadReport::default();
    }

    fn commit(&mut self) -> Result<(), PadError> {
        self.device.submit(&self.report)
    }
}

/// Connects to the platform's virtual gamepad driver and plugs in one pad.
#[cfg(windows)]
pub fn open() -> Result<Box<dyn VirtualPad>, PadError> {
    Ok(Box::new(BufferedPad::new(vigem::VigemDevice::connect()?)))
}

/// Connects to the platform's virtual gamepad driver and plugs in one pad.
#[cfg(target_os = "linux")]
pub fn open() -> Result<Box<dyn VirtualPad>, PadError> {
    Ok(Box::new(BufferedPad::new(uinput::UinputDevice::create()?)))
}

#[cfg(not(any(windows, target_os = "linux")))]
pub fn open() -> Result<Box<dyn VirtualPad>, PadError> {
    Err(PadError::Unsupported(std::env::consts::OS))
}
