// Mouse motion
pub const DEFAULT_SENSITIVITY: f32 = 1.5;
pub const MOTION_SCALE: f32 = 0.01;
/// Mouse stick components below this are at rest; keeps the decay from
/// stalling on subnormal floats.
pub const REST_EPSILON: f32 = 1e-4;

// Classic preset
pub const CLASSIC_DECAY: f32 = 0.95;
pub const CLASSIC_DEADZONE: f32 = 0.10;
pub const CLASSIC_FPS: u32 = 60;

// Tight preset
pub const TIGHT_DECAY: f32 = 0.92;
pub const TIGHT_DEADZONE: f32 = 0.05;
pub const TIGHT_FPS: u32 = 120;

pub const MAX_FPS: u32 = 1000;

// Output ranges
pub const THUMB_MAX: f32 = i16::MAX as f32;
pub const TRIGGER_MAX: f32 = u8::MAX as f32;

// Window
pub const WINDOW_TITLE: &str = "Xbox 360 Controller Emulator";
pub const WINDOW_SIZE: [f32; 2] = [400.0, 300.0];

// XUSB report button bits
pub mod xusb_bits {
    pub const START: u16 = 0x0010;
    pub const BACK: u16 = 0x0020;
    pub const LEFT_THUMB: u16 = 0x0040;
    pub const RIGHT_THUMB: u16 = 0x0080;
    pub const LEFT_SHOULDER: u16 = 0x0100;
    pub const RIGHT_SHOULDER: u16 = 0x0200;
    pub const A: u16 = 0x1000;
    pub const B: u16 = 0x2000;
    pub const X: u16 = 0x4000;
    pub const Y: u16 = 0x8000;
}
