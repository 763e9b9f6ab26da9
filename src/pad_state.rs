use crate::constants::REST_EPSILON;

/// Logical Xbox 360 buttons the mapper can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    A,
    B,
    X,
    Y,
    LeftShoulder,
    RightShoulder,
    LeftTrigger,
    RightTrigger,
    Start,
    Select,
    LeftThumbClick,
    RightThumbClick,
}

impl Button {
    pub const ALL: [Button; 12] = [
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::LeftShoulder,
        Button::RightShoulder,
        Button::LeftTrigger,
        Button::RightTrigger,
        Button::Start,
        Button::Select,
        Button::LeftThumbClick,
        Button::RightThumbClick,
    ];

    /// The analog trigger behind this button, if it is one.
    pub fn trigger(self) -> Option<Trigger> {
        match self {
            Button::LeftTrigger => Some(Trigger::Left),
            Button::RightTrigger => Some(Trigger::Right),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::A => "A",
            Button::B => "B",
            Button::X => "X",
            Button::Y => "Y",
            Button::LeftShoulder => "LB",
            Button::RightShoulder => "RB",
            Button::LeftTrigger => "LT",
            Button::RightTrigger => "RT",
            Button::Start => "Start",
            Button::Select => "Back",
            Button::LeftThumbClick => "LS",
            Button::RightThumbClick => "RS",
        }
    }

    /// Parses a button name, case-insensitively. Accepts both the short
    /// pad labels (`lb`, `rt`, `ls`) and the long names (`leftshoulder`).
    pub fn from_name(name: &str) -> Option<Self> {
        let b = match name.to_ascii_lowercase().as_str() {
            "a" => Button::A,
            "b" => Button::B,
            "x" => Button::X,
            "y" => Button::Y,
            "lb" | "leftshoulder" => Button::LeftShoulder,
            "rb" | "rightshoulder" => Button::RightShoulder,
            "lt" | "lefttrigger" => Button::LeftTrigger,
            "rt" | "righttrigger" => Button::RightTrigger,
            "start" => Button::Start,
            "back" | "select" => Button::Select,
            "ls" | "l3" | "leftthumb" => Button::LeftThumbClick,
            "rs" | "r3" | "rightthumb" => Button::RightThumbClick,
            _ => return None,
        };
        Some(b)
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Left,
    Right,
}

/// Pressed/released flag per logical button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pressed: [bool; 12],
}

impl ButtonState {
    pub fn set(&mut self, button: Button, pressed: bool) {
        self.pressed[button.index()] = pressed;
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed[button.index()]
    }

    pub fn held(&self) -> impl Iterator<Item = Button> + '_ {
        Button::ALL.into_iter().filter(|b| self.is_pressed(*b))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Movement flags mirroring the physical state of the movement keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionalInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl DirectionalInput {
    pub fn set(&mut self, dir: Direction, held: bool) {
        match dir {
            Direction::Up => self.up = held,
            Direction::Down => self.down = held,
            Direction::Left => self.left = held,
            Direction::Right => self.right = held,
        }
    }

    /// Sum of the unit vectors of every held direction; opposites cancel.
    pub fn to_axis(self) -> AxisVector {
        fn unit(held: bool, sign: f32) -> f32 {
            if held { sign } else { 0.0 }
        }
        AxisVector {
            x: unit(self.right, 1.0) + unit(self.left, -1.0),
            y: unit(self.up, 1.0) + unit(self.down, -1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisVector {
    pub x: f32,
    pub y: f32,
}

impl AxisVector {
    pub const NEUTRAL: AxisVector = AxisVector { x: 0.0, y: 0.0 };

    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(-1.0, 1.0),
            y: self.y.clamp(-1.0, 1.0),
        }
    }

    pub fn with_deadzone(self, deadzone: f32) -> Self {
        Self {
            x: apply_deadzone(self.x, deadzone),
            y: apply_deadzone(self.y, deadzone),
        }
    }

    pub fn inverted_y(self) -> Self {
        Self {
            x: self.x,
            y: -self.y,
        }
    }

    #[cfg(test)]
    pub fn magnitude(self) -> f32 {
        self.x.hypot(self.y)
    }
}

#[inline]
pub fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone { 0.0 } else { value }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Triggers {
    pub left: f32,
    pub right: f32,
}

impl Triggers {
    pub fn set(&mut self, trigger: Trigger, value: f32) {
        let value = value.clamp(0.0, 1.0);
        match trigger {
            Trigger::Left => self.left = value,
            Trigger::Right => self.right = value,
        }
    }
}

/// Everything the mapper knows about the emulated pad.
#[derive(Debug, Clone, Default)]
pub struct ControllerState {
    pub buttons: ButtonState,
    pub directions: DirectionalInput,
    pub left_stick: AxisVector,
    /// Raw mouse accumulator; decays every frame.
    pub right_stick: AxisVector,
    pub triggers: Triggers,
    pub capture: bool,
    pub stopping: bool,
}

impl ControllerState {
    pub fn new(capture: bool) -> Self {
        Self {
            capture,
            ..Self::default()
        }
    }

    /// Returns every input to neutral. Capture and stop flags are left alone.
    pub fn reset(&mut self) {
        self.buttons = ButtonState::default();
        self.directions = DirectionalInput::default();
        self.left_stick = AxisVector::NEUTRAL;
        self.right_stick = AxisVector::NEUTRAL;
        self.triggers = Triggers::default();
    }

    pub fn accumulate_motion(&mut self, dx: f32, dy: f32, gain: f32) {
        self.right_stick = AxisVector {
            x: self.right_stick.x + dx * gain,
            y: self.right_stick.y + dy * gain,
        }
        .clamped();
    }

    pub fn recompute_left_stick(&mut self) {
        self.left_stick = self.directions.to_axis().clamped();
    }

    pub fn decay_right_stick(&mut self, decay: f32) {
        let settle = |v: f32| {
            let v = v * decay;
            if v.abs() < REST_EPSILON { 0.0 } else { v }
        };
        self.right_stick = AxisVector {
            x: settle(self.right_stick.x),
            y: settle(self.right_stick.y),
        }
        .clamped();
    }

    /// Stick values as the device should see them: deadzone applied and
    /// Y flipped to the device convention. Returns `(left, right)`.
    pub fn output_sticks(&self, deadzone: f32) -> (AxisVector, AxisVector) {
        let out = |v: AxisVector| v.clamped().with_deadzone(deadzone).inverted_y();
        (out(self.left_stick), out(self.right_stick))
    }
}
