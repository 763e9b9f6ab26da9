use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail, ensure};
use clap::{Parser, ValueEnum};
use eframe::egui::{Key, PointerButton};

use crate::{
    constants::*,
    pad_state::{Button, Direction},
};

/// Physical input that can be bound to a pad button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Key(Key),
    Mouse(PointerButton),
}

impl InputSource {
    /// Accepts egui key names (`W`, `Space`, `Tab`) and
    /// `Mouse1`..`Mouse5` / `MouseLeft` / `MouseRight` / `MouseMiddle`.
    pub fn parse(name: &str) -> Result<Self> {
        let mouse = match name.to_ascii_lowercase().as_str() {
            "mouse1" | "mouseleft" => Some(PointerButton::Primary),
            "mouse2" | "mouseright" => Some(PointerButton::Secondary),
            "mouse3" | "mousemiddle" => Some(PointerButton::Middle),
            "mouse4" => Some(PointerButton::Extra1),
            "mouse5" => Some(PointerButton::Extra2),
            _ => None,
        };
        if let Some(b) = mouse {
            return Ok(Self::Mouse(b));
        }
        parse_key(name).map(Self::Key)
    }

    pub fn label(&self) -> String {
        match self {
            Self::Key(k) => k.name().to_string(),
            Self::Mouse(PointerButton::Primary) => "Left mouse".into(),
            Self::Mouse(PointerButton::Secondary) => "Right mouse".into(),
            Self::Mouse(PointerButton::Middle) => "Middle mouse".into(),
            Self::Mouse(PointerButton::Extra1) => "Mouse 4".into(),
            Self::Mouse(PointerButton::Extra2) => "Mouse 5".into(),
        }
    }
}

pub fn parse_key(name: &str) -> Result<Key> {
    Key::from_name(name).ok_or_else(|| anyhow!("unknown key name '{name}'"))
}

/// Key and mouse assignments.
#[derive(Debug, Clone, PartialEq)]
pub struct Bindings {
    pub movement: Vec<(Key, Direction)>,
    pub buttons: Vec<(InputSource, Button)>,
    pub toggle_capture: Key,
    pub quit: Key,
}

impl Default for Bindings {
    fn default() -> Self {
        use Button::*;
        let keys = [
            (Key::Space, Y),
            (Key::F, Y),
            (Key::G, A),
            (Key::R, B),
            (Key::Q, LeftShoulder),
            (Key::E, RightShoulder),
            (Key::Enter, Start),
            (Key::Backspace, Select),
            (Key::Z, LeftThumbClick),
            (Key::C, RightThumbClick),
        ];
        let mouse = [
            (PointerButton::Primary, X),
            (PointerButton::Secondary, RightTrigger),
            (PointerButton::Middle, LeftTrigger),
        ];

        let mut buttons: Vec<_> = keys
            .into_iter()
            .map(|(k, b)| (InputSource::Key(k), b))
            .collect();
        buttons.extend(mouse.into_iter().map(|(m, b)| (InputSource::Mouse(m), b)));

        Self {
            movement: vec![
                (Key::W, Direction::Up),
                (Key::S, Direction::Down),
                (Key::A, Direction::Left),
                (Key::D, Direction::Right),
            ],
            buttons,
            toggle_capture: Key::Tab,
            quit: Key::Escape,
        }
    }
}

impl Bindings {
    pub fn direction_for_key(&self, key: Key) -> Option<Direction> {
        self.movement
            .iter()
            .find_map(|(k, d)| (*k == key).then_some(*d))
    }

    pub fn button_for(&self, source: InputSource) -> Option<Button> {
        self.buttons
            .iter()
            .find_map(|(s, b)| (*s == source).then_some(*b))
    }

    /// Binds `source` to `button`, replacing any earlier binding of `source`.
    pub fn bind(&mut self, source: InputSource, button: Button) {
        self.buttons.retain(|(s, _)| *s != source);
        self.buttons.push((source, button));
    }

    pub fn set_movement(&mut self, dir: Direction, key: Key) {
        self.movement.retain(|(_, d)| *d != dir);
        self.movement.push((key, dir));
    }

    /// Parses `KEY=BUTTON`, e.g. `Space=A` or `Mouse2=LT`.
    pub fn parse_binding(text: &str) -> Result<(InputSource, Button)> {
        let (source, button) = text
            .split_once('=')
            .ok_or_else(|| anyhow!("binding '{text}' is not of the form KEY=BUTTON"))?;
        let source = InputSource::parse(source.trim())?;
        let button = Button::from_name(button.trim())
            .ok_or_else(|| anyhow!("unknown pad button '{}'", button.trim()))?;
        Ok((source, button))
    }
}

/// The two tunings the mapper ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Slower decay and a wide deadzone at 60 frames per second.
    Classic,
    /// Faster decay and a narrow deadzone at 120 frames per second.
    Tight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapperConfig {
    pub sensitivity: f32,
    pub decay: f32,
    pub deadzone: f32,
    pub fps: u32,
    pub start_captured: bool,
    pub bindings: Bindings,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self::preset(Preset::Classic)
    }
}

impl MapperConfig {
    pub fn preset(preset: Preset) -> Self {
        let (decay, deadzone, fps) = match preset {
            Preset::Classic => (CLASSIC_DECAY, CLASSIC_DEADZONE, CLASSIC_FPS),
            Preset::Tight => (TIGHT_DECAY, TIGHT_DEADZONE, TIGHT_FPS),
        };
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            decay,
            deadzone,
            fps,
            start_captured: false,
            bindings: Bindings::default(),
        }
    }

    /// Stick units per pixel of mouse motion.
    pub fn motion_gain(&self) -> f32 {
        self.sensitivity * MOTION_SCALE
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.sensitivity.is_finite() && self.sensitivity > 0.0,
            "sensitivity must be a positive number, got {}",
            self.sensitivity
        );
        ensure!(
            self.decay > 0.0 && self.decay < 1.0,
            "decay must lie strictly between 0 and 1, got {}",
            self.decay
        );
        ensure!(
            (0.0..1.0).contains(&self.deadzone),
            "deadzone must lie in [0, 1), got {}",
            self.deadzone
        );
        ensure!(
            (1..=MAX_FPS).contains(&self.fps),
            "fps must lie in 1..={MAX_FPS}, got {}",
            self.fps
        );

        let b = &self.bindings;
        for (i, (key, dir)) in b.movement.iter().enumerate() {
            if let Some((_, other)) = b.movement[..i].iter().find(|(k, _)| k == key) {
                bail!(
                    "key {} is bound to both {other:?} and {dir:?}",
                    key.name()
                );
            }
        }
        if b.toggle_capture == b.quit {
            bail!("capture toggle and quit share the key {}", b.quit.name());
        }
        for reserved in [b.toggle_capture, b.quit] {
            if b.direction_for_key(reserved).is_some()
                || b.button_for(InputSource::Key(reserved)).is_some()
            {
                bail!("key {} is reserved and cannot be bound", reserved.name());
            }
        }
        Ok(())
    }
}

/// Keyboard and mouse to virtual Xbox 360 controller mapper
#[derive(Parser, Debug)]
#[command(name = "kbm-x360", version)]
pub struct Cli {
    /// Tuning preset to start from
    #[arg(long, value_enum, default_value_t = Preset::Classic)]
    pub preset: Preset,

    /// Mouse sensitivity multiplier
    #[arg(short, long)]
    pub sensitivity: Option<f32>,

    /// Per-frame decay factor of the mouse stick (0 < decay < 1)
    #[arg(long)]
    pub decay: Option<f32>,

    /// Stick deadzone (0 <= deadzone < 1)
    #[arg(long)]
    pub deadzone: Option<f32>,

    /// Frames per second of the mapping loop
    #[arg(long)]
    pub fps: Option<u32>,

    /// Start with the mouse already captured
    #[arg(long)]
    pub capture: bool,

    /// Drop the built-in button bindings before applying --bind
    #[arg(long)]
    pub no_default_bindings: bool,

    /// Extra binding KEY=BUTTON (repeatable), e.g. --bind Space=A --bind Mouse2=LT
    #[arg(short, long = "bind", value_name = "KEY=BUTTON")]
    pub bindings: Vec<String>,

    /// Key for stick up
    #[arg(long, value_name = "KEY")]
    pub move_up: Option<String>,

    /// Key for stick down
    #[arg(long, value_name = "KEY")]
    pub move_down: Option<String>,

    /// Key for stick left
    #[arg(long, value_name = "KEY")]
    pub move_left: Option<String>,

    /// Key for stick right
    #[arg(long, value_name = "KEY")]
    pub move_right: Option<String>,

    /// Key that toggles mouse capture
    #[arg(long, value_name = "KEY")]
    pub toggle_key: Option<String>,

    /// Key that quits
    #[arg(long, value_name = "KEY")]
    pub quit_key: Option<String>,
}

impl Cli {
    pub fn into_config(self) -> Result<MapperConfig> {
        let mut cfg = MapperConfig::preset(self.preset);

        if let Some(s) = self.sensitivity {
            cfg.sensitivity = s;
        }
        if let Some(d) = self.decay {
            cfg.decay = d;
        }
        if let Some(d) = self.deadzone {
            cfg.deadzone = d;
        }
        if let Some(f) = self.fps {
            cfg.fps = f;
        }
        cfg.start_captured = self.capture;

        let b = &mut cfg.bindings;
        if self.no_default_bindings {
            b.buttons.clear();
        }
        for text in &self.bindings {
            let (source, button) =
                Bindings::parse_binding(text).with_context(|| format!("in --bind {text}"))?;
            b.bind(source, button);
        }

        let moves = [
            (self.move_up, Direction::Up),
            (self.move_down, Direction::Down),
            (self.move_left, Direction::Left),
            (self.move_right, Direction::Right),
        ];
        for (name, dir) in moves {
            if let Some(name) = name {
                b.set_movement(dir, parse_key(&name)?);
            }
        }
        if let Some(name) = self.toggle_key {
            b.toggle_capture = parse_key(&name)?;
        }
        if let Some(name) = self.quit_key {
            b.quit = parse_key(&name)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}
