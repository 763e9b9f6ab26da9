use eframe::egui::{self, Key, PointerButton};
use tracing::{debug, info, trace};

use crate::{
    config::{Bindings, InputSource},
    pad_state::{Button, ControllerState},
    virtual_pad::{PadError, VirtualPad},
};

/// Raw input, already reduced to what the mapper cares about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown(Key),
    KeyUp(Key),
    MouseDown(PointerButton),
    MouseUp(PointerButton),
    MouseMotion { dx: f32, dy: f32 },
    ToggleCapture,
    Quit,
}

impl InputEvent {
    /// Key auto-repeat is not a transition and maps to `None`. The capture
    /// and quit keys become [`Self::ToggleCapture`] and [`Self::Quit`].
    pub fn from_egui(ev: &egui::Event, bindings: &Bindings) -> Option<Self> {
        match ev {
            egui::Event::Key {
                key,
                pressed,
                repeat,
                ..
            } => match (*pressed, *repeat) {
                (_, true) => None,
                (true, false) if *key == bindings.quit => Some(Self::Quit),
                (true, false) if *key == bindings.toggle_capture => Some(Self::ToggleCapture),
                (true, false) => Some(Self::KeyDown(*key)),
                (false, false) => Some(Self::KeyUp(*key)),
            },
            egui::Event::PointerButton {
                button, pressed, ..
            } => Some(if *pressed {
                Self::MouseDown(*button)
            } else {
                Self::MouseUp(*button)
            }),
            egui::Event::MouseMoved(delta) => Some(Self::MouseMotion {
                dx: delta.x,
                dy: delta.y,
            }),
            _ => None,
        }
    }
}

/// Whatever owns the host pointer. Told about every capture change.
pub trait PointerGrab {
    fn set_captured(&mut self, captured: bool);
}

/// Applies input events to the controller state.
#[derive(Debug, Clone)]
pub struct Sampler {
    bindings: Bindings,
    motion_gain: f32,
}

impl Sampler {
    pub fn new(bindings: Bindings, motion_gain: f32) -> Self {
        Self {
            bindings,
            motion_gain,
        }
    }

    /// Handles one event. Button changes are committed to `pad` right away;
    /// stick changes wait for the frame commit.
    pub fn apply(
        &self,
        state: &mut ControllerState,
        pad: &mut dyn VirtualPad,
        grab: &mut dyn PointerGrab,
        event: InputEvent,
    ) -> Result<(), PadError> {
        match event {
            InputEvent::Quit => {
                info!("quit requested");
                state.stopping = true;
            }
            InputEvent::ToggleCapture => self.toggle_capture(state, grab),
            InputEvent::KeyDown(key) => self.key(state, pad, key, true)?,
            InputEvent::KeyUp(key) => self.key(state, pad, key, false)?,
            InputEvent::MouseDown(b) => self.mouse(state, pad, b, true)?,
            InputEvent::MouseUp(b) => self.mouse(state, pad, b, false)?,
            InputEvent::MouseMotion { dx, dy } => {
                if state.capture {
                    state.accumulate_motion(dx, dy, self.motion_gain);
                } else {
                    trace!(dx, dy, "motion dropped, mouse not captured");
                }
            }
        }
        Ok(())
    }

    fn toggle_capture(&self, state: &mut ControllerState, grab: &mut dyn PointerGrab) {
        state.capture = !state.capture;
        grab.set_captured(state.capture);
        info!(captured = state.capture, "mouse capture toggled");
    }

    fn key(
        &self,
        state: &mut ControllerState,
        pad: &mut dyn VirtualPad,
        key: Key,
        pressed: bool,
    ) -> Result<(), PadError> {
        if let Some(dir) = self.bindings.direction_for_key(key) {
            state.directions.set(dir, pressed);
        }
        match self.bindings.button_for(InputSource::Key(key)) {
            Some(button) => set_button(state, pad, button, pressed),
            None => Ok(()),
        }
    }

    fn mouse(
        &self,
        state: &mut ControllerState,
        pad: &mut dyn VirtualPad,
        button: PointerButton,
        pressed: bool,
    ) -> Result<(), PadError> {
        match self.bindings.button_for(InputSource::Mouse(button)) {
            Some(b) => set_button(state, pad, b, pressed),
            None => Ok(()),
        }
    }
}

// Aliased sources are not reference counted: releasing any of them releases
// the pad button.
fn set_button(
    state: &mut ControllerState,
    pad: &mut dyn VirtualPad,
    button: Button,
    pressed: bool,
) -> Result<(), PadError> {
    state.buttons.set(button, pressed);
    match button.trigger() {
        Some(trigger) => {
            let value = if pressed { 1.0 } else { 0.0 };
            state.triggers.set(trigger, value);
            pad.set_trigger(trigger, value);
        }
        None if pressed => pad.press_button(button),
        None => pad.release_button(button),
    }
    debug!(button = button.name(), pressed, "button");
    pad.commit()
}


#[cfg(test)]
mod tests {
    use super::{testing::GrabLog, *};
    use crate::{
        config::MapperConfig,
        pad_state::{AxisVector, Trigger},
        virtual_pad::testing::{PadCall, RecordingPad},
    };

    struct Rig {
        sampler: Sampler,
        state: ControllerState,
        pad: RecordingPad,
        grab: GrabLog,
    }

    impl Rig {
        fn new(capture: bool) -> Self {
            let cfg = MapperConfig::default();
            Self {
                sampler: Sampler::new(cfg.bindings.clone(), cfg.motion_gain()),
                state: ControllerState::new(capture),
                pad: RecordingPad::default(),
                grab: GrabLog::default(),
            }
        }

        fn feed(&mut self, events: &[InputEvent]) {
            for ev in events {
                self.sampler
                    .apply(&mut self.state, &mut self.pad, &mut self.grab, *ev)
                    .unwrap();
            }
        }
    }

    #[test]
    fn press_and_release_commit_immediately() {
        let mut rig = Rig::new(false);
        rig.feed(&[InputEvent::KeyDown(Key::G)]);
        assert_eq!(rig.pad.calls(), vec![PadCall::Press(Button::A), PadCall::Commit]);
        assert!(rig.state.buttons.is_pressed(Button::A));

        rig.feed(&[InputEvent::KeyUp(Key::G)]);
        assert_eq!(
            rig.pad.calls(),
            vec![
                PadCall::Press(Button::A),
                PadCall::Commit,
                PadCall::Release(Button::A),
                PadCall::Commit,
            ]
        );
        assert!(!rig.state.buttons.is_pressed(Button::A));
        assert_eq!(rig.state.left_stick, AxisVector::NEUTRAL);
        assert_eq!(rig.state.right_stick, AxisVector::NEUTRAL);
    }

    #[test]
    fn releasing_one_alias_releases_the_button() {
        let mut rig = Rig::new(false);
        rig.feed(&[
            InputEvent::KeyDown(Key::Space),
            InputEvent::KeyDown(Key::F),
            InputEvent::KeyUp(Key::Space),
        ]);
        assert!(!rig.state.buttons.is_pressed(Button::Y));
        assert_eq!(rig.pad.count(|c| *c == PadCall::Press(Button::Y)), 2);
        assert_eq!(rig.pad.count(|c| *c == PadCall::Release(Button::Y)), 1);
        assert_eq!(rig.pad.calls().last(), Some(&PadCall::Commit));
    }

    #[test]
    fn mouse_buttons_follow_the_same_contract() {
        let mut rig = Rig::new(false);
        rig.feed(&[
            InputEvent::MouseDown(PointerButton::Primary),
            InputEvent::MouseUp(PointerButton::Primary),
        ]);
        assert_eq!(
            rig.pad.calls(),
            vec![
                PadCall::Press(Button::X),
                PadCall::Commit,
                PadCall::Release(Button::X),
                PadCall::Commit,
            ]
        );
    }

    #[test]
    fn trigger_buttons_drive_the_analog_trigger() {
        let mut rig = Rig::new(false);
        rig.feed(&[InputEvent::MouseDown(PointerButton::Secondary)]);
        assert_eq!(rig.state.triggers.right, 1.0);
        assert!(rig.state.buttons.is_pressed(Button::RightTrigger));
        assert_eq!(
            rig.pad.calls(),
            vec![PadCall::Trigger(Trigger::Right, 1.0), PadCall::Commit]
        );

        rig.feed(&[InputEvent::MouseUp(PointerButton::Secondary)]);
        assert_eq!(rig.state.triggers.right, 0.0);
        assert_eq!(rig.pad.count(|c| matches!(c, PadCall::Press(_))), 0);
    }

    #[test]
    fn movement_keys_mirror_key_state() {
        let mut rig = Rig::new(false);
        rig.feed(&[InputEvent::KeyDown(Key::W), InputEvent::KeyDown(Key::A)]);
        assert!(rig.state.directions.up && rig.state.directions.left);

        rig.feed(&[InputEvent::KeyUp(Key::W)]);
        assert!(!rig.state.directions.up);
        assert!(rig.pad.calls().is_empty());
    }

    #[test]
    fn motion_is_dropped_while_uncaptured() {
        let mut rig = Rig::new(false);
        rig.feed(&[InputEvent::MouseMotion { dx: 30.0, dy: 0.0 }]);
        assert_eq!(rig.state.right_stick, AxisVector::NEUTRAL);

        rig.feed(&[
            InputEvent::ToggleCapture,
            InputEvent::MouseMotion { dx: 20.0, dy: -10.0 },
        ]);
        assert!((rig.state.right_stick.x - 0.3).abs() < 1e-6);
        assert!((rig.state.right_stick.y + 0.15).abs() < 1e-6);

        rig.feed(&[
            InputEvent::ToggleCapture,
            InputEvent::MouseMotion { dx: 50.0, dy: 50.0 },
        ]);
        assert!((rig.state.right_stick.x - 0.3).abs() < 1e-6);
        assert_eq!(rig.grab.0, vec![true, false]);
    }

    #[test]
    fn quit_sets_stopping() {
        let mut rig = Rig::new(false);
        rig.feed(&[InputEvent::Quit]);
        assert!(rig.state.stopping);
        assert!(rig.pad.calls().is_empty());
    }

    #[test]
    fn unmapped_input_is_ignored() {
        let mut rig = Rig::new(true);
        rig.feed(&[
            InputEvent::KeyDown(Key::P),
            InputEvent::KeyUp(Key::P),
            InputEvent::MouseDown(PointerButton::Extra2),
        ]);
        assert!(rig.pad.calls().is_empty());
        assert_eq!(rig.state.buttons.held().count(), 0);
        assert_eq!(rig.state.directions.to_axis(), AxisVector::NEUTRAL);
    }

    #[test]
    fn key_can_drive_movement_and_a_button() {
        let mut cfg = MapperConfig::default();
        cfg.bindings.bind(InputSource::Key(Key::W), Button::LeftThumbClick);
        let sampler = Sampler::new(cfg.bindings.clone(), cfg.motion_gain());
        let mut state = ControllerState::default();
        let mut pad = RecordingPad::default();

        sampler
            .apply(&mut state, &mut pad, &mut GrabLog::default(), InputEvent::KeyDown(Key::W))
            .unwrap();
        assert_eq!(state.directions.to_axis().y, 1.0);
        assert!(state.buttons.is_pressed(Button::LeftThumbClick));
    }

    #[test]
    fn commit_failure_is_reported() {
        let mut rig = Rig::new(false);
        rig.pad.fail_commits(true);
        let err = rig
            .sampler
            .apply(
                &mut rig.state,
                &mut rig.pad,
                &mut rig.grab,
                InputEvent::KeyDown(Key::R),
            )
            .unwrap_err();
        assert!(matches!(err, PadError::Submit(_)));
    }

    #[test]
    fn egui_events_are_translated() {
        let bindings = Bindings::default();
        let key = |pressed, repeat| egui::Event::Key {
            key: Key::W,
            physical_key: None,
            pressed,
            repeat,
            modifiers: egui::Modifiers::NONE,
        };
        assert_eq!(
            InputEvent::from_egui(&key(true, false), &bindings),
            Some(InputEvent::KeyDown(Key::W))
        );
        assert_eq!(
            InputEvent::from_egui(&key(false, false), &bindings),
            Some(InputEvent::KeyUp(Key::W))
        );
        assert_eq!(InputEvent::from_egui(&key(true, true), &bindings), None);
        assert_eq!(
            InputEvent::from_egui(&egui::Event::MouseMoved(egui::vec2(3.0, -2.0)), &bindings),
            Some(InputEvent::MouseMotion { dx: 3.0, dy: -2.0 })
        );
        assert_eq!(
            InputEvent::from_egui(
                &egui::Event::PointerButton {
                    pos: egui::pos2(0.0, 0.0),
                    button: PointerButton::Middle,
                    pressed: true,
                    modifiers: egui::Modifiers::NONE,
                },
                &bindings
            ),
            Some(InputEvent::MouseDown(PointerButton::Middle))
        );
        assert_eq!(InputEvent::from_egui(&egui::Event::Copy, &bindings), None);
    }

    #[test]
    fn reserved_keys_become_commands() {
        let bindings = Bindings::default();
        let key = |key, pressed| egui::Event::Key {
            key,
            physical_key: None,
            pressed,
            repeat: false,
            modifiers: egui::Modifiers::NONE,
        };
        assert_eq!(
            InputEvent::from_egui(&key(Key::Escape, true), &bindings),
            Some(InputEvent::Quit)
        );
        assert_eq!(
            InputEvent::from_egui(&key(Key::Tab, true), &bindings),
            Some(InputEvent::ToggleCapture)
        );
        assert_eq!(
            InputEvent::from_egui(&key(Key::Tab, false), &bindings),
            Some(InputEvent::KeyUp(Key::Tab))
        );
    }
}
