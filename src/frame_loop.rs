use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    config::MapperConfig,
    input::{InputEvent, PointerGrab, Sampler},
    pad_state::{ControllerState, Trigger},
    virtual_pad::{PadError, VirtualPad},
};

/// State and device live under one lock so a button commit can never land
/// in the middle of a frame commit.
struct Shared {
    state: ControllerState,
    pad: Box<dyn VirtualPad>,
}

/// Owns the controller state and the virtual pad and runs one frame at a time.
pub struct FrameDriver {
    shared: Mutex<Shared>,
    sampler: Sampler,
    decay: f32,
    deadzone: f32,
    finalized: AtomicBool,
    failure: Mutex<Option<PadError>>,
}

impl FrameDriver {
    pub fn new(cfg: &MapperConfig, pad: Box<dyn VirtualPad>) -> Self {
        Self {
            shared: Mutex::new(Shared {
                state: ControllerState::new(cfg.start_captured),
                pad,
            }),
            sampler: Sampler::new(cfg.bindings.clone(), cfg.motion_gain()),
            decay: cfg.decay,
            deadzone: cfg.deadzone,
            finalized: AtomicBool::new(false),
            failure: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> ControllerState {
        self.shared.lock().state.clone()
    }

    pub fn is_stopping(&self) -> bool {
        self.shared.lock().state.stopping
    }

    pub fn request_stop(&self) {
        self.shared.lock().state.stopping = true;
    }

    /// Drains `events` through the sampler, then recomputes and commits the
    /// sticks. Events after a quit are dropped but the frame still commits.
    /// A device error stops the loop and is kept for `take_failure`.
    pub fn run_frame<I>(&self, events: I, grab: &mut dyn PointerGrab) -> Result<(), PadError>
    where
        I: IntoIterator<Item = InputEvent>,
    {
        let result = self.sample(events, grab).and_then(|()| self.aggregate());
        if let Err(e) = &result {
            error!("virtual controller failure: {e}");
            self.request_stop();
            *self.failure.lock() = Some(e.clone());
        }
        result
    }

    fn sample<I>(&self, events: I, grab: &mut dyn PointerGrab) -> Result<(), PadError>
    where
        I: IntoIterator<Item = InputEvent>,
    {
        for event in events {
            let mut guard = self.shared.lock();
            let Shared { state, pad } = &mut *guard;
            self.sampler.apply(state, pad.as_mut(), grab, event)?;
            if state.stopping {
                debug!("stopping, rest of the frame's input dropped");
                break;
            }
        }
        Ok(())
    }

    /// Recomputes both sticks and commits sticks and triggers in one batch.
    pub fn aggregate(&self) -> Result<(), PadError> {
        let mut guard = self.shared.lock();
        let Shared { state, pad } = &mut *guard;

        state.recompute_left_stick();
        state.decay_right_stick(self.decay);
        let (left, right) = state.output_sticks(self.deadzone);

        pad.set_left_stick(left.x, left.y);
        pad.set_right_stick(right.x, right.y);
        pad.set_trigger(Trigger::Left, state.triggers.left);
        pad.set_trigger(Trigger::Right, state.triggers.right);
        pad.commit()
    }

    /// Puts the pad back to neutral and commits it. Only the first call does
    /// anything.
    pub fn shutdown(&self) -> Result<(), PadError> {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut guard = self.shared.lock();
        let Shared { state, pad } = &mut *guard;
        state.reset();
        state.stopping = true;
        pad.reset_all();
        pad.commit()
    }

    pub fn take_failure(&self) -> Option<PadError> {
        self.failure.lock().take()
    }
}

/// Runs [`FrameDriver::shutdown`] when dropped, whichever way the scope is left.
pub struct ShutdownGuard {
    driver: Arc<FrameDriver>,
}

impl ShutdownGuard {
    pub fn new(driver: Arc<FrameDriver>) -> Self {
        Self { driver }
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        match self.driver.shutdown() {
            Ok(()) => info!("virtual controller reset to neutral"),
            Err(e) => warn!("could not reset virtual controller: {e}"),
        }
    }
}

/// Fixed-rate frame clock.
#[derive(Debug)]
pub struct FramePacer {
    interval: Duration,
    next: Instant,
}

impl FramePacer {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next: now,
        }
    }

    /// True if a frame is due at `now`. Missed frames are not replayed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next += self.interval;
        if self.next <= now {
            debug!("frame loop fell behind, resyncing");
            self.next = now + self.interval;
        }
        true
    }

    pub fn until_next(&self, now: Instant) -> Duration {
        self.next.saturating_duration_since(now)
    }
}

/// Installs the Ctrl-C handler. The returned flag is raised on interrupt and
/// `wake` is called so an idle frame loop notices it.
pub fn interrupt_flag<F>(wake: F) -> anyhow::Result<Arc<AtomicBool>>
where
    F: Fn() + Send + 'static,
{
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            warn!("Ctrl+C pressed again, already stopping");
        } else {
            info!("Ctrl+C pressed, stopping");
        }
        wake();
    })?;
    Ok(flag)
}

#[cfg(test)]
mod tests {
    use eframe::egui::{Key, PointerButton};

    use super::*;
    use crate::{
        input::testing::GrabLog,
        pad_state::{AxisVector, Button},
        virtual_pad::testing::{PadCall, RecordingPad},
    };

    fn driver(cfg: &MapperConfig) -> (Arc<FrameDriver>, RecordingPad) {
        let pad = RecordingPad::default();
        let driver = Arc::new(FrameDriver::new(cfg, Box::new(pad.clone())));
        (driver, pad)
    }

    fn frame(driver: &FrameDriver, events: &[InputEvent]) {
        driver
            .run_frame(events.iter().copied(), &mut GrabLog::default())
            .unwrap();
    }

    fn last_sticks(pad: &RecordingPad) -> (PadCall, PadCall) {
        let calls = pad.calls();
        let left = calls
            .iter()
            .rev()
            .find(|c| matches!(c, PadCall::LeftStick(..)))
            .copied()
            .unwrap();
        let right = calls
            .iter()
            .rev()
            .find(|c| matches!(c, PadCall::RightStick(..)))
            .copied()
            .unwrap();
        (left, right)
    }

    #[test]
    fn frame_commits_sticks_and_triggers_once() {
        let (driver, pad) = driver(&MapperConfig::default());
        frame(&driver, &[InputEvent::KeyDown(Key::W), InputEvent::KeyDown(Key::D)]);

        assert_eq!(
            pad.calls(),
            vec![
                PadCall::LeftStick(1.0, -1.0),
                PadCall::RightStick(0.0, 0.0),
                PadCall::Trigger(Trigger::Left, 0.0),
                PadCall::Trigger(Trigger::Right, 0.0),
                PadCall::Commit,
            ]
        );
    }

    #[test]
    fn opposite_keys_commit_zero() {
        let (driver, pad) = driver(&MapperConfig::default());
        frame(&driver, &[InputEvent::KeyDown(Key::A), InputEvent::KeyDown(Key::D)]);
        assert_eq!(last_sticks(&pad).0, PadCall::LeftStick(0.0, 0.0));
    }

    #[test]
    fn button_commits_precede_the_frame_commit() {
        let (driver, pad) = driver(&MapperConfig::default());
        frame(&driver, &[InputEvent::KeyDown(Key::Space)]);
        let calls = pad.calls();
        assert_eq!(calls[0], PadCall::Press(Button::Y));
        assert_eq!(calls[1], PadCall::Commit);
        assert_eq!(calls.last(), Some(&PadCall::Commit));
        assert_eq!(pad.count(|c| *c == PadCall::Commit), 2);
    }

    #[test]
    fn mouse_stick_decays_and_snaps_to_zero() {
        let mut cfg = MapperConfig::default();
        cfg.start_captured = true;
        let (driver, pad) = driver(&cfg);

        frame(&driver, &[InputEvent::MouseMotion { dx: 40.0, dy: 20.0 }]);
        let PadCall::RightStick(x, y) = last_sticks(&pad).1 else {
            unreachable!()
        };
        assert!((x - 0.57).abs() < 1e-5, "x = {x}");
        assert!((y + 0.285).abs() < 1e-5, "y = {y}");

        let mut last = driver.snapshot().right_stick.magnitude();
        let mut committed_zero = false;
        for _ in 0..200 {
            frame(&driver, &[]);
            let right = driver.snapshot().right_stick;
            assert!(right.magnitude() < last || right == AxisVector::NEUTRAL);
            last = right.magnitude();

            let PadCall::RightStick(x, y) = last_sticks(&pad).1 else {
                unreachable!()
            };
            if right.x.abs() < cfg.deadzone {
                assert_eq!(x, 0.0);
            }
            if right.y.abs() < cfg.deadzone {
                assert_eq!(y, 0.0);
            }
            committed_zero |= x == 0.0 && y == 0.0;
        }
        assert!(committed_zero);
        assert_eq!(driver.snapshot().right_stick, AxisVector::NEUTRAL);
    }

    #[test]
    fn uncaptured_motion_leaves_the_stick_alone() {
        let (driver, _pad) = driver(&MapperConfig::default());
        frame(&driver, &[InputEvent::MouseMotion { dx: 40.0, dy: 20.0 }]);
        assert_eq!(driver.snapshot().right_stick, AxisVector::NEUTRAL);

        frame(
            &driver,
            &[
                InputEvent::ToggleCapture,
                InputEvent::MouseMotion { dx: 40.0, dy: 0.0 },
            ],
        );
        assert!(driver.snapshot().right_stick.x > 0.5);
    }

    #[test]
    fn shutdown_ends_with_a_neutral_commit() {
        let mut cfg = MapperConfig::default();
        cfg.start_captured = true;
        let (driver, pad) = driver(&cfg);
        frame(
            &driver,
            &[
                InputEvent::KeyDown(Key::W),
                InputEvent::MouseDown(PointerButton::Primary),
                InputEvent::MouseDown(PointerButton::Secondary),
                InputEvent::MouseMotion { dx: 30.0, dy: 30.0 },
            ],
        );
        pad.clear();

        driver.shutdown().unwrap();
        assert_eq!(pad.calls(), vec![PadCall::Reset, PadCall::Commit]);

        let state = driver.snapshot();
        assert_eq!(state.buttons.held().count(), 0);
        assert_eq!(state.right_stick, AxisVector::NEUTRAL);
        assert_eq!(state.directions.to_axis(), AxisVector::NEUTRAL);
        assert!(state.stopping);

        driver.shutdown().unwrap();
        assert_eq!(pad.calls().len(), 2, "second shutdown must be a no-op");
    }

    #[test]
    fn guard_resets_on_every_exit_path() {
        let (driver, pad) = driver(&MapperConfig::default());
        let result: Result<(), &str> = (|| {
            let _guard = ShutdownGuard::new(driver.clone());
            frame(&driver, &[InputEvent::KeyDown(Key::G)]);
            Err("early exit")
        })();
        assert!(result.is_err());
        assert!(pad.calls().ends_with(&[PadCall::Reset, PadCall::Commit]));
    }

    #[test]
    fn quit_drops_the_rest_of_the_frame() {
        let (driver, pad) = driver(&MapperConfig::default());
        frame(
            &driver,
            &[
                InputEvent::KeyDown(Key::W),
                InputEvent::Quit,
                InputEvent::KeyDown(Key::G),
                InputEvent::KeyDown(Key::D),
            ],
        );
        assert!(driver.is_stopping());
        assert_eq!(pad.count(|c| *c == PadCall::Press(Button::A)), 0);
        assert_eq!(last_sticks(&pad).0, PadCall::LeftStick(0.0, -1.0));
        assert_eq!(pad.calls().last(), Some(&PadCall::Commit));
        assert!(!driver.snapshot().buttons.is_pressed(Button::A));
    }

    #[test]
    fn device_failure_stops_the_loop() {
        let (driver, pad) = driver(&MapperConfig::default());
        pad.fail_commits(true);
        let err = driver
            .run_frame(std::iter::empty(), &mut GrabLog::default())
            .unwrap_err();
        assert!(matches!(err, PadError::Submit(_)));
        assert!(driver.is_stopping());
        assert!(driver.take_failure().is_some());
        assert!(driver.take_failure().is_none());
    }

    #[test]
    fn device_failure_still_attempts_the_reset() {
        let (driver, pad) = driver(&MapperConfig::default());
        {
            let _guard = ShutdownGuard::new(driver.clone());
            frame(&driver, &[InputEvent::KeyDown(Key::G)]);
            pad.fail_commits(true);
            let err = driver
                .run_frame([InputEvent::KeyDown(Key::W)], &mut GrabLog::default())
                .unwrap_err();
            assert!(matches!(err, PadError::Submit(_)));
            assert!(driver.is_stopping());
            pad.clear();
        }

        assert_eq!(pad.calls(), vec![PadCall::Reset, PadCall::Commit]);
        assert!(matches!(driver.take_failure(), Some(PadError::Submit(_))));
    }

    #[test]
    fn pacer_limits_frame_rate() {
        let start = Instant::now();
        let step = Duration::from_millis(16);
        let mut pacer = FramePacer::new(step, start);

        assert!(pacer.tick(start));
        assert!(!pacer.tick(start + Duration::from_millis(5)));
        assert_eq!(
            pacer.until_next(start + Duration::from_millis(5)),
            Duration::from_millis(11)
        );
        assert!(pacer.tick(start + step));

        // a long stall yields one frame, not a burst
        let late = start + Duration::from_secs(1);
        assert!(pacer.tick(late));
        assert!(!pacer.tick(late + Duration::from_millis(1)));
    }
}
