use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use eframe::{
    App as EguiApp,
    egui::{self, CursorGrab, ViewportCommand},
};
use tracing::debug;

use crate::{
    config::{Bindings, MapperConfig},
    frame_loop::{FrameDriver, FramePacer},
    input::{InputEvent, PointerGrab},
    pad_state::ControllerState,
};

/// Pointer grab through viewport commands.
struct WindowGrab<'a> {
    ctx: &'a egui::Context,
}

impl PointerGrab for WindowGrab<'_> {
    fn set_captured(&mut self, captured: bool) {
        let grab = if captured {
            CursorGrab::Confined
        } else {
            CursorGrab::None
        };
        self.ctx.send_viewport_cmd(ViewportCommand::CursorGrab(grab));
        self.ctx
            .send_viewport_cmd(ViewportCommand::CursorVisible(!captured));
        if captured {
            let centre = self.ctx.screen_rect().center();
            self.ctx
                .send_viewport_cmd(ViewportCommand::CursorPosition(centre));
        }
        debug!(captured, "pointer grab updated");
    }
}

pub struct GuiApp {
    driver: Arc<FrameDriver>,
    interrupted: Arc<AtomicBool>,
    pacer: FramePacer,
    pending: Vec<InputEvent>,
    bindings: Bindings,
    legend: Vec<String>,
    deadzone: f32,
    grab_synced: bool,
    closing: bool,
}

impl GuiApp {
    pub fn new(driver: Arc<FrameDriver>, cfg: &MapperConfig, interrupted: Arc<AtomicBool>) -> Self {
        Self {
            driver,
            interrupted,
            pacer: FramePacer::new(cfg.frame_interval(), Instant::now()),
            pending: Vec::new(),
            bindings: cfg.bindings.clone(),
            legend: legend(cfg),
            deadzone: cfg.deadzone,
            grab_synced: false,
            closing: false,
        }
    }

    fn collect_events(&mut self, ctx: &egui::Context) -> bool {
        let (events, close) = ctx.input(|i| (i.events.clone(), i.viewport().close_requested()));
        let bindings = &self.bindings;
        self.pending
            .extend(events.iter().filter_map(|ev| InputEvent::from_egui(ev, bindings)));
        if close {
            self.pending.push(InputEvent::Quit);
        }
        close
    }

    fn status_panel(&self, ctx: &egui::Context, state: &ControllerState) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Keyboard & Mouse → Xbox 360");
            ui.separator();

            ui.label(format!(
                "Left Stick: ({:.2}, {:.2})",
                state.left_stick.x, state.left_stick.y
            ));
            ui.label(format!(
                "Right Stick: ({:.2}, {:.2})  (DZ {:.0} %)",
                state.right_stick.x,
                state.right_stick.y,
                self.deadzone * 100.0
            ));
            ui.label(format!(
                "Triggers: LT {:.0}  RT {:.0}",
                state.triggers.left, state.triggers.right
            ));
            let held: Vec<_> = state.buttons.held().map(|b| b.name()).collect();
            ui.label(if held.is_empty() {
                "Buttons: none".to_string()
            } else {
                format!("Buttons: {}", held.join(" "))
            });
            ui.label(if state.capture {
                "Mouse: captured"
            } else {
                "Mouse: free"
            });

            ui.separator();
            for line in &self.legend {
                ui.weak(line.as_str());
            }
        });
    }
}

impl EguiApp for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let close_requested = self.collect_events(ctx);

        if !self.grab_synced {
            self.grab_synced = true;
            let captured = self.driver.snapshot().capture;
            if captured {
                WindowGrab { ctx }.set_captured(true);
            }
        }

        if self.interrupted.load(Ordering::SeqCst) {
            self.driver.request_stop();
        }

        let now = Instant::now();
        if !self.closing && (self.pacer.tick(now) || close_requested) {
            let events = std::mem::take(&mut self.pending);
            // failures are recorded by the driver and end the loop below
            let _ = self.driver.run_frame(events, &mut WindowGrab { ctx });
        }

        if self.driver.is_stopping() && !self.closing {
            self.closing = true;
            ctx.send_viewport_cmd(ViewportCommand::Close);
        }

        self.status_panel(ctx, &self.driver.snapshot());
        ctx.request_repaint_after(self.pacer.until_next(Instant::now()));
    }
}

fn legend(cfg: &MapperConfig) -> Vec<String> {
    let b = &cfg.bindings;
    let mut lines = Vec::new();
    let movement: Vec<_> = b.movement.iter().map(|(k, _)| k.name()).collect();
    lines.push(format!("{}: Left stick", movement.join("")));
    lines.push("Mouse movement: Right stick (while captured)".to_string());
    for (source, button) in &b.buttons {
        lines.push(format!("{}: {}", source.label(), button.name()));
    }
    lines.push(format!("{}: Capture mouse on/off", b.toggle_capture.name()));
    lines.push(format!("{}: Exit", b.quit.name()));
    lines
}
