mod config;
mod constants;
mod frame_loop;
mod gui_app;
mod input;
mod pad_state;
mod virtual_pad;

use std::{
    process::ExitCode,
    sync::{Arc, OnceLock},
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use config::{Cli, MapperConfig};
use constants::{WINDOW_SIZE, WINDOW_TITLE};
use eframe::{NativeOptions, egui};
use frame_loop::{FrameDriver, ShutdownGuard};
use gui_app::GuiApp;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging();

    match run(cli) {
        Ok(()) => {
            println!("Controller emulator stopped.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let cfg = cli.into_config().context("invalid settings")?;
    print_banner(&cfg);

    let pad = virtual_pad::open().context("failed to initialise the virtual Xbox 360 controller")?;
    let driver = Arc::new(FrameDriver::new(&cfg, pad));
    // From here on every exit path resets the pad.
    let _reset_on_exit = ShutdownGuard::new(driver.clone());

    let repaint: Arc<OnceLock<egui::Context>> = Arc::default();
    let interrupted = {
        let repaint = repaint.clone();
        frame_loop::interrupt_flag(move || {
            if let Some(ctx) = repaint.get() {
                ctx.request_repaint();
            }
        })
        .context("failed to install Ctrl+C handler")?
    };

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(WINDOW_SIZE)
            .with_resizable(false),
        ..Default::default()
    };

    let app = GuiApp::new(driver.clone(), &cfg, interrupted);
    info!("frame loop running at {} fps", cfg.fps);
    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(move |cc| {
            let _ = repaint.set(cc.egui_ctx.clone());
            Ok(Box::new(app) as Box<dyn eframe::App>)
        }),
    )
    .map_err(|e| anyhow!("window error: {e}"))?;

    if let Some(e) = driver.take_failure() {
        return Err(e).context("virtual controller failed mid-session");
    }
    Ok(())
}

fn print_banner(cfg: &MapperConfig) {
    let b = &cfg.bindings;
    let movement: Vec<_> = b.movement.iter().map(|(k, _)| k.name()).collect();

    println!("Xbox 360 Controller Emulator");
    println!("----------------------------------------");
    println!("Controls:");
    println!("- {}: Left stick", movement.join(""));
    println!("- Mouse movement: Right stick (while captured)");
    for (source, button) in &b.buttons {
        println!("- {}: {} button", source.label(), button.name());
    }
    println!("- {}: Capture mouse on/off", b.toggle_capture.name());
    println!("- {}: Exit", b.quit.name());
    println!("Sensitivity: {}", cfg.sensitivity);
    println!("Decay: {}", cfg.decay);
    println!("Deadzone: {}", cfg.deadzone);
    println!("Frame rate: {} fps", cfg.fps);
    println!("\nWindow must be focused for input capture!");
}
