//! Driftscreen - Idle Screensaver Overlay
//!
//! A fullscreen screensaver daemon for kiosk-style deployments. After a
//! period of user inactivity it covers the screen with a collage of
//! drifting images over a blurred backdrop, and dismisses itself on the
//! next user interaction. The image list is fetched once over HTTP at
//! startup.

mod config;
mod gallery;
mod idle;
mod layout;
mod logging;
mod overlay;

use anyhow::Result;
use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::idle::IdleScheduler;
use crate::overlay::OverlayApp;

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    // Parse command line arguments
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    // Load configuration
    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    // Initialize tracing
    init_tracing(&config.logging.level)?;

    info!("Starting driftscreen v{}", VERSION);
    info!(
        "Configuration loaded: idle timeout={}s, resize debounce={}ms, endpoint={}",
        config.overlay.timeout_seconds,
        config.overlay.resize_debounce_ms,
        config.gallery.endpoint_url
    );

    // Ensure the data directory exists before the session log opens
    std::fs::create_dir_all(config.logging.logs_dir())?;

    // Runtime for the idle checker and image fetches; the UI event loop
    // owns the main thread.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let scheduler = Arc::new(IdleScheduler::new(
        config.overlay.timeout(),
        config.overlay.check_interval(),
        config.overlay.enabled,
    ));

    // Borderless always-on-top surface, invisible until the timeout fires.
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("driftscreen")
            .with_fullscreen(true)
            .with_decorations(false)
            .with_visible(false)
            .with_window_level(egui::WindowLevel::AlwaysOnTop),
        ..Default::default()
    };

    let handle = runtime.handle().clone();
    let app_scheduler = scheduler.clone();
    eframe::run_native(
        "driftscreen",
        native_options,
        Box::new(move |cc| {
            let app = OverlayApp::new(cc, config, app_scheduler, handle)?;
            Ok(Box::new(app))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Event loop error: {e}"))?;

    scheduler.stop();
    info!("Driftscreen shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with the given log level.
fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}
