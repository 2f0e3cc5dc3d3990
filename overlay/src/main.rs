//! Heartbeat entry point
//!
//! Startup order matters: DPI awareness before any window exists, logging
//! before anything that logs, and the single-instance check before the tray
//! or the overlay appear.

use heartbeat_core::{ConfigStore, Localizer, app_dir, logging};
use heartbeat_overlay::platform::{self, NativeOverlay, WindowConfig};
use heartbeat_overlay::{App, TrayLabels, WINDOW_TITLE, spawn_tray};
use tokio::sync::mpsc;

const INSTANCE_MUTEX_NAME: &str = "Local\\HeartbeatOverlayInstance";

fn main() {
    platform::set_dpi_awareness();

    // Held until exit so buffered log lines are flushed
    let _log_guard = logging::init(&app_dir().join("logs"));
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "heartbeat starting");

    let Some(_instance) = platform::acquire_single_instance(INSTANCE_MUTEX_NAME) else {
        tracing::info!("another instance is already running, exiting");
        return;
    };

    let store = ConfigStore::open_default();
    let localizer = Localizer::from_setting(&store.config().language);
    tracing::info!(language = ?localizer.language(), path = ?store.path(), "config ready");

    let config = store.config();
    let window = WindowConfig {
        title: WINDOW_TITLE.to_string(),
        x: 0,
        y: 0,
        size: config.effective_dot_size(),
        topmost: config.always_on_top,
        click_through: true,
    };
    let overlay = match NativeOverlay::new(window) {
        Ok(overlay) => overlay,
        Err(e) => {
            tracing::error!(error = %e, "failed to create overlay window");
            std::process::exit(1);
        }
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let tray = spawn_tray(tx, TrayLabels::new(&localizer));

    App::new(overlay, store, localizer, rx, tray).run();
}
