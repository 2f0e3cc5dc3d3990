//! GUI-thread run loop
//!
//! One thread owns the overlay and the config store. Each pass pumps window
//! messages, drains tray commands, polls the config file and runs whatever
//! the controller has due, then sleeps until its next deadline.

use std::ops::ControlFlow;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use heartbeat_core::{ConfigStore, Localizer};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

use crate::about;
use crate::controller::{InteractionMode, OverlayController};
use crate::platform::OverlayPlatform;
use crate::platform::autostart::{AutoStart, AutoStartState, SystemAutoStart};
use crate::tray::{TrayCommand, TrayHandle};

/// Title of the overlay window, also used to re-resolve its handle
pub const WINDOW_TITLE: &str = "Heartbeat Overlay";

/// Longest sleep between passes, keeping pointer and tray input responsive
const MAX_IDLE: Duration = Duration::from_millis(16);

/// How often the config file is checked for external edits
const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct App<P: OverlayPlatform, A: AutoStart = SystemAutoStart> {
    controller: OverlayController<P>,
    store: ConfigStore,
    localizer: Localizer,
    commands: UnboundedReceiver<TrayCommand>,
    tray: TrayHandle,
    last_config_poll: Instant,
    autostart: A,
    /// `auto_start` value last pushed to the OS, `None` before startup sync
    synced_auto_start: Option<bool>,
}

impl<P: OverlayPlatform> App<P> {
    pub fn new(
        platform: P,
        store: ConfigStore,
        localizer: Localizer,
        commands: UnboundedReceiver<TrayCommand>,
        tray: TrayHandle,
    ) -> Self {
        Self::with_auto_start(platform, store, localizer, commands, tray, SystemAutoStart)
    }
}

impl<P: OverlayPlatform, A: AutoStart> App<P, A> {
    pub fn with_auto_start(
        platform: P,
        store: ConfigStore,
        localizer: Localizer,
        commands: UnboundedReceiver<TrayCommand>,
        tray: TrayHandle,
        autostart: A,
    ) -> Self {
        let now = Instant::now();
        let controller = OverlayController::new(platform, store.config(), WINDOW_TITLE, now);
        let mut app = Self {
            controller,
            store,
            localizer,
            commands,
            tray,
            last_config_poll: now,
            autostart,
            synced_auto_start: None,
        };
        app.sync_auto_start();
        app
    }

    /// Run until the tray asks to exit or the overlay window goes away.
    pub fn run(mut self) {
        loop {
            if !self.controller.pump(&mut self.store) {
                tracing::info!("overlay window closed");
                break;
            }

            if self.drain_commands().is_break() {
                break;
            }

            let now = Instant::now();
            if now.duration_since(self.last_config_poll) >= CONFIG_POLL_INTERVAL {
                self.last_config_poll = now;
                if self.store.reload_if_modified() {
                    self.sync_auto_start();
                }
            }

            self.controller.run_due(&self.store, now);

            let idle = self
                .controller
                .next_deadline()
                .saturating_duration_since(Instant::now())
                .min(MAX_IDLE);
            if !idle.is_zero() {
                thread::sleep(idle);
            }
        }

        self.tray.shutdown();
        tracing::info!("heartbeat stopped");
    }

    fn drain_commands(&mut self) -> ControlFlow<()> {
        loop {
            match self.commands.try_recv() {
                Ok(command) => self.dispatch(command)?,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                    return ControlFlow::Continue(());
                }
            }
        }
    }

    fn dispatch(&mut self, command: TrayCommand) -> ControlFlow<()> {
        tracing::debug!(?command, "dispatching tray command");
        match command {
            TrayCommand::Show => self.controller.show(Instant::now()),
            TrayCommand::Hide => self.controller.hide(),
            TrayCommand::ToggleMoveMode => {
                let mode = self.controller.toggle_move_mode(&mut self.store);
                self.tray.set_move_mode(mode == InteractionMode::Movable);
            }
            TrayCommand::Settings => open_settings(&mut self.store),
            TrayCommand::About => about::show(&self.localizer),
            TrayCommand::Exit => {
                tracing::info!("exit requested from tray");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Bring the OS startup registration in line with `auto_start`.
    ///
    /// At startup only a known, differing state is corrected, so a packaged
    /// install does not open the system settings page on every launch.
    fn sync_auto_start(&mut self) {
        let desired = self.store.config().auto_start;
        let previous = self.synced_auto_start.replace(desired);
        if previous == Some(desired) {
            return;
        }

        match self.autostart.state() {
            state if state.as_bool() == Some(desired) => {}
            AutoStartState::Unknown if previous.is_none() => {
                tracing::debug!("auto-start state is managed by the system");
            }
            _ => {
                if let Err(e) = self.autostart.set_enabled(desired) {
                    tracing::warn!(error = %e, desired, "failed to update auto-start");
                }
            }
        }
    }
}

/// Open the config file in the system editor, writing it first if needed.
fn open_settings(store: &mut ConfigStore) {
    if !store.path().exists() {
        store.save();
    }
    let path: &Path = store.path();
    match open::that(path) {
        Ok(()) => tracing::info!(path = ?path, "opened config file"),
        Err(e) => tracing::warn!(error = %e, path = ?path, "failed to open config file"),
    }
}
