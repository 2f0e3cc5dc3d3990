//! Notification-area icon and menu
//!
//! The tray runs its own blocking message loop on a dedicated thread. It never
//! touches the overlay; every menu pick is sent to the GUI thread as a
//! [`TrayCommand`] over an unbounded FIFO channel.

#[cfg(target_os = "windows")]
mod windows;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use heartbeat_core::Localizer;
use tokio::sync::mpsc::UnboundedSender;

/// Commands sent from the tray thread to the GUI thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayCommand {
    Show,
    Hide,
    ToggleMoveMode,
    /// Open the configuration file in the system editor
    Settings,
    About,
    /// Tray icon is already gone when this arrives
    Exit,
}

impl TrayCommand {
    /// Menu order
    pub const MENU: [TrayCommand; 6] = [
        TrayCommand::Show,
        TrayCommand::Hide,
        TrayCommand::ToggleMoveMode,
        TrayCommand::Settings,
        TrayCommand::About,
        TrayCommand::Exit,
    ];

    const FIRST_ID: u16 = 1001;

    /// Native menu item id
    pub fn id(self) -> u16 {
        Self::FIRST_ID + self as u16
    }

    pub fn from_id(id: u16) -> Option<Self> {
        let index = id.checked_sub(Self::FIRST_ID)? as usize;
        Self::MENU.get(index).copied()
    }

    /// Whether a separator follows this item in the menu
    pub fn ends_group(self) -> bool {
        matches!(self, TrayCommand::Hide | TrayCommand::Settings)
    }
}

/// Localized tray strings, resolved once at startup
#[derive(Debug, Clone)]
pub struct TrayLabels {
    pub tooltip: String,
    show: String,
    hide: String,
    move_enable: String,
    move_disable: String,
    settings: String,
    about: String,
    exit: String,
}

impl TrayLabels {
    pub fn new(localizer: &Localizer) -> Self {
        let t = |key: &str| localizer.t(key).to_string();
        Self {
            tooltip: t("tray.tooltip"),
            show: t("tray.show"),
            hide: t("tray.hide"),
            move_enable: t("tray.move_enable"),
            move_disable: t("tray.move_disable"),
            settings: t("tray.settings"),
            about: t("tray.about"),
            exit: t("tray.exit"),
        }
    }

    /// Menu text for `command`; the move item names the action it will take.
    pub fn label(&self, command: TrayCommand, move_mode: bool) -> &str {
        match command {
            TrayCommand::Show => &self.show,
            TrayCommand::Hide => &self.hide,
            TrayCommand::ToggleMoveMode if move_mode => &self.move_disable,
            TrayCommand::ToggleMoveMode => &self.move_enable,
            TrayCommand::Settings => &self.settings,
            TrayCommand::About => &self.about,
            TrayCommand::Exit => &self.exit,
        }
    }
}

/// Owner side of the tray thread
pub struct TrayHandle {
    /// Mirror of the overlay's move mode, read when the menu opens
    move_mode: Arc<AtomicBool>,
    #[cfg(target_os = "windows")]
    thread: Option<windows::TrayThread>,
}

impl TrayHandle {
    /// Handle with no tray thread behind it
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            move_mode: Arc::new(AtomicBool::new(false)),
            #[cfg(target_os = "windows")]
            thread: None,
        }
    }

    pub fn move_mode(&self) -> bool {
        self.move_mode.load(Ordering::Relaxed)
    }

    pub fn set_move_mode(&self, enabled: bool) {
        self.move_mode.store(enabled, Ordering::Relaxed);
    }

    /// Remove the icon and wait for the tray thread to finish.
    pub fn shutdown(self) {
        #[cfg(target_os = "windows")]
        {
            if let Some(thread) = self.thread {
                thread.shutdown();
            }
        }
    }
}

/// Start the tray on its own thread. Menu picks are sent on `sender`.
///
/// A tray that fails to start is logged and the overlay runs without one.
pub fn spawn_tray(sender: UnboundedSender<TrayCommand>, labels: TrayLabels) -> TrayHandle {
    let move_mode = Arc::new(AtomicBool::new(false));

    #[cfg(target_os = "windows")]
    {
        let thread = match windows::TrayThread::spawn(sender, labels, Arc::clone(&move_mode)) {
            Ok(thread) => Some(thread),
            Err(e) => {
                tracing::warn!(error = %e, "failed to start tray icon");
                None
            }
        };
        TrayHandle { move_mode, thread }
    }

    #[cfg(not(target_os = "windows"))]
    {
        drop(sender);
        tracing::info!(tooltip = %labels.tooltip, "tray icon is not available on this platform");
        TrayHandle { move_mode }
    }
}
