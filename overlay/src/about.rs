//! About box
//!
//! A plain informational message box on its own thread so the pulse keeps
//! running while it is open.

use heartbeat_core::Localizer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AboutText {
    pub title: String,
    pub body: String,
}

impl AboutText {
    pub fn new(localizer: &Localizer) -> Self {
        let body = format!(
            "{}\n{} {}\n\n{}",
            localizer.t("about.app_name"),
            localizer.t("about.version"),
            env!("CARGO_PKG_VERSION"),
            localizer.t("about.description"),
        );
        Self {
            title: localizer.t("about.title").to_string(),
            body,
        }
    }
}

/// Show the about box without blocking the caller.
pub fn show(localizer: &Localizer) {
    let text = AboutText::new(localizer);
    let spawned = std::thread::Builder::new()
        .name("about".into())
        .spawn(move || message_box(&text));
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "failed to open about box");
    }
}

#[cfg(target_os = "windows")]
fn message_box(text: &AboutText) {
    use windows::Win32::UI::WindowsAndMessaging::{
        MB_ICONINFORMATION, MB_OK, MB_SETFOREGROUND, MB_TOPMOST, MessageBoxW,
    };
    use windows::core::PCWSTR;

    use crate::platform::wide_string;

    let title = wide_string(&text.title);
    let body = wide_string(&text.body);
    unsafe {
        MessageBoxW(
            None,
            PCWSTR(body.as_ptr()),
            PCWSTR(title.as_ptr()),
            MB_OK | MB_ICONINFORMATION | MB_TOPMOST | MB_SETFOREGROUND,
        );
    }
}

#[cfg(not(target_os = "windows"))]
fn message_box(text: &AboutText) {
    tracing::info!(title = %text.title, body = %text.body, "about");
}
