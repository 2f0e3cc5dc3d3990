//! Start-with-Windows registration
//!
//! Classic installs use a value under the per-user `Run` key. Packaged (MSIX)
//! installs cannot touch that key; their startup state lives in the system
//! Settings app, which we open instead and report as [`AutoStartState::Unknown`].

use super::PlatformError;

/// Settings page listing startup apps
#[cfg(target_os = "windows")]
const STARTUP_SETTINGS_URI: &str = "ms-settings:startupapps";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoStartState {
    Enabled,
    Disabled,
    /// Managed by the OS settings surface and not queryable
    Unknown,
}

impl AutoStartState {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            AutoStartState::Enabled => Some(true),
            AutoStartState::Disabled => Some(false),
            AutoStartState::Unknown => None,
        }
    }
}

/// Where the startup registration lives
pub trait AutoStart {
    fn state(&self) -> AutoStartState;

    fn set_enabled(&mut self, enabled: bool) -> Result<(), PlatformError>;
}

/// The current user's OS startup registration
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAutoStart;

impl AutoStart for SystemAutoStart {
    fn state(&self) -> AutoStartState {
        state()
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), PlatformError> {
        set_enabled(enabled)
    }
}

/// Current registration state.
pub fn state() -> AutoStartState {
    imp::state()
}

/// Register or unregister the executable for startup.
pub fn set_enabled(enabled: bool) -> Result<(), PlatformError> {
    imp::set_enabled(enabled)
}

#[cfg(target_os = "windows")]
fn open_startup_settings() -> Result<(), PlatformError> {
    open::that(STARTUP_SETTINGS_URI)
        .map(|_| tracing::info!("opened startup apps settings"))
        .map_err(|e| PlatformError::Other(format!("failed to open startup settings: {}", e)))
}

#[cfg(target_os = "windows")]
mod imp {
    use windows::Win32::Foundation::{
        APPMODEL_ERROR_NO_PACKAGE, ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, WIN32_ERROR,
    };
    use windows::Win32::Storage::Packaging::Appx::GetCurrentPackageFullName;
    use windows::Win32::System::Registry::{
        HKEY, HKEY_CURRENT_USER, KEY_QUERY_VALUE, KEY_SET_VALUE, REG_SAM_FLAGS, REG_SZ,
        RegCloseKey, RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
    };
    use windows::core::{PWSTR, w};

    use super::{AutoStartState, PlatformError, open_startup_settings};

    const RUN_KEY: windows::core::PCWSTR = w!("Software\\Microsoft\\Windows\\CurrentVersion\\Run");
    const VALUE_NAME: windows::core::PCWSTR = w!("Heartbeat");

    /// Open handle to the per-user `Run` key, closed on drop
    struct RunKey(HKEY);

    impl RunKey {
        fn open(access: REG_SAM_FLAGS) -> Result<Self, WIN32_ERROR> {
            let mut key = HKEY::default();
            let status = unsafe { RegOpenKeyExW(HKEY_CURRENT_USER, RUN_KEY, 0, access, &mut key) };
            if status == ERROR_SUCCESS {
                Ok(Self(key))
            } else {
                Err(status)
            }
        }
    }

    impl Drop for RunKey {
        fn drop(&mut self) {
            unsafe {
                let _ = RegCloseKey(self.0);
            }
        }
    }

    fn is_packaged() -> bool {
        let mut length = 0u32;
        let status = unsafe { GetCurrentPackageFullName(&mut length, PWSTR::null()) };
        status != APPMODEL_ERROR_NO_PACKAGE
    }

    fn registry_error(action: &str, status: WIN32_ERROR) -> PlatformError {
        PlatformError::Other(format!("{} auto-start registry value failed: {:?}", action, status))
    }

    pub(super) fn state() -> AutoStartState {
        if is_packaged() {
            return AutoStartState::Unknown;
        }

        let key = match RunKey::open(KEY_QUERY_VALUE) {
            Ok(key) => key,
            Err(status) => {
                tracing::warn!(?status, "could not open Run key");
                return AutoStartState::Disabled;
            }
        };

        let status = unsafe { RegQueryValueExW(key.0, VALUE_NAME, None, None, None, None) };
        match status {
            ERROR_SUCCESS => AutoStartState::Enabled,
            ERROR_FILE_NOT_FOUND => AutoStartState::Disabled,
            other => {
                tracing::warn!(status = ?other, "could not query auto-start value");
                AutoStartState::Disabled
            }
        }
    }

    pub(super) fn set_enabled(enabled: bool) -> Result<(), PlatformError> {
        if is_packaged() {
            return open_startup_settings();
        }

        let key = RunKey::open(KEY_SET_VALUE).map_err(|s| registry_error("open", s))?;

        if enabled {
            let exe = std::env::current_exe()
                .map_err(|e| PlatformError::Other(format!("cannot locate executable: {}", e)))?;
            let command = format!("\"{}\"", exe.display());
            let data: Vec<u8> = command
                .encode_utf16()
                .chain(std::iter::once(0))
                .flat_map(u16::to_le_bytes)
                .collect();

            let status = unsafe { RegSetValueExW(key.0, VALUE_NAME, 0, REG_SZ, Some(&data)) };
            if status != ERROR_SUCCESS {
                return Err(registry_error("set", status));
            }
            tracing::info!(%command, "auto-start enabled");
        } else {
            let status = unsafe { RegDeleteValueW(key.0, VALUE_NAME) };
            if status != ERROR_SUCCESS && status != ERROR_FILE_NOT_FOUND {
                return Err(registry_error("delete", status));
            }
            tracing::info!("auto-start disabled");
        }
        Ok(())
    }
}

#[cfg(not(target_os = "windows"))]
mod imp {
    use super::{AutoStartState, PlatformError};

    pub(super) fn state() -> AutoStartState {
        AutoStartState::Unknown
    }

    pub(super) fn set_enabled(enabled: bool) -> Result<(), PlatformError> {
        tracing::debug!(enabled, "auto-start registration is not supported on this platform");
        Err(PlatformError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_state_has_no_boolean() {
        assert_eq!(AutoStartState::Enabled.as_bool(), Some(true));
        assert_eq!(AutoStartState::Disabled.as_bool(), Some(false));
        assert_eq!(AutoStartState::Unknown.as_bool(), None);
    }
}
