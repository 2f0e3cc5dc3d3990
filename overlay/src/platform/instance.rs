//! Single-instance guard backed by a named mutex
//!
//! Only meaningful on Windows; elsewhere acquisition always succeeds.

#[cfg(target_os = "windows")]
use windows::Win32::Foundation::{CloseHandle, HANDLE};

/// Held for the life of the process; releasing it lets another instance start
pub struct InstanceGuard {
    #[cfg(target_os = "windows")]
    handle: Option<HANDLE>,
}

/// Take the named lock. Returns `None` when another process already holds it.
#[cfg(target_os = "windows")]
pub fn acquire_single_instance(name: &str) -> Option<InstanceGuard> {
    use windows::Win32::System::Threading::CreateMutexW;
    use windows::core::PCWSTR;

    const ERROR_ALREADY_EXISTS: i32 = 183;

    let wide = super::windows::wide_string(name);
    let created = unsafe { CreateMutexW(None, true, PCWSTR(wide.as_ptr())) };
    let already_exists =
        std::io::Error::last_os_error().raw_os_error() == Some(ERROR_ALREADY_EXISTS);

    match created {
        Ok(handle) if already_exists => {
            unsafe {
                let _ = CloseHandle(handle);
            }
            None
        }
        Ok(handle) => Some(InstanceGuard {
            handle: Some(handle),
        }),
        Err(e) => {
            tracing::warn!(error = %e, name, "could not create instance mutex, continuing unguarded");
            Some(InstanceGuard { handle: None })
        }
    }
}

#[cfg(not(target_os = "windows"))]
pub fn acquire_single_instance(name: &str) -> Option<InstanceGuard> {
    tracing::debug!(name, "single-instance guard is a no-op on this platform");
    Some(InstanceGuard {})
}

#[cfg(target_os = "windows")]
impl Drop for InstanceGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            unsafe {
                let _ = CloseHandle(handle);
            }
        }
    }
}
