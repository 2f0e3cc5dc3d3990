//! Windows platform implementation for the overlay window
//!
//! A borderless `WS_POPUP` tool window with `WS_EX_LAYERED`. Transparency uses
//! `SetLayeredWindowAttributes` with a color key (the background) and a
//! uniform alpha (the pulse). Click-through is `WS_EX_TRANSPARENT`.

use std::ffi::c_void;
use std::mem;

use heartbeat_types::Rgb;
use tiny_skia::Pixmap;
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, POINT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BeginPaint, DIB_RGB_COLORS, EndPaint, GetDC, HDC,
    PAINTSTRUCT, ReleaseDC, SetDIBitsToDevice,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::HiDpi::{
    DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2, SetProcessDpiAwarenessContext,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{ReleaseCapture, SetCapture};
use windows::Win32::UI::WindowsAndMessaging::{
    CS_HREDRAW, CS_VREDRAW, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW,
    FindWindowW, GWL_EXSTYLE, GetCursorPos, GetSystemMetrics, GetWindowLongPtrW, HTCLIENT,
    HWND_NOTOPMOST, HWND_TOPMOST, IDC_ARROW, IsWindow, LWA_ALPHA, LWA_COLORKEY, LoadCursorW, MSG,
    PM_REMOVE, PeekMessageW, PostQuitMessage, RegisterClassExW, SM_CXSCREEN, SM_CYSCREEN,
    SPI_GETWORKAREA, SW_HIDE, SW_SHOWNOACTIVATE, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE,
    SWP_NOZORDER, SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS, SetLayeredWindowAttributes,
    SetProcessDPIAware, SetWindowLongPtrW, SetWindowPos, ShowWindow, SystemParametersInfoW,
    TranslateMessage, WINDOW_EX_STYLE, WM_DESTROY, WM_ERASEBKGND, WM_LBUTTONDOWN, WM_LBUTTONUP,
    WM_MOUSEMOVE, WM_NCHITTEST, WM_PAINT, WM_QUIT, WNDCLASSEXW, WS_EX_LAYERED, WS_EX_NOACTIVATE,
    WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};
use windows::core::PCWSTR;

use super::{
    NativeHandle, OverlayPlatform, PlatformError, PointerEvent, WindowConfig, WorkArea,
    alpha_to_byte,
};

const CLASS_NAME: &str = "HeartbeatOverlayClass";
const ERROR_CLASS_ALREADY_EXISTS: i32 = 1410;

/// Windows overlay implementation
pub struct WindowsOverlay {
    hwnd: HWND,
    size: u32,
    /// Last presented frame, BGRA top-down, repainted on `WM_PAINT`
    bgra: Vec<u8>,
    dragging: bool,
    running: bool,
}

impl WindowsOverlay {
    pub fn new(config: WindowConfig) -> Result<Self, PlatformError> {
        register_class()?;

        let hwnd = unsafe {
            let class_name = wide_string(CLASS_NAME);
            let window_name = wide_string(&config.title);
            let hinstance = GetModuleHandleW(None)
                .map_err(|e| PlatformError::Other(format!("GetModuleHandleW failed: {}", e)))?;

            // Tool window keeps the overlay out of the taskbar and Alt+Tab
            let mut ex_style = WS_EX_LAYERED | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE;
            if config.topmost {
                ex_style |= WS_EX_TOPMOST;
            }
            if config.click_through {
                ex_style |= WS_EX_TRANSPARENT;
            }

            CreateWindowExW(
                ex_style,
                PCWSTR(class_name.as_ptr()),
                PCWSTR(window_name.as_ptr()),
                WS_POPUP,
                config.x,
                config.y,
                config.size as i32,
                config.size as i32,
                None,
                None,
                hinstance,
                None,
            )
            .map_err(|e| PlatformError::Other(format!("CreateWindowExW failed: {}", e)))?
        };

        tracing::debug!(hwnd = ?hwnd.0, "overlay window created");

        Ok(Self {
            hwnd,
            size: config.size,
            bgra: vec![0u8; (config.size * config.size * 4) as usize],
            dragging: false,
            running: true,
        })
    }

    /// Add `add` and clear `remove` in the extended style of `handle`.
    fn modify_ex_style(
        &self,
        handle: NativeHandle,
        add: WINDOW_EX_STYLE,
        remove: WINDOW_EX_STYLE,
    ) -> Result<(), PlatformError> {
        let hwnd = to_hwnd(handle);
        unsafe {
            if !IsWindow(hwnd).as_bool() {
                return Err(PlatformError::StaleHandle);
            }
            let current = GetWindowLongPtrW(hwnd, GWL_EXSTYLE);
            let next = (current | add.0 as isize) & !(remove.0 as isize);
            if next != current {
                SetWindowLongPtrW(hwnd, GWL_EXSTYLE, next);
            }
        }
        Ok(())
    }

    fn blit(&self, hdc: HDC) {
        let bmi = bitmap_info(self.size);
        unsafe {
            SetDIBitsToDevice(
                hdc,
                0,
                0,
                self.size,
                self.size,
                0,
                0,
                0,
                self.size,
                self.bgra.as_ptr() as *const c_void,
                &bmi,
                DIB_RGB_COLORS,
            );
        }
    }

    fn repaint(&self) {
        unsafe {
            let hdc = GetDC(self.hwnd);
            if !hdc.is_invalid() {
                self.blit(hdc);
                ReleaseDC(self.hwnd, hdc);
            }
        }
    }

    fn cursor_pos() -> (i32, i32) {
        let mut pt = POINT::default();
        unsafe {
            let _ = GetCursorPos(&mut pt);
        }
        (pt.x, pt.y)
    }
}

impl OverlayPlatform for WindowsOverlay {
    fn resolve_handle(&mut self, title_hint: &str) -> Option<NativeHandle> {
        unsafe {
            let class_name = wide_string(CLASS_NAME);
            let window_name = wide_string(title_hint);
            let found = FindWindowW(PCWSTR(class_name.as_ptr()), PCWSTR(window_name.as_ptr()))
                .ok()
                .filter(|hwnd| !hwnd.is_invalid());

            if let Some(hwnd) = found {
                self.hwnd = hwnd;
                return Some(from_hwnd(hwnd));
            }

            // Title lookup failed; fall back to the window we created
            IsWindow(self.hwnd)
                .as_bool()
                .then(|| from_hwnd(self.hwnd))
        }
    }

    fn enable_click_through(&mut self, handle: NativeHandle) -> Result<(), PlatformError> {
        self.modify_ex_style(
            handle,
            WS_EX_LAYERED | WS_EX_TRANSPARENT,
            WINDOW_EX_STYLE::default(),
        )
    }

    fn disable_click_through(&mut self, handle: NativeHandle) -> Result<(), PlatformError> {
        self.modify_ex_style(handle, WS_EX_LAYERED, WS_EX_TRANSPARENT)
    }

    fn apply_transparency(
        &mut self,
        handle: NativeHandle,
        key: Rgb,
        alpha: f64,
    ) -> Result<(), PlatformError> {
        let hwnd = to_hwnd(handle);
        unsafe {
            if !IsWindow(hwnd).as_bool() {
                return Err(PlatformError::StaleHandle);
            }
            SetLayeredWindowAttributes(
                hwnd,
                COLORREF(key.to_colorref()),
                alpha_to_byte(alpha),
                LWA_COLORKEY | LWA_ALPHA,
            )
            .map_err(|e| PlatformError::Other(format!("SetLayeredWindowAttributes failed: {}", e)))
        }
    }

    fn set_topmost(&mut self, topmost: bool) -> Result<(), PlatformError> {
        let insert_after = if topmost { HWND_TOPMOST } else { HWND_NOTOPMOST };
        unsafe {
            SetWindowPos(
                self.hwnd,
                insert_after,
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
            )
            .map_err(|e| PlatformError::Other(format!("SetWindowPos failed: {}", e)))
        }
    }

    fn work_area(&self) -> WorkArea {
        let mut rect = RECT::default();
        let queried = unsafe {
            SystemParametersInfoW(
                SPI_GETWORKAREA,
                0,
                Some(&mut rect as *mut RECT as *mut c_void),
                SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
            )
        };

        match queried {
            Ok(()) => WorkArea::new(rect.left, rect.top, rect.right, rect.bottom),
            Err(e) => {
                tracing::debug!(error = %e, "work area unavailable, using full screen");
                let (width, height) =
                    unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
                WorkArea::new(0, 0, width, height)
            }
        }
    }

    fn set_geometry(&mut self, x: i32, y: i32, size: u32) {
        if size != self.size {
            self.size = size;
            self.bgra = vec![0u8; (size * size * 4) as usize];
        }
        unsafe {
            let _ = SetWindowPos(
                self.hwnd,
                None,
                x,
                y,
                size as i32,
                size as i32,
                SWP_NOZORDER | SWP_NOACTIVATE,
            );
        }
    }

    fn present(&mut self, frame: &Pixmap) {
        if frame.width() != self.size || frame.height() != self.size {
            tracing::debug!(
                frame = frame.width(),
                window = self.size,
                "frame size does not match window, skipping"
            );
            return;
        }

        // RGBA -> BGRA; frames are fully opaque so premultiplication is moot
        for (dst, src) in self.bgra.chunks_exact_mut(4).zip(frame.data().chunks_exact(4)) {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
            dst[3] = src[3];
        }
        self.repaint();
    }

    fn show(&mut self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_SHOWNOACTIVATE);
        }
    }

    fn hide(&mut self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_HIDE);
        }
    }

    fn poll_events(&mut self, pointer: &mut Vec<PointerEvent>) -> bool {
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                if msg.message == WM_QUIT {
                    self.running = false;
                    return false;
                }

                let ours = msg.hwnd == self.hwnd;
                match msg.message {
                    WM_LBUTTONDOWN if ours => {
                        self.dragging = true;
                        let _ = SetCapture(self.hwnd);
                        let (x, y) = Self::cursor_pos();
                        pointer.push(PointerEvent::Pressed { x, y });
                    }
                    // Screen coordinates keep the drag stable while the window moves
                    WM_MOUSEMOVE if ours && self.dragging => {
                        let (x, y) = Self::cursor_pos();
                        pointer.push(PointerEvent::Moved { x, y });
                    }
                    WM_LBUTTONUP if ours => {
                        self.dragging = false;
                        let _ = ReleaseCapture();
                        pointer.push(PointerEvent::Released);
                    }
                    WM_PAINT if ours => {
                        let mut ps = PAINTSTRUCT::default();
                        let hdc = BeginPaint(self.hwnd, &mut ps);
                        self.blit(hdc);
                        let _ = EndPaint(self.hwnd, &ps);
                    }
                    _ => {
                        let _ = TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                }
            }
        }
        self.running
    }
}

impl Drop for WindowsOverlay {
    fn drop(&mut self) {
        unsafe {
            if IsWindow(self.hwnd).as_bool() {
                let _ = DestroyWindow(self.hwnd);
            }
        }
    }
}

/// Opt into per-monitor DPI awareness so coordinates are physical pixels.
/// Must run before any window is created.
pub fn set_dpi_awareness() {
    unsafe {
        if let Err(e) = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) {
            tracing::debug!(error = %e, "per-monitor DPI awareness unavailable, using system aware");
            let _ = SetProcessDPIAware();
        }
    }
}

fn register_class() -> Result<(), PlatformError> {
    unsafe {
        let class_name = wide_string(CLASS_NAME);
        let hinstance = GetModuleHandleW(None)
            .map_err(|e| PlatformError::Other(format!("GetModuleHandleW failed: {}", e)))?;

        let wc = WNDCLASSEXW {
            cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(window_proc),
            hInstance: hinstance.into(),
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            lpszClassName: PCWSTR(class_name.as_ptr()),
            ..Default::default()
        };

        if RegisterClassExW(&wc) == 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(ERROR_CLASS_ALREADY_EXISTS) {
                return Err(PlatformError::Other(format!(
                    "RegisterClassExW failed: {}",
                    err
                )));
            }
        }
    }
    Ok(())
}

/// Window procedure for the overlay window
unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        // Input transparency is decided by WS_EX_TRANSPARENT, not hit testing
        WM_NCHITTEST => LRESULT(HTCLIENT as isize),
        WM_ERASEBKGND => LRESULT(1),
        WM_DESTROY => {
            unsafe { PostQuitMessage(0) };
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

fn bitmap_info(size: u32) -> BITMAPINFO {
    BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: size as i32,
            biHeight: -(size as i32), // Top-down DIB
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn to_hwnd(handle: NativeHandle) -> HWND {
    HWND(handle.0 as *mut c_void)
}

fn from_hwnd(hwnd: HWND) -> NativeHandle {
    NativeHandle(hwnd.0 as isize)
}

/// Convert a &str to a null-terminated wide string
pub(crate) fn wide_string(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
