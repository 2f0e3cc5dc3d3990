//! Win32 notification-area icon
//!
//! A hidden window owns the icon and receives its callback messages. Menu
//! items are posted back to it as `WM_COMMAND` once the popup closes.

use std::cell::RefCell;
use std::ffi::c_void;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use heartbeat_types::Rgb;
use tokio::sync::mpsc::UnboundedSender;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::Graphics::Gdi::{CreateBitmap, DeleteObject};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Shell::{
    NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NOTIFYICONDATAW, Shell_NotifyIconW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreateIconIndirect, CreatePopupMenu, CreateWindowExW, DefWindowProcW,
    DestroyIcon, DestroyMenu, DestroyWindow, DispatchMessageW, GetCursorPos, GetMessageW, HICON,
    ICONINFO, IDI_APPLICATION, LoadIconW, MF_SEPARATOR, MF_STRING, MSG, PostMessageW,
    PostQuitMessage, RegisterClassExW, SetForegroundWindow, TPM_BOTTOMALIGN, TPM_RIGHTBUTTON,
    TrackPopupMenu, TranslateMessage, WINDOW_EX_STYLE, WM_APP, WM_CLOSE, WM_COMMAND, WM_DESTROY,
    WM_LBUTTONUP, WM_NULL, WM_RBUTTONUP, WNDCLASSEXW, WS_POPUP,
};
use windows::core::PCWSTR;

use super::{TrayCommand, TrayLabels};
use crate::platform::{PlatformError, wide_string};
use crate::render::render_tray_icon;

const CLASS_NAME: &str = "HeartbeatTrayClass";
const ERROR_CLASS_ALREADY_EXISTS: i32 = 1410;
const ICON_SIZE: u32 = 32;
const TRAY_ID: u32 = 1;
const WM_TRAY: u32 = WM_APP + 1;

/// Per-thread tray state, reachable from the window procedure
struct TrayState {
    sender: UnboundedSender<TrayCommand>,
    labels: TrayLabels,
    move_mode: Arc<AtomicBool>,
    icon: HICON,
    icon_added: bool,
}

thread_local! {
    static STATE: RefCell<Option<TrayState>> = const { RefCell::new(None) };
}

/// Running tray thread
pub(super) struct TrayThread {
    hwnd: isize,
    thread: JoinHandle<()>,
}

impl TrayThread {
    pub(super) fn spawn(
        sender: UnboundedSender<TrayCommand>,
        labels: TrayLabels,
        move_mode: Arc<AtomicBool>,
    ) -> Result<Self, PlatformError> {
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<isize, String>>();

        let thread = thread::Builder::new()
            .name("tray".into())
            .spawn(move || {
                let hwnd = match create_tray(sender, labels, move_mode) {
                    Ok(hwnd) => hwnd,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(hwnd.0 as isize));
                run_message_loop();
                STATE.with(|state| state.borrow_mut().take());
                tracing::debug!("tray thread finished");
            })
            .map_err(|e| PlatformError::Other(format!("failed to spawn tray thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(hwnd)) => Ok(Self { hwnd, thread }),
            Ok(Err(msg)) => {
                let _ = thread.join();
                Err(PlatformError::Other(msg))
            }
            Err(_) => Err(PlatformError::Other("tray thread exited during startup".into())),
        }
    }

    /// Ask the tray window to close, then join its thread.
    pub(super) fn shutdown(self) {
        let hwnd = HWND(self.hwnd as *mut c_void);
        // Fails harmlessly when Exit already destroyed the window
        let _ = unsafe { PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0)) };
        if self.thread.join().is_err() {
            tracing::warn!("tray thread panicked");
        }
    }
}

fn create_tray(
    sender: UnboundedSender<TrayCommand>,
    labels: TrayLabels,
    move_mode: Arc<AtomicBool>,
) -> Result<HWND, PlatformError> {
    register_class()?;

    let hwnd = unsafe {
        let class_name = wide_string(CLASS_NAME);
        let hinstance = GetModuleHandleW(None)
            .map_err(|e| PlatformError::Other(format!("GetModuleHandleW failed: {}", e)))?;

        // Never shown; only receives the icon's callback messages
        CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            PCWSTR(class_name.as_ptr()),
            PCWSTR(class_name.as_ptr()),
            WS_POPUP,
            0,
            0,
            0,
            0,
            None,
            None,
            hinstance,
            None,
        )
        .map_err(|e| PlatformError::Other(format!("CreateWindowExW failed: {}", e)))?
    };

    let icon = build_icon();
    let tooltip = labels.tooltip.clone();
    STATE.with(|state| {
        *state.borrow_mut() = Some(TrayState {
            sender,
            labels,
            move_mode,
            icon,
            icon_added: false,
        });
    });

    let mut data = notify_data(hwnd);
    data.uFlags = NIF_MESSAGE | NIF_ICON | NIF_TIP;
    data.uCallbackMessage = WM_TRAY;
    data.hIcon = icon;
    let tip: Vec<u16> = tooltip.encode_utf16().collect();
    let len = tip.len().min(data.szTip.len() - 1);
    data.szTip[..len].copy_from_slice(&tip[..len]);

    if !unsafe { Shell_NotifyIconW(NIM_ADD, &data) }.as_bool() {
        unsafe {
            let _ = DestroyWindow(hwnd);
        }
        return Err(PlatformError::Other("Shell_NotifyIconW(NIM_ADD) failed".into()));
    }
    STATE.with(|state| {
        if let Some(state) = state.borrow_mut().as_mut() {
            state.icon_added = true;
        }
    });

    tracing::info!("tray icon added");
    Ok(hwnd)
}

fn run_message_loop() {
    let mut msg = MSG::default();
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

fn notify_data(hwnd: HWND) -> NOTIFYICONDATAW {
    NOTIFYICONDATAW {
        cbSize: mem::size_of::<NOTIFYICONDATAW>() as u32,
        hWnd: hwnd,
        uID: TRAY_ID,
        ..Default::default()
    }
}

fn remove_icon(hwnd: HWND) {
    let added = STATE.with(|state| {
        state
            .borrow_mut()
            .as_mut()
            .map(|state| mem::replace(&mut state.icon_added, false))
            .unwrap_or(false)
    });
    if added {
        unsafe {
            let _ = Shell_NotifyIconW(NIM_DELETE, &notify_data(hwnd));
        }
        tracing::info!("tray icon removed");
    }
}

/// Tray icon from the dot renderer, falling back to the stock application icon
fn build_icon() -> HICON {
    let rendered = render_tray_icon(ICON_SIZE, Rgb::CYAN).and_then(|pixmap| {
        let bgra: Vec<u8> = pixmap
            .data()
            .chunks_exact(4)
            .flat_map(|px| [px[2], px[1], px[0], px[3]])
            .collect();
        // Opaque icon: an all-zero AND mask
        let mask_bits = vec![0u8; (ICON_SIZE * ICON_SIZE / 8) as usize];
        let size = ICON_SIZE as i32;
        unsafe {
            let color = CreateBitmap(size, size, 1, 32, Some(bgra.as_ptr() as *const c_void));
            let mask = CreateBitmap(size, size, 1, 1, Some(mask_bits.as_ptr() as *const c_void));
            let info = ICONINFO {
                fIcon: true.into(),
                xHotspot: 0,
                yHotspot: 0,
                hbmMask: mask,
                hbmColor: color,
            };
            let icon = CreateIconIndirect(&info).ok();
            let _ = DeleteObject(color);
            let _ = DeleteObject(mask);
            icon
        }
    });

    match rendered {
        Some(icon) => icon,
        None => {
            tracing::warn!("could not build tray icon, using the default");
            unsafe { LoadIconW(None, IDI_APPLICATION).unwrap_or_default() }
        }
    }
}

fn show_menu(hwnd: HWND) {
    // Copy the labels out so no borrow is held across the modal menu loop
    let items: Vec<(TrayCommand, Vec<u16>)> = STATE.with(|state| {
        let state = state.borrow();
        let Some(state) = state.as_ref() else {
            return Vec::new();
        };
        let move_mode = state.move_mode.load(Ordering::Relaxed);
        TrayCommand::MENU
            .iter()
            .map(|&command| (command, wide_string(state.labels.label(command, move_mode))))
            .collect()
    });
    if items.is_empty() {
        return;
    }

    unsafe {
        let menu = match CreatePopupMenu() {
            Ok(menu) => menu,
            Err(e) => {
                tracing::warn!(error = %e, "failed to create tray menu");
                return;
            }
        };
        for (command, label) in &items {
            let _ = AppendMenuW(menu, MF_STRING, command.id() as usize, PCWSTR(label.as_ptr()));
            if command.ends_group() {
                let _ = AppendMenuW(menu, MF_SEPARATOR, 0, PCWSTR::null());
            }
        }

        // The menu only dismisses on outside clicks when we are foreground
        let _ = SetForegroundWindow(hwnd);
        let mut pt = POINT::default();
        let _ = GetCursorPos(&mut pt);
        let _ = TrackPopupMenu(
            menu,
            TPM_BOTTOMALIGN | TPM_RIGHTBUTTON,
            pt.x,
            pt.y,
            0,
            hwnd,
            None,
        );
        // Lets the next tray click dismiss the menu
        let _ = PostMessageW(hwnd, WM_NULL, WPARAM(0), LPARAM(0));
        let _ = DestroyMenu(menu);
    }
}

fn dispatch(hwnd: HWND, command: TrayCommand) {
    tracing::debug!(?command, "tray command");
    if command == TrayCommand::Exit {
        remove_icon(hwnd);
    }
    STATE.with(|state| {
        if let Some(state) = state.borrow().as_ref()
            && state.sender.send(command).is_err()
        {
            tracing::warn!(?command, "overlay is no longer listening for tray commands");
        }
    });
    if command == TrayCommand::Exit {
        unsafe {
            let _ = DestroyWindow(hwnd);
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
            lpfnWndProc: Some(tray_proc),
            hInstance: hinstance.into(),
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

unsafe extern "system" fn tray_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_TRAY => {
            let event = (lparam.0 & 0xFFFF) as u32;
            if event == WM_RBUTTONUP || event == WM_LBUTTONUP {
                show_menu(hwnd);
            }
            LRESULT(0)
        }
        WM_COMMAND => {
            let id = (wparam.0 & 0xFFFF) as u16;
            if let Some(command) = TrayCommand::from_id(id) {
                dispatch(hwnd, command);
            }
            LRESULT(0)
        }
        WM_CLOSE => {
            unsafe {
                let _ = DestroyWindow(hwnd);
            }
            LRESULT(0)
        }
        WM_DESTROY => {
            remove_icon(hwnd);
            let icon = STATE.with(|state| state.borrow().as_ref().map(|state| state.icon));
            if let Some(icon) = icon {
                unsafe {
                    let _ = DestroyIcon(icon);
                }
            }
            unsafe { PostQuitMessage(0) };
            LRESULT(0)
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}
