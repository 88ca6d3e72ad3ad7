//! Win32 window inspector.
//!
//! Reads top-level windows with `EnumWindows` and their controls with
//! `EnumChildWindows`. Control text and progress positions are fetched with
//! `SendMessageTimeoutW` so a hung installer cannot stall the poll loop.

#![allow(unsafe_code)]

use std::ffi::c_void;

use unattend_core::{ControlInfo, PROGRESS_BAR_CLASS, ProgressRange, WindowInfo, WindowInspectorPort};
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumChildWindows, EnumWindows, GetClassNameW, GetWindowTextW, GetWindowThreadProcessId,
    IsWindowVisible, SMTO_ABORTIFHUNG, SendMessageTimeoutW, WM_GETTEXT,
};

const PBM_GETRANGE: u32 = 0x0407;
const PBM_GETPOS: u32 = 0x0408;
const MESSAGE_TIMEOUT_MS: u32 = 200;
const TEXT_CAPACITY: usize = 512;

/// Window inspector backed by the Win32 API.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32WindowInspector;

struct TopLevelSearch {
    pid: u32,
    found: Vec<HWND>,
}

unsafe extern "system" fn collect_top_level(hwnd: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: lparam is the `TopLevelSearch` passed by `windows_for_process`,
    // alive for the whole enumeration.
    let search = unsafe { &mut *(lparam.0 as *mut TopLevelSearch) };
    let mut owner = 0u32;
    unsafe { GetWindowThreadProcessId(hwnd, Some(&mut owner)) };
    if owner == search.pid && unsafe { IsWindowVisible(hwnd) }.as_bool() {
        search.found.push(hwnd);
    }
    TRUE
}

unsafe extern "system" fn collect_children(hwnd: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: lparam is the `Vec<HWND>` passed by `child_controls`.
    let children = unsafe { &mut *(lparam.0 as *mut Vec<HWND>) };
    children.push(hwnd);
    TRUE
}

fn to_handle(hwnd: HWND) -> u64 {
    hwnd.0 as usize as u64
}

fn from_handle(handle: u64) -> HWND {
    HWND(handle as usize as *mut c_void)
}

fn class_name(hwnd: HWND) -> String {
    let mut buf = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..usize::try_from(len).unwrap_or(0)])
}

fn window_title(hwnd: HWND) -> String {
    let mut buf = [0u16; TEXT_CAPACITY];
    let len = unsafe { GetWindowTextW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..usize::try_from(len).unwrap_or(0)])
}

fn send_with_timeout(hwnd: HWND, msg: u32, wparam: usize, lparam: isize) -> Option<usize> {
    let mut result = 0usize;
    let ok = unsafe {
        SendMessageTimeoutW(
            hwnd,
            msg,
            WPARAM(wparam),
            LPARAM(lparam),
            SMTO_ABORTIFHUNG,
            MESSAGE_TIMEOUT_MS,
            Some(&mut result),
        )
    };
    (ok.0 != 0).then_some(result)
}

/// Control text; `GetWindowTextW` does not cross process boundaries for
/// controls, `WM_GETTEXT` does.
fn control_text(hwnd: HWND) -> String {
    let mut buf = [0u16; TEXT_CAPACITY];
    let copied = send_with_timeout(
        hwnd,
        WM_GETTEXT,
        TEXT_CAPACITY,
        buf.as_mut_ptr() as isize,
    )
    .unwrap_or(0)
    .min(TEXT_CAPACITY);
    String::from_utf16_lossy(&buf[..copied])
}

fn progress_range(hwnd: HWND) -> Option<ProgressRange> {
    #[allow(clippy::cast_possible_wrap)]
    let as_i64 = |v: usize| v as u32 as i32 as i64;
    let position = send_with_timeout(hwnd, PBM_GETPOS, 0, 0)?;
    // wParam TRUE: low limit, FALSE: high limit
    let min = send_with_timeout(hwnd, PBM_GETRANGE, 1, 0)?;
    let max = send_with_timeout(hwnd, PBM_GETRANGE, 0, 0)?;
    Some(ProgressRange {
        position: as_i64(position),
        min: as_i64(min),
        max: as_i64(max),
    })
}

impl WindowInspectorPort for Win32WindowInspector {
    fn windows_for_process(&self, pid: u32) -> Vec<WindowInfo> {
        let mut search = TopLevelSearch {
            pid,
            found: Vec::new(),
        };
        let lparam = LPARAM(std::ptr::addr_of_mut!(search) as isize);
        if let Err(e) = unsafe { EnumWindows(Some(collect_top_level), lparam) } {
            tracing::debug!(target: "unattend.runtime", pid, error = %e, "EnumWindows failed");
        }

        search
            .found
            .into_iter()
            .map(|hwnd| WindowInfo {
                handle: to_handle(hwnd),
                title: window_title(hwnd),
                class_name: class_name(hwnd),
            })
            .collect()
    }

    fn child_controls(&self, window: &WindowInfo) -> Vec<ControlInfo> {
        let parent = from_handle(window.handle);
        let mut children: Vec<HWND> = Vec::new();
        let lparam = LPARAM(std::ptr::addr_of_mut!(children) as isize);
        let _ = unsafe { EnumChildWindows(parent, Some(collect_children), lparam) };

        children
            .into_iter()
            .map(|hwnd| {
                let class = class_name(hwnd);
                // Inno's TNewProgressBar subclasses the common control.
                let progress = (class.eq_ignore_ascii_case(PROGRESS_BAR_CLASS)
                    || class.to_ascii_lowercase().contains("progress"))
                .then(|| progress_range(hwnd))
                .flatten();
                ControlInfo {
                    text: if progress.is_some() {
                        String::new()
                    } else {
                        control_text(hwnd)
                    },
                    class_name: class,
                    progress,
                }
            })
            .collect()
    }
}
