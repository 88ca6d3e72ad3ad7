//! Window inspection adapters.

use std::sync::Arc;

use unattend_core::WindowInspectorPort;

#[cfg(windows)]
mod win32;

#[cfg(windows)]
pub use win32::Win32WindowInspector;

/// The window inspector for the current platform.
///
/// Windows gets the Win32 inspector; other hosts have no installer windows
/// to read and get [`unattend_core::NoopWindowInspector`].
pub fn platform_window_inspector() -> Arc<dyn WindowInspectorPort> {
    #[cfg(windows)]
    {
        Arc::new(Win32WindowInspector)
    }

    #[cfg(not(windows))]
    {
        Arc::new(unattend_core::NoopWindowInspector)
    }
}
