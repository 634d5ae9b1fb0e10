use std::sync::Arc;
use std::time::Duration;

use ao_core::config::LaunchSettings;
use ao_core::error::WindowError;
use ao_core::window::WindowControl;

const UNSUPPORTED_MESSAGE: &str = "Window checking is only supported on Windows";

fn character_title(prefix: &str, character_name: &str) -> String {
    format!("{prefix}{character_name}")
}

/// Strips the game prefix from a window title; `None` for other windows.
#[cfg_attr(not(windows), allow(dead_code))]
fn character_from_title<'t>(prefix: &str, title: &'t str) -> Option<&'t str> {
    let name = title.strip_prefix(prefix)?.trim();
    (!name.is_empty()).then_some(name)
}

/// Window backend for hosts without a desktop window API.
#[derive(Debug, Clone)]
pub struct UnsupportedWindows {
    title_prefix: String,
}

impl UnsupportedWindows {
    pub fn new(title_prefix: impl Into<String>) -> Self {
        Self {
            title_prefix: title_prefix.into(),
        }
    }
}

impl WindowControl for UnsupportedWindows {
    fn list_running_character_windows(&self) -> Result<Vec<String>, WindowError> {
        Err(WindowError::Unsupported(UNSUPPORTED_MESSAGE.to_string()))
    }

    fn focus_window(&self, _title: &str) -> Result<bool, WindowError> {
        Err(WindowError::Unsupported(UNSUPPORTED_MESSAGE.to_string()))
    }

    fn close_window(&self, _title: &str) -> Result<bool, WindowError> {
        Err(WindowError::Unsupported(UNSUPPORTED_MESSAGE.to_string()))
    }

    fn character_window_title(&self, character_name: &str) -> String {
        character_title(&self.title_prefix, character_name)
    }
}

/// Picks the window backend for the current host.
pub fn default_window_control(settings: &LaunchSettings) -> Arc<dyn WindowControl> {
    #[cfg(windows)]
    {
        Arc::new(Win32Windows::new(
            settings.window_title_prefix.clone(),
            settings.close_message_gap(),
        ))
    }
    #[cfg(not(windows))]
    {
        Arc::new(UnsupportedWindows::new(settings.window_title_prefix.clone()))
    }
}

#[cfg_attr(not(windows), allow(dead_code))]
fn close_gap_or_default(gap: Duration) -> Duration {
    if gap.is_zero() {
        Duration::from_millis(100)
    } else {
        gap
    }
}

#[cfg(windows)]
pub use win32::Win32Windows;

#[cfg(windows)]
mod win32 {
    use std::thread;
    use std::time::Duration;

    use ao_core::error::WindowError;
    use ao_core::window::WindowControl;
    use tracing::{debug, warn};
    use windows_sys::Win32::Foundation::{BOOL, HWND, LPARAM};
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        EnumWindows, FindWindowW, GetWindowTextLengthW, GetWindowTextW, IsIconic,
        IsWindowVisible, PostMessageW, SetForegroundWindow, ShowWindow, SW_RESTORE, WM_CLOSE,
    };

    use super::{character_from_title, character_title, close_gap_or_default};

    /// Desktop window backend using the Win32 window list.
    #[derive(Debug, Clone)]
    pub struct Win32Windows {
        title_prefix: String,
        close_gap: Duration,
    }

    impl Win32Windows {
        pub fn new(title_prefix: impl Into<String>, close_gap: Duration) -> Self {
            Self {
                title_prefix: title_prefix.into(),
                close_gap: close_gap_or_default(close_gap),
            }
        }
    }

    unsafe extern "system" fn collect_visible_title(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let titles = &mut *(lparam as *mut Vec<String>);
        if IsWindowVisible(hwnd) != 0 {
            let title = window_title(hwnd);
            if !title.is_empty() {
                titles.push(title);
            }
        }
        1
    }

    fn window_title(hwnd: HWND) -> String {
        unsafe {
            let len = GetWindowTextLengthW(hwnd);
            if len <= 0 {
                return String::new();
            }
            let mut buf = vec![0u16; (len + 1) as usize];
            let read = GetWindowTextW(hwnd, buf.as_mut_ptr(), buf.len() as i32);
            if read > 0 {
                String::from_utf16_lossy(&buf[..read as usize])
            } else {
                String::new()
            }
        }
    }

    fn visible_titles() -> Result<Vec<String>, WindowError> {
        let mut titles: Vec<String> = Vec::new();
        let ok = unsafe {
            EnumWindows(
                Some(collect_visible_title),
                &mut titles as *mut Vec<String> as LPARAM,
            )
        };
        if ok == 0 {
            return Err(WindowError::Failed(
                "failed to enumerate desktop windows".to_string(),
            ));
        }
        Ok(titles)
    }

    fn find_window(title: &str) -> Option<HWND> {
        let wide = title
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect::<Vec<u16>>();
        let hwnd = unsafe { FindWindowW(std::ptr::null(), wide.as_ptr()) };
        (!hwnd.is_null()).then_some(hwnd)
    }

    impl WindowControl for Win32Windows {
        fn list_running_character_windows(&self) -> Result<Vec<String>, WindowError> {
            let names = visible_titles()?
                .iter()
                .filter_map(|title| character_from_title(&self.title_prefix, title))
                .map(str::to_string)
                .collect::<Vec<_>>();
            debug!(count = names.len(), "listed running character windows");
            Ok(names)
        }

        fn focus_window(&self, title: &str) -> Result<bool, WindowError> {
            let Some(hwnd) = find_window(title) else {
                return Ok(false);
            };
            unsafe {
                if IsIconic(hwnd) != 0 {
                    ShowWindow(hwnd, SW_RESTORE);
                }
                if SetForegroundWindow(hwnd) == 0 {
                    warn!(%title, "foreground change refused by the desktop");
                }
            }
            Ok(true)
        }

        fn close_window(&self, title: &str) -> Result<bool, WindowError> {
            let Some(hwnd) = find_window(title) else {
                return Ok(false);
            };
            // Two close requests, `close_gap` apart.
            if unsafe { PostMessageW(hwnd, WM_CLOSE, 0, 0) } == 0 {
                return Err(WindowError::Failed(format!(
                    "failed to post close message to {title}"
                )));
            }
            thread::sleep(self.close_gap);
            unsafe {
                PostMessageW(hwnd, WM_CLOSE, 0, 0);
            }
            Ok(true)
        }

        fn character_window_title(&self, character_name: &str) -> String {
            character_title(&self.title_prefix, character_name)
        }
    }
}
