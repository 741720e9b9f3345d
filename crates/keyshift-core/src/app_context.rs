use parking_lot::RwLock;
use std::sync::Arc;

/// Identity of the foreground application, used to pick an app-specific
/// chord table. `None` means "no app table applies".
pub trait AppContextResolver {
    fn current_app_identity(&self) -> Option<String>;
}

/// Lowercase file name of an executable path, the form app tables are keyed by.
pub fn normalize_app_identity(path_or_name: &str) -> String {
    let trimmed = path_or_name.trim();
    let name = trimmed
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or(trimmed);
    name.to_lowercase()
}

/// Resolver whose answer is set by hand.
#[derive(Debug, Clone, Default)]
pub struct StaticAppContext {
    current: Arc<RwLock<Option<String>>>,
}

impl StaticAppContext {
    pub fn new(app: Option<&str>) -> Self {
        let ctx = Self::default();
        ctx.set(app);
        ctx
    }

    pub fn set(&self, app: Option<&str>) {
        *self.current.write() = app.map(normalize_app_identity);
    }
}

impl AppContextResolver for StaticAppContext {
    fn current_app_identity(&self) -> Option<String> {
        self.current.read().clone()
    }
}

#[cfg(windows)]
pub use self::windows_impl::ForegroundProcess;

#[cfg(windows)]
mod windows_impl {
    use super::{normalize_app_identity, AppContextResolver};
    use tracing::trace;
    use windows::core::PWSTR;
    use windows::Win32::Foundation::{CloseHandle, MAX_PATH};
    use windows::Win32::System::Threading::{
        OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
        PROCESS_QUERY_LIMITED_INFORMATION,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowThreadProcessId};

    /// Executable name of the process owning the foreground window.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ForegroundProcess;

    impl AppContextResolver for ForegroundProcess {
        fn current_app_identity(&self) -> Option<String> {
            unsafe {
                let hwnd = GetForegroundWindow();
                if hwnd.0 == 0 {
                    return None;
                }

                let mut pid = 0u32;
                GetWindowThreadProcessId(hwnd, Some(&mut pid as *mut u32));
                if pid == 0 {
                    return None;
                }

                let process = match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
                    Ok(h) => h,
                    Err(e) => {
                        trace!("OpenProcess({}) failed: {}", pid, e);
                        return None;
                    }
                };

                let mut buf = [0u16; MAX_PATH as usize];
                let mut len = buf.len() as u32;
                let queried = QueryFullProcessImageNameW(
                    process,
                    PROCESS_NAME_WIN32,
                    PWSTR(buf.as_mut_ptr()),
                    &mut len,
                );
                let _ = CloseHandle(process);

                if let Err(e) = queried {
                    trace!("QueryFullProcessImageNameW({}) failed: {}", pid, e);
                    return None;
                }

                let path = String::from_utf16_lossy(&buf[..len as usize]);
                Some(normalize_app_identity(&path))
            }
        }
    }
}
