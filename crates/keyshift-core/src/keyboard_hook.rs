use crate::engine::ENGINE;
use crate::injector::{InputInjector, SendInputInjector, INJECTED_EXTRA_INFO};
use crate::types::{EventTag, KeyAction, KeyEdge, Vk};
use std::cell::RefCell;
use std::sync::Mutex;
use tracing::{error, info};
use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG,
    PEEK_MESSAGE_REMOVE_TYPE, WH_KEYBOARD_LL, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

static HOOK_HANDLE: Mutex<Option<HHOOK>> = Mutex::new(None);
static HOOK_THREAD: Mutex<Option<u32>> = Mutex::new(None);

thread_local! {
    // Replacement input is sent from the hook thread after the engine lock
    // has been released.
    static INJECTOR: RefCell<SendInputInjector> = RefCell::new(SendInputInjector::new());
}

/// Installs the low-level keyboard hook on the calling thread.
/// The thread must pump messages afterwards, see [`run_event_loop`].
pub fn install_hook() -> anyhow::Result<()> {
    info!("Installing keyboard hook...");

    let hook_id =
        unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(hook_proc), HINSTANCE::default(), 0) }
            .map_err(|e| {
                error!("SetWindowsHookExW failed: {}", e);
                anyhow::anyhow!("failed to install keyboard hook: {}", e)
            })?;

    if hook_id.is_invalid() {
        error!("SetWindowsHookExW returned an invalid handle");
        return Err(anyhow::anyhow!("failed to install keyboard hook"));
    }

    *lock(&HOOK_HANDLE) = Some(hook_id);
    *lock(&HOOK_THREAD) = Some(unsafe { GetCurrentThreadId() });
    info!("Keyboard hook installed. Handle: {:?}", hook_id);
    Ok(())
}

pub fn uninstall_hook() {
    let mut handle = lock(&HOOK_HANDLE);
    if let Some(h) = handle.take() {
        unsafe {
            let _ = UnhookWindowsHookEx(h);
        };
        info!("Keyboard hook uninstalled.");
    }
}

/// Asks the hook thread's message loop to exit.
pub fn request_stop() {
    if let Some(thread_id) = *lock(&HOOK_THREAD) {
        unsafe {
            let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
    }
}

/// Blocking message loop for the hook thread.
pub fn run_event_loop() {
    info!("Starting message loop...");
    let mut msg = MSG::default();
    unsafe {
        // Force message queue creation
        let _ = PeekMessageW(&mut msg, None, 0, 0, PEEK_MESSAGE_REMOVE_TYPE(0));

        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
    *lock(&HOOK_THREAD) = None;
    info!("Message loop exited.");
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

unsafe extern "system" fn hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code < 0 {
        return CallNextHookEx(None, code, wparam, lparam);
    }

    let kbd = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
    let msg = wparam.0 as u32;
    let edge = match msg {
        WM_KEYUP => KeyEdge::Up,
        WM_SYSKEYUP => KeyEdge::SysUp,
        WM_SYSKEYDOWN => KeyEdge::SysDown,
        _ => KeyEdge::Down,
    };
    let tag = if kbd.dwExtraInfo == INJECTED_EXTRA_INFO {
        EventTag::Injected
    } else {
        EventTag::Physical
    };

    let action = {
        let mut engine = ENGINE.lock();
        engine.on_event(Vk(kbd.vkCode as u16), edge, tag)
    };

    match action {
        KeyAction::Pass => CallNextHookEx(None, code, wparam, lparam),
        KeyAction::Block => LRESULT(1),
        KeyAction::Inject(events) => {
            let sent = INJECTOR.with(|injector| injector.borrow_mut().send(&events));
            if let Err(e) = sent {
                ENGINE.lock().report_injection_failure(events.len(), &e);
            }
            LRESULT(1)
        }
    }
}
