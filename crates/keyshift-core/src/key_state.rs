use crate::types::{InputEvent, KeyEvent, Vk};
use crate::vk_map;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Live "is this key down right now" query.
///
/// Chord matching polls this instead of tracking transitions itself, because
/// only the OS knows about keys that went down before the hook was installed
/// or while the engine was disabled.
pub trait KeyStateSource {
    fn is_down(&self, vk: Vk) -> bool;
}

/// In-memory key state. Side-less modifier codes report down when either
/// side is held, the same way `GetAsyncKeyState` answers for them.
#[derive(Debug, Clone, Default)]
pub struct KeyboardSnapshot {
    held: Arc<RwLock<HashSet<Vk>>>,
}

impl KeyboardSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self, vk: Vk) {
        self.held.write().insert(vk);
    }

    pub fn release(&self, vk: Vk) {
        self.held.write().remove(&vk);
    }

    pub fn apply(&self, event: &KeyEvent) {
        if event.is_down() {
            self.press(event.vk);
        } else {
            self.release(event.vk);
        }
    }

    pub fn apply_input(&self, event: &InputEvent) {
        self.apply(&event.as_key_event());
    }

    pub fn clear(&self) {
        self.held.write().clear();
    }

    /// Currently held keys, sorted by code.
    pub fn held(&self) -> Vec<Vk> {
        let mut keys: Vec<Vk> = self.held.read().iter().copied().collect();
        keys.sort();
        keys
    }
}

impl KeyStateSource for KeyboardSnapshot {
    fn is_down(&self, vk: Vk) -> bool {
        let held = self.held.read();
        if held.contains(&vk) {
            return true;
        }
        vk_map::is_generic_modifier(vk) && held.iter().any(|k| vk_map::key_matches(vk, *k))
    }
}

#[cfg(windows)]
pub use self::windows_impl::AsyncKeyState;

#[cfg(windows)]
mod windows_impl {
    use super::KeyStateSource;
    use crate::types::Vk;
    use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;

    #[derive(Debug, Clone, Copy, Default)]
    pub struct AsyncKeyState;

    impl KeyStateSource for AsyncKeyState {
        fn is_down(&self, vk: Vk) -> bool {
            unsafe { GetAsyncKeyState(vk.code() as i32) as u16 & 0x8000 != 0 }
        }
    }
}
