use crate::types::InputEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Value stamped into `dwExtraInfo` of every tagged event we inject.
pub const INJECTED_EXTRA_INFO: usize = 0x4B53_4654;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectError {
    #[error("input sink accepted {sent} of {requested} events")]
    Rejected { sent: usize, requested: usize },
}

/// Sink for synthesized keyboard input. Events must be emitted in order.
pub trait InputInjector {
    fn send(&mut self, events: &[InputEvent]) -> Result<(), InjectError>;
}

/// Keeps everything it is asked to send. Cloned handles share one buffer, so a
/// test can hand one to the engine and read from the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingInjector {
    events: Arc<Mutex<Vec<InputEvent>>>,
    fail: bool,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// An injector that rejects every batch.
    pub fn failing() -> Self {
        Self {
            events: Arc::default(),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().clone()
    }

    /// Drains the recorded events.
    pub fn take(&self) -> Vec<InputEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl InputInjector for RecordingInjector {
    fn send(&mut self, events: &[InputEvent]) -> Result<(), InjectError> {
        if self.fail {
            return Err(InjectError::Rejected {
                sent: 0,
                requested: events.len(),
            });
        }
        self.events.lock().extend_from_slice(events);
        Ok(())
    }
}

#[cfg(windows)]
pub use self::windows_impl::SendInputInjector;

#[cfg(windows)]
mod windows_impl {
    use super::{InjectError, InputInjector, INJECTED_EXTRA_INFO};
    use crate::types::{EventTag, InputEvent};
    use crate::vk_map;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYBD_EVENT_FLAGS,
        KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, VIRTUAL_KEY,
    };

    /// Emits events through `SendInput` in a single batch.
    #[derive(Default)]
    pub struct SendInputInjector {
        buf: Vec<INPUT>,
    }

    impl SendInputInjector {
        pub fn new() -> Self {
            Self::default()
        }
    }

    fn to_input(event: &InputEvent) -> INPUT {
        let mut flags = KEYBD_EVENT_FLAGS(0);
        if event.up {
            flags |= KEYEVENTF_KEYUP;
        }
        if vk_map::is_extended_key(event.vk) {
            flags |= KEYEVENTF_EXTENDEDKEY;
        }
        let extra = match event.tag {
            EventTag::Injected => INJECTED_EXTRA_INFO,
            EventTag::Physical => 0,
        };

        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(event.vk.code()),
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: extra,
                },
            },
        }
    }

    impl InputInjector for SendInputInjector {
        fn send(&mut self, events: &[InputEvent]) -> Result<(), InjectError> {
            if events.is_empty() {
                return Ok(());
            }
            self.buf.clear();
            self.buf.extend(events.iter().map(to_input));

            let sent =
                unsafe { SendInput(&self.buf, std::mem::size_of::<INPUT>() as i32) } as usize;
            if sent != events.len() {
                return Err(InjectError::Rejected {
                    sent,
                    requested: events.len(),
                });
            }
            Ok(())
        }
    }
}
