use crate::shortcut::{Shortcut, ShortcutError};
use crate::types::{KeyEvent, Vk};
use crate::vk_map;
use crossbeam_channel::Sender;
use tracing::trace;

/// Captures a shortcut from live key presses.
///
/// While the user holds keys, the recorder keeps the set that was down at the
/// most recent press. Releasing keys does not shrink it, so the combination
/// survives until the user confirms.
#[derive(Debug, Default)]
pub struct ShortcutRecorder {
    held: Vec<Vk>,
    snapshot: Vec<Vk>,
    updates: Option<Sender<Vec<Vk>>>,
}

impl ShortcutRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every snapshot change is also sent to `updates`. A full or closed
    /// channel never blocks the hook.
    pub fn with_updates(updates: Sender<Vec<Vk>>) -> Self {
        Self {
            updates: Some(updates),
            ..Self::default()
        }
    }

    /// Returns false for the release of a key that went down before
    /// recording started; that release belongs to the OS.
    pub fn record(&mut self, event: &KeyEvent) -> bool {
        if event.is_up() {
            let before = self.held.len();
            self.held.retain(|k| *k != event.vk);
            return self.held.len() != before;
        }
        if self.held.contains(&event.vk) {
            return true;
        }
        self.held.push(event.vk);

        // Modifiers first, each group in press order.
        let (mut keys, rest): (Vec<Vk>, Vec<Vk>) =
            self.held.iter().copied().partition(|k| vk_map::is_modifier(*k));
        keys.extend(rest);
        if keys == self.snapshot {
            return true;
        }
        self.snapshot = keys;
        trace!("recorder snapshot {:?}", self.snapshot);

        if let Some(tx) = &self.updates {
            let _ = tx.try_send(self.snapshot.clone());
        }
        true
    }

    pub fn held(&self) -> &[Vk] {
        &self.held
    }

    pub fn snapshot(&self) -> &[Vk] {
        &self.snapshot
    }

    pub fn detected_shortcut(&self) -> Result<Shortcut, ShortcutError> {
        Shortcut::new(self.snapshot.clone())
    }

    pub fn clear(&mut self) {
        self.held.clear();
        self.snapshot.clear();
    }
}
