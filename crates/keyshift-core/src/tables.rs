use crate::config::ConfigError;
use crate::shortcut::Shortcut;
use crate::types::{InputEvent, Vk};
use std::collections::{HashMap, VecDeque};

/// Replacement for a single remapped key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTarget {
    Key(Vk),
    /// Swallow the key without injecting anything.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToggleState {
    #[default]
    Released,
    Held,
}

/// What a chord trigger is replaced with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemapTarget {
    Shortcut(Shortcut),
    Key(Vk),
}

impl RemapTarget {
    /// Replacement keys in press order. The last one is the action key.
    pub fn keys(&self) -> &[Vk] {
        match self {
            RemapTarget::Shortcut(s) => s.keys(),
            RemapTarget::Key(k) => std::slice::from_ref(k),
        }
    }

    pub fn first_key(&self) -> Vk {
        self.keys()[0]
    }

    pub fn action_key(&self) -> Vk {
        let keys = self.keys();
        keys[keys.len() - 1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Inactive,
    /// The replacement chord has been injected and is being held down.
    Active,
}

#[derive(Debug, Clone)]
pub struct RemapShortcut {
    pub target: RemapTarget,
    pub(crate) state: Activation,
    /// Physical prefix keys released on activation, in trigger order.
    pub(crate) released: Vec<Vk>,
    /// Tagged events we injected while active that have not come back through
    /// the hook yet.
    pub(crate) echoes: VecDeque<InputEvent>,
}

impl RemapShortcut {
    pub fn new(target: RemapTarget) -> Self {
        Self {
            target,
            state: Activation::Inactive,
            released: Vec::new(),
            echoes: VecDeque::new(),
        }
    }

    pub fn state(&self) -> Activation {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == Activation::Active
    }

    pub fn pending_echoes(&self) -> usize {
        self.echoes.len()
    }

    /// True while a tagged down of `vk` is on its way back through the hook.
    /// Polled key state does not show it yet.
    pub(crate) fn awaits_down(&self, vk: Vk) -> bool {
        self.echoes.contains(&InputEvent::down(vk))
    }

    /// Consumes `echo` if it is pending. Anything queued before it was lost
    /// on the way and is dropped as well.
    pub(crate) fn take_echo(&mut self, echo: &InputEvent) -> bool {
        match self.echoes.iter().position(|e| e == echo) {
            Some(pos) => {
                self.echoes.drain(..=pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.state = Activation::Inactive;
        self.released.clear();
        self.echoes.clear();
    }
}

#[derive(Debug, Clone)]
pub struct ChordEntry {
    pub trigger: Shortcut,
    pub remap: RemapShortcut,
}

/// Trigger -> replacement chords for one scope. Scanned by matching; the
/// first entry that claims an event wins.
#[derive(Debug, Clone, Default)]
pub struct ChordTable {
    entries: Vec<ChordEntry>,
}

impl ChordTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, trigger: Shortcut, target: RemapTarget) -> Result<(), ConfigError> {
        if self.contains_trigger(&trigger) {
            return Err(ConfigError::DuplicateTrigger(trigger.to_string()));
        }
        self.entries.push(ChordEntry {
            trigger,
            remap: RemapShortcut::new(target),
        });
        Ok(())
    }

    pub fn get(&self, trigger: &Shortcut) -> Option<&RemapShortcut> {
        self.entries
            .iter()
            .find(|e| &e.trigger == trigger)
            .map(|e| &e.remap)
    }

    pub fn contains_trigger(&self, trigger: &Shortcut) -> bool {
        self.entries.iter().any(|e| &e.trigger == trigger)
    }

    pub fn entries(&self) -> &[ChordEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [ChordEntry] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_active(&self) -> bool {
        self.entries.iter().any(|e| e.remap.is_active())
    }

    /// Pairs `(a, b)` where `a` fires first whenever `b` is pressed.
    pub fn overlaps(&self) -> Vec<(&Shortcut, &Shortcut)> {
        let mut found = Vec::new();
        for (i, a) in self.entries.iter().enumerate() {
            for b in &self.entries[i + 1..] {
                if a.trigger.shadows(&b.trigger) {
                    found.push((&a.trigger, &b.trigger));
                } else if b.trigger.shadows(&a.trigger) {
                    found.push((&b.trigger, &a.trigger));
                }
            }
        }
        found
    }

    /// Releases every replacement chord still held and returns all entries
    /// to `Inactive`.
    pub(crate) fn release_all(&mut self, out: &mut Vec<InputEvent>) {
        for entry in &mut self.entries {
            if entry.remap.is_active() {
                out.extend(entry.remap.target.keys().iter().rev().map(|k| InputEvent::up(*k)));
            }
            entry.remap.reset();
        }
    }
}

/// Everything the hook consults. Built by the settings side; the engine only
/// flips the runtime flags inside it.
#[derive(Debug, Clone, Default)]
pub struct RemapTables {
    pub(crate) single_keys: HashMap<Vk, KeyTarget>,
    pub(crate) toggles: HashMap<Vk, ToggleState>,
    pub(crate) os_chords: ChordTable,
    pub(crate) app_chords: HashMap<String, ChordTable>,
}

impl RemapTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_single_key(&mut self, from: Vk, target: KeyTarget) -> Result<(), ConfigError> {
        if self.single_keys.contains_key(&from) {
            return Err(ConfigError::DuplicateSource(from.to_string()));
        }
        self.single_keys.insert(from, target);
        Ok(())
    }

    pub fn add_toggle(&mut self, key: Vk) -> Result<(), ConfigError> {
        if self.toggles.contains_key(&key) {
            return Err(ConfigError::DuplicateSource(key.to_string()));
        }
        self.toggles.insert(key, ToggleState::Released);
        Ok(())
    }

    pub fn insert_os_chord(
        &mut self,
        trigger: Shortcut,
        target: RemapTarget,
    ) -> Result<(), ConfigError> {
        self.os_chords.insert(trigger, target)
    }

    pub fn insert_app_chord(
        &mut self,
        app: &str,
        trigger: Shortcut,
        target: RemapTarget,
    ) -> Result<(), ConfigError> {
        self.app_chords
            .entry(app.to_string())
            .or_default()
            .insert(trigger, target)
    }

    pub fn single_key(&self, vk: Vk) -> Option<KeyTarget> {
        self.single_keys.get(&vk).copied()
    }

    pub fn toggle_state(&self, vk: Vk) -> Option<ToggleState> {
        self.toggles.get(&vk).copied()
    }

    pub fn os_chords(&self) -> &ChordTable {
        &self.os_chords
    }

    pub fn app_chords(&self, app: &str) -> Option<&ChordTable> {
        self.app_chords.get(app)
    }

    pub fn app_identities(&self) -> impl Iterator<Item = &str> {
        self.app_chords.keys().map(String::as_str)
    }

    pub fn has_app_chords(&self) -> bool {
        !self.app_chords.is_empty()
    }

    pub fn single_keys(&self) -> impl Iterator<Item = (Vk, KeyTarget)> + '_ {
        self.single_keys.iter().map(|(from, to)| (*from, *to))
    }

    pub fn toggle_keys(&self) -> impl Iterator<Item = Vk> + '_ {
        self.toggles.keys().copied()
    }

    pub fn single_key_count(&self) -> usize {
        self.single_keys.len()
    }

    pub fn toggle_count(&self) -> usize {
        self.toggles.len()
    }

    pub fn has_active_chords(&self) -> bool {
        self.os_chords.has_active() || self.app_chords.values().any(ChordTable::has_active)
    }

    /// Forgets pending echoes. Called when injection failed, since those
    /// events will never arrive.
    pub(crate) fn drop_echoes(&mut self) {
        let tables = std::iter::once(&mut self.os_chords).chain(self.app_chords.values_mut());
        for table in tables {
            for entry in table.entries_mut() {
                entry.remap.echoes.clear();
            }
        }
    }

    /// Releases held replacement chords into `out` and puts every toggle and
    /// chord back at rest.
    pub(crate) fn release_all(&mut self, out: &mut Vec<InputEvent>) {
        self.os_chords.release_all(out);
        for table in self.app_chords.values_mut() {
            table.release_all(out);
        }
        for state in self.toggles.values_mut() {
            *state = ToggleState::Released;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vk_map::{letter, VK_CAPITAL, VK_LCONTROL, VK_LMENU};

    fn shortcut(s: &str) -> Shortcut {
        s.parse().expect("valid shortcut")
    }

    #[test]
    fn test_duplicate_trigger_rejected() {
        let mut table = ChordTable::new();
        table
            .insert(shortcut("LAlt+D"), RemapTarget::Shortcut(shortcut("LCtrl+V")))
            .unwrap();
        let err = table
            .insert(shortcut("LAlt+D"), RemapTarget::Key(letter('x')))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTrigger(_)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_release_all_resets_and_releases_in_reverse() {
        let mut tables = RemapTables::new();
        tables
            .insert_os_chord(shortcut("LAlt+D"), RemapTarget::Shortcut(shortcut("LCtrl+V")))
            .unwrap();
        tables.add_toggle(VK_CAPITAL).unwrap();

        tables.os_chords.entries_mut()[0].remap.state = Activation::Active;
        tables.toggles.insert(VK_CAPITAL, ToggleState::Held);

        let mut out = Vec::new();
        tables.release_all(&mut out);

        assert_eq!(
            out,
            vec![InputEvent::up(letter('v')), InputEvent::up(VK_LCONTROL)]
        );
        assert!(!tables.has_active_chords());
        assert_eq!(tables.toggle_state(VK_CAPITAL), Some(ToggleState::Released));

        // Nothing held any more, so a second release is silent.
        out.clear();
        tables.release_all(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_overlaps_reports_shadowing_pairs() {
        let mut table = ChordTable::new();
        table
            .insert(shortcut("LAlt+LShift+D"), RemapTarget::Key(letter('a')))
            .unwrap();
        table
            .insert(shortcut("LAlt+D"), RemapTarget::Key(letter('b')))
            .unwrap();
        table
            .insert(shortcut("LAlt+E"), RemapTarget::Key(letter('c')))
            .unwrap();

        let overlaps = table.overlaps();
        assert_eq!(overlaps.len(), 1);
        assert_eq!(overlaps[0].0.keys(), &[VK_LMENU, letter('d')]);
    }
}
