use serde::{Deserialize, Serialize};
use std::fmt;

/// Windows virtual-key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vk(pub u16);

impl Vk {
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn code(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Vk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match crate::vk_map::vk_to_key_name(*self) {
            Some(name) => f.write_str(name),
            None => write!(f, "VK 0x{:02X}", self.0),
        }
    }
}

/// Key transition as reported by the hook.
/// The `Sys*` variants are what Windows reports while Alt is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEdge {
    Down,
    Up,
    SysDown,
    SysUp,
}

impl KeyEdge {
    pub const fn is_down(self) -> bool {
        matches!(self, KeyEdge::Down | KeyEdge::SysDown)
    }

    pub const fn is_up(self) -> bool {
        !self.is_down()
    }
}

/// Origin marker carried by every event the engine sees or emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventTag {
    /// Physical input, or synthetic input that must look physical.
    #[default]
    Physical,
    /// Stamped with our injection sentinel.
    Injected,
}

/// A single keyboard event delivered by the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub vk: Vk,
    pub edge: KeyEdge,
    pub tag: EventTag,
}

impl KeyEvent {
    pub const fn new(vk: Vk, edge: KeyEdge, tag: EventTag) -> Self {
        Self { vk, edge, tag }
    }

    pub const fn physical(vk: Vk, edge: KeyEdge) -> Self {
        Self::new(vk, edge, EventTag::Physical)
    }

    pub const fn injected(vk: Vk, edge: KeyEdge) -> Self {
        Self::new(vk, edge, EventTag::Injected)
    }

    pub const fn is_down(&self) -> bool {
        self.edge.is_down()
    }

    pub const fn is_up(&self) -> bool {
        self.edge.is_up()
    }

    pub const fn is_injected(&self) -> bool {
        matches!(self.tag, EventTag::Injected)
    }
}

/// Event to be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputEvent {
    pub vk: Vk,
    pub up: bool,
    pub tag: EventTag,
}

impl InputEvent {
    /// Tagged key down.
    pub const fn down(vk: Vk) -> Self {
        Self {
            vk,
            up: false,
            tag: EventTag::Injected,
        }
    }

    /// Tagged key up.
    pub const fn up(vk: Vk) -> Self {
        Self {
            vk,
            up: true,
            tag: EventTag::Injected,
        }
    }

    /// Same event without the sentinel, so the hook sees it as real input.
    pub const fn untagged(self) -> Self {
        Self {
            tag: EventTag::Physical,
            ..self
        }
    }

    /// What the hook reports when this event comes back through the input stream.
    pub const fn as_key_event(self) -> KeyEvent {
        KeyEvent {
            vk: self.vk,
            edge: if self.up { KeyEdge::Up } else { KeyEdge::Down },
            tag: self.tag,
        }
    }
}

/// Action to be taken by the hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Forward the event unchanged.
    Pass,
    /// Suppress the event.
    Block,
    /// Suppress the event and inject this sequence in its place.
    Inject(Vec<InputEvent>),
}

impl KeyAction {
    pub fn is_blocked(&self) -> bool {
        !matches!(self, KeyAction::Pass)
    }
}
