pub mod app_context;
pub mod chord_engine;
pub mod config;
pub mod engine;
pub mod handlers;
pub mod injector;
pub mod key_state;
#[cfg(windows)]
pub mod keyboard_hook;
pub mod recorder;
pub mod shortcut;
pub mod tables;
pub mod types;
pub mod vk_map;

pub use config::{ConfigError, RemapConfig};
pub use engine::Engine;
pub use shortcut::{Shortcut, ShortcutError};
pub use tables::RemapTables;
pub use types::{EventTag, InputEvent, KeyAction, KeyEdge, KeyEvent, Vk};
