use crate::app_context::normalize_app_identity;
use crate::shortcut::{self, Shortcut, ShortcutError};
use crate::tables::{ChordTable, KeyTarget, RemapTables, RemapTarget};
use crate::types::Vk;
use crate::vk_map::{VK_CAPITAL, VK_LCONTROL, VK_LMENU, VK_LWIN, VK_OEM_4};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Target spelling that swallows a key.
pub const DISABLED_TARGET: &str = "Disabled";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{context}: {source}")]
    Shortcut {
        context: String,
        #[source]
        source: ShortcutError,
    },
    #[error("empty target for `{0}`")]
    EmptyTarget(String),
    #[error("duplicate trigger `{0}`")]
    DuplicateTrigger(String),
    #[error("`{0}` is remapped more than once")]
    DuplicateSource(String),
    #[error("application name is empty")]
    EmptyAppName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleKeyRemap {
    pub from: String,
    /// Key name, or `"Disabled"`.
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutRemap {
    pub trigger: String,
    /// A shortcut (`"LCtrl+V"`) or a single key (`"F13"`).
    pub target: String,
}

/// User-facing remap settings, written with key names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemapConfig {
    pub single_key_remaps: Vec<SingleKeyRemap>,
    pub toggle_to_modifier: Vec<String>,
    pub os_shortcuts: Vec<ShortcutRemap>,
    /// Keyed by executable name, e.g. `"notepad.exe"`.
    pub app_shortcuts: BTreeMap<String, Vec<ShortcutRemap>>,
}

impl RemapConfig {
    /// The remaps the module ships with.
    pub fn sample() -> Self {
        let sc = |trigger: &[Vk], target: &[Vk]| ShortcutRemap {
            trigger: join_keys(trigger),
            target: join_keys(target),
        };
        Self {
            single_key_remaps: vec![SingleKeyRemap {
                from: VK_OEM_4.to_string(),
                to: DISABLED_TARGET.to_string(),
            }],
            toggle_to_modifier: vec![VK_CAPITAL.to_string()],
            os_shortcuts: vec![
                sc(&[VK_LMENU, Vk(0x44)], &[VK_LCONTROL, Vk(0x56)]),
                sc(&[VK_LMENU, Vk(0x45)], &[VK_LCONTROL, Vk(0x58)]),
                sc(&[VK_LWIN, Vk(0x46)], &[VK_LWIN, Vk(0x53)]),
            ],
            app_shortcuts: BTreeMap::new(),
        }
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("invalid remap config")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_json(&text).with_context(|| path.display().to_string())?;
        info!("Loaded remap config from {}", path.display());
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validates every entry and builds the tables the engine runs on.
    pub fn build(&self) -> Result<RemapTables, ConfigError> {
        let mut tables = RemapTables::new();

        for remap in &self.single_key_remaps {
            let from = parse_key(&remap.from, "single-key source")?;
            let to = parse_key_target(&remap.from, &remap.to)?;
            tables.add_single_key(from, to)?;
        }

        for name in &self.toggle_to_modifier {
            tables.add_toggle(parse_key(name, "toggle key")?)?;
        }

        for remap in &self.os_shortcuts {
            let (trigger, target) = parse_shortcut_remap(remap)?;
            tables.insert_os_chord(trigger, target)?;
        }

        for (app, remaps) in &self.app_shortcuts {
            let app = normalize_app_identity(app);
            if app.is_empty() {
                return Err(ConfigError::EmptyAppName);
            }
            for remap in remaps {
                let (trigger, target) = parse_shortcut_remap(remap)?;
                tables.insert_app_chord(&app, trigger, target)?;
            }
        }

        warn_overlaps("os", tables.os_chords());
        for app in tables.app_identities() {
            if let Some(table) = tables.app_chords(app) {
                warn_overlaps(app, table);
            }
        }

        debug!(
            "Built tables: {} single-key, {} toggle, {} os shortcuts, {} apps",
            tables.single_key_count(),
            tables.toggle_count(),
            tables.os_chords().len(),
            self.app_shortcuts.len()
        );
        Ok(tables)
    }
}

fn join_keys(keys: &[Vk]) -> String {
    keys.iter()
        .map(Vk::to_string)
        .collect::<Vec<_>>()
        .join("+")
}

fn parse_key(name: &str, context: &str) -> Result<Vk, ConfigError> {
    shortcut::parse_key(name).map_err(|source| ConfigError::Shortcut {
        context: context.to_string(),
        source,
    })
}

fn parse_key_target(from: &str, to: &str) -> Result<KeyTarget, ConfigError> {
    let to = to.trim();
    if to.is_empty() {
        return Err(ConfigError::EmptyTarget(from.to_string()));
    }
    if to.eq_ignore_ascii_case(DISABLED_TARGET) {
        return Ok(KeyTarget::Disabled);
    }
    parse_key(to, from).map(KeyTarget::Key)
}

fn parse_shortcut_remap(remap: &ShortcutRemap) -> Result<(Shortcut, RemapTarget), ConfigError> {
    let trigger: Shortcut = remap.trigger.parse().map_err(|source| ConfigError::Shortcut {
        context: format!("trigger `{}`", remap.trigger),
        source,
    })?;

    let target = remap.target.trim();
    if target.is_empty() {
        return Err(ConfigError::EmptyTarget(remap.trigger.clone()));
    }
    let context = || format!("target of `{}`", remap.trigger);
    let target = if target.contains('+') {
        RemapTarget::Shortcut(target.parse().map_err(|source| ConfigError::Shortcut {
            context: context(),
            source,
        })?)
    } else {
        RemapTarget::Key(parse_key(target, &context())?)
    };
    Ok((trigger, target))
}

fn warn_overlaps(scope: &str, table: &ChordTable) {
    for (short, long) in table.overlaps() {
        warn!(
            "[{}] `{}` shadows `{}`; the first entry wins",
            scope, short, long
        );
    }
}
