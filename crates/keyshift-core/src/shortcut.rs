use crate::types::Vk;
use crate::vk_map::{self, ModifierClass};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MIN_SHORTCUT_KEYS: usize = 2;
pub const MAX_SHORTCUT_KEYS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortcutError {
    #[error("shortcut must have at least 2 keys, got {0}")]
    TooShort(usize),
    #[error("shortcut cannot have more than 5 keys, got {0}")]
    TooLong(usize),
    #[error("shortcut must start with a modifier key")]
    MustStartWithModifier,
    #[error("shortcut must contain an action key")]
    MissingActionKey,
    #[error("shortcut cannot have more than one action key")]
    MultipleActionKeys,
    #[error("shortcut cannot contain a repeated modifier ({0})")]
    RepeatedModifier(ModifierClass),
    #[error("invalid key code 0x{0:02X}")]
    InvalidKey(u16),
    #[error("unknown key name `{0}`")]
    UnknownKey(String),
}

/// A validated key combination: 1-4 modifiers of distinct classes followed by
/// exactly one action key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shortcut {
    keys: Vec<Vk>,
}

impl Shortcut {
    pub fn new(keys: Vec<Vk>) -> Result<Self, ShortcutError> {
        if keys.len() < MIN_SHORTCUT_KEYS {
            return Err(ShortcutError::TooShort(keys.len()));
        }
        if keys.len() > MAX_SHORTCUT_KEYS {
            return Err(ShortcutError::TooLong(keys.len()));
        }
        if let Some(bad) = keys
            .iter()
            .find(|k| k.code() == 0 || k.code() > 0xFE)
        {
            return Err(ShortcutError::InvalidKey(bad.code()));
        }

        let (prefix, action) = keys.split_at(keys.len() - 1);
        if !vk_map::is_modifier(prefix[0]) {
            return Err(ShortcutError::MustStartWithModifier);
        }
        if vk_map::is_modifier(action[0]) {
            return Err(ShortcutError::MissingActionKey);
        }

        let mut seen: Vec<ModifierClass> = Vec::with_capacity(prefix.len());
        for key in prefix {
            let class = vk_map::modifier_class(*key).ok_or(ShortcutError::MultipleActionKeys)?;
            if seen.contains(&class) {
                return Err(ShortcutError::RepeatedModifier(class));
            }
            seen.push(class);
        }

        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[Vk] {
        &self.keys
    }

    /// Modifier keys in registration order.
    pub fn prefix(&self) -> &[Vk] {
        &self.keys[..self.keys.len() - 1]
    }

    pub fn action_key(&self) -> Vk {
        self.keys[self.keys.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// True if `self` fires whenever `other` would: same action key and every
    /// prefix key of `self` is satisfied by one of `other`'s.
    pub fn shadows(&self, other: &Shortcut) -> bool {
        if !vk_map::key_matches(self.action_key(), other.action_key()) {
            return false;
        }
        self.prefix()
            .iter()
            .all(|k| other.prefix().iter().any(|o| vk_map::key_matches(*k, *o)))
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

/// Parses `"LAlt+D"` style strings. `+` itself is spelled `=`/`NumPad +` or
/// by hex code.
impl FromStr for Shortcut {
    type Err = ShortcutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let keys = s
            .split('+')
            .map(parse_key)
            .collect::<Result<Vec<_>, _>>()?;
        Shortcut::new(keys)
    }
}

pub fn parse_key(name: &str) -> Result<Vk, ShortcutError> {
    vk_map::key_name_to_vk(name).ok_or_else(|| ShortcutError::UnknownKey(name.trim().to_string()))
}
