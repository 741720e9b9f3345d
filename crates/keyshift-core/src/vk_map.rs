use crate::types::Vk;
use std::fmt;

pub const VK_BACK: Vk = Vk(0x08);
pub const VK_TAB: Vk = Vk(0x09);
pub const VK_RETURN: Vk = Vk(0x0D);
pub const VK_SHIFT: Vk = Vk(0x10);
pub const VK_CONTROL: Vk = Vk(0x11);
pub const VK_MENU: Vk = Vk(0x12);
pub const VK_PAUSE: Vk = Vk(0x13);
pub const VK_CAPITAL: Vk = Vk(0x14);
pub const VK_ESCAPE: Vk = Vk(0x1B);
pub const VK_SPACE: Vk = Vk(0x20);
pub const VK_LWIN: Vk = Vk(0x5B);
pub const VK_RWIN: Vk = Vk(0x5C);
pub const VK_NUMLOCK: Vk = Vk(0x90);
pub const VK_SCROLL: Vk = Vk(0x91);
pub const VK_LSHIFT: Vk = Vk(0xA0);
pub const VK_RSHIFT: Vk = Vk(0xA1);
pub const VK_LCONTROL: Vk = Vk(0xA2);
pub const VK_RCONTROL: Vk = Vk(0xA3);
pub const VK_LMENU: Vk = Vk(0xA4);
pub const VK_RMENU: Vk = Vk(0xA5);
pub const VK_OEM_4: Vk = Vk(0xDB);

/// Key code released after a chord teardown. Nothing is mapped to it.
pub const VK_PLACEHOLDER: Vk = Vk(0x00);

/// Letter keys share their ASCII code.
pub const fn letter(c: char) -> Vk {
    Vk(c.to_ascii_uppercase() as u16)
}

/// Modifier family used to reject shortcuts like `LCtrl + RCtrl + A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierClass {
    Ctrl,
    Alt,
    Shift,
    Win,
}

impl fmt::Display for ModifierClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModifierClass::Ctrl => "Ctrl",
            ModifierClass::Alt => "Alt",
            ModifierClass::Shift => "Shift",
            ModifierClass::Win => "Win",
        };
        f.write_str(name)
    }
}

pub fn modifier_class(vk: Vk) -> Option<ModifierClass> {
    match vk {
        VK_CONTROL | VK_LCONTROL | VK_RCONTROL => Some(ModifierClass::Ctrl),
        VK_MENU | VK_LMENU | VK_RMENU => Some(ModifierClass::Alt),
        VK_SHIFT | VK_LSHIFT | VK_RSHIFT => Some(ModifierClass::Shift),
        VK_LWIN | VK_RWIN => Some(ModifierClass::Win),
        _ => None,
    }
}

pub fn is_modifier(vk: Vk) -> bool {
    modifier_class(vk).is_some()
}

/// Side-less modifier codes (`Ctrl`, `Alt`, `Shift`).
pub fn is_generic_modifier(vk: Vk) -> bool {
    matches!(vk, VK_CONTROL | VK_MENU | VK_SHIFT)
}

/// Left and right keys behind a side-less modifier code.
pub fn sides(vk: Vk) -> Option<[Vk; 2]> {
    match vk {
        VK_CONTROL => Some([VK_LCONTROL, VK_RCONTROL]),
        VK_MENU => Some([VK_LMENU, VK_RMENU]),
        VK_SHIFT => Some([VK_LSHIFT, VK_RSHIFT]),
        _ => None,
    }
}

/// Whether a physical key code satisfies a configured one.
/// Generic modifiers accept either side; everything else must be exact.
pub fn key_matches(expected: Vk, actual: Vk) -> bool {
    if expected == actual {
        return true;
    }
    is_generic_modifier(expected) && modifier_class(expected) == modifier_class(actual)
}

/// Keys that need `KEYEVENTF_EXTENDEDKEY` when injected.
pub fn is_extended_key(vk: Vk) -> bool {
    matches!(
        vk.code(),
        0x21..=0x28 // PgUp, PgDn, End, Home, arrows
            | 0x2C..=0x2E // PrintScreen, Insert, Delete
            | 0x5B..=0x5D // Win keys, Apps
            | 0x6F // NumPad /
            | 0x90 // NumLock
            | 0xA3 // RCtrl
            | 0xA5 // RAlt
    )
}

const LETTER_NAMES: [&str; 26] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R",
    "S", "T", "U", "V", "W", "X", "Y", "Z",
];

const DIGIT_NAMES: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];

const FUNCTION_NAMES: [&str; 24] = [
    "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12", "F13", "F14",
    "F15", "F16", "F17", "F18", "F19", "F20", "F21", "F22", "F23", "F24",
];

const NUMPAD_NAMES: [&str; 10] = [
    "NumPad 0", "NumPad 1", "NumPad 2", "NumPad 3", "NumPad 4", "NumPad 5", "NumPad 6",
    "NumPad 7", "NumPad 8", "NumPad 9",
];

/// Fixed display names for keys without a printable character.
pub const SPECIAL_KEY_NAMES: &[(Vk, &str)] = &[
    (Vk(0x03), "Break"),
    (VK_BACK, "Backspace"),
    (VK_TAB, "Tab"),
    (Vk(0x0C), "Clear"),
    (VK_RETURN, "Enter"),
    (VK_SHIFT, "Shift"),
    (VK_CONTROL, "Ctrl"),
    (VK_MENU, "Alt"),
    (VK_PAUSE, "Pause"),
    (VK_CAPITAL, "Caps Lock"),
    (VK_ESCAPE, "Esc"),
    (VK_SPACE, "Space"),
    (Vk(0x21), "PgUp"),
    (Vk(0x22), "PgDn"),
    (Vk(0x23), "End"),
    (Vk(0x24), "Home"),
    (Vk(0x25), "Left"),
    (Vk(0x26), "Up"),
    (Vk(0x27), "Right"),
    (Vk(0x28), "Down"),
    (Vk(0x29), "Select"),
    (Vk(0x2A), "Print"),
    (Vk(0x2B), "Execute"),
    (Vk(0x2C), "Print Screen"),
    (Vk(0x2D), "Insert"),
    (Vk(0x2E), "Delete"),
    (Vk(0x2F), "Help"),
    (VK_LWIN, "LWin"),
    (VK_RWIN, "RWin"),
    (Vk(0x5D), "Menu"),
    (Vk(0x5F), "Sleep"),
    (Vk(0x6A), "NumPad *"),
    (Vk(0x6B), "NumPad +"),
    (Vk(0x6C), "Separator"),
    (Vk(0x6D), "NumPad -"),
    (Vk(0x6E), "NumPad ."),
    (Vk(0x6F), "NumPad /"),
    (VK_NUMLOCK, "Num Lock"),
    (VK_SCROLL, "Scroll Lock"),
    (VK_LSHIFT, "LShift"),
    (VK_RSHIFT, "RShift"),
    (VK_LCONTROL, "LCtrl"),
    (VK_RCONTROL, "RCtrl"),
    (VK_LMENU, "LAlt"),
    (VK_RMENU, "RAlt"),
    (Vk(0xA6), "Browser Back"),
    (Vk(0xA7), "Browser Forward"),
    (Vk(0xA8), "Browser Refresh"),
    (Vk(0xA9), "Browser Stop"),
    (Vk(0xAA), "Browser Search"),
    (Vk(0xAB), "Browser Favorites"),
    (Vk(0xAC), "Browser Home"),
    (Vk(0xAD), "Volume Mute"),
    (Vk(0xAE), "Volume Down"),
    (Vk(0xAF), "Volume Up"),
    (Vk(0xB0), "Next Track"),
    (Vk(0xB1), "Previous Track"),
    (Vk(0xB2), "Stop Media"),
    (Vk(0xB3), "Play/Pause Media"),
    (Vk(0xB4), "Start Mail"),
    (Vk(0xB5), "Select Media"),
    (Vk(0xB6), "Start Application 1"),
    (Vk(0xB7), "Start Application 2"),
    (Vk(0xBA), ";"),
    (Vk(0xBB), "="),
    (Vk(0xBC), ","),
    (Vk(0xBD), "-"),
    (Vk(0xBE), "."),
    (Vk(0xBF), "/"),
    (Vk(0xC0), "`"),
    (VK_OEM_4, "["),
    (Vk(0xDC), "\\"),
    (Vk(0xDD), "]"),
    (Vk(0xDE), "'"),
    (Vk(0xE7), "Packet"),
    (Vk(0xF6), "Attn"),
    (Vk(0xF7), "CrSel"),
    (Vk(0xF8), "ExSel"),
    (Vk(0xF9), "Erase EOF"),
    (Vk(0xFA), "Play"),
    (Vk(0xFB), "Zoom"),
    (Vk(0xFD), "PA1"),
    (Vk(0xFE), "Clear"),
];

/// Extra spellings accepted in configuration.
const KEY_ALIASES: &[(&str, Vk)] = &[
    ("control", VK_CONTROL),
    ("lcontrol", VK_LCONTROL),
    ("rcontrol", VK_RCONTROL),
    ("lmenu", VK_LMENU),
    ("rmenu", VK_RMENU),
    ("win", VK_LWIN),
    ("escape", VK_ESCAPE),
    ("return", VK_RETURN),
    ("capital", VK_CAPITAL),
    ("capslock", VK_CAPITAL),
    ("del", Vk(0x2E)),
    ("ins", Vk(0x2D)),
    ("pageup", Vk(0x21)),
    ("pagedown", Vk(0x22)),
    ("printscreen", Vk(0x2C)),
    ("scrolllock", VK_SCROLL),
    ("numlock", VK_NUMLOCK),
];

pub fn vk_to_key_name(vk: Vk) -> Option<&'static str> {
    let code = vk.code();
    match code {
        0x30..=0x39 => Some(DIGIT_NAMES[(code - 0x30) as usize]),
        0x41..=0x5A => Some(LETTER_NAMES[(code - 0x41) as usize]),
        0x60..=0x69 => Some(NUMPAD_NAMES[(code - 0x60) as usize]),
        0x70..=0x87 => Some(FUNCTION_NAMES[(code - 0x70) as usize]),
        _ => SPECIAL_KEY_NAMES
            .iter()
            .find(|(k, _)| *k == vk)
            .map(|(_, name)| *name),
    }
}

/// Looks up a key by display name, alias, or `0x..` hex code.
/// Case and inner spaces are ignored (`"caps lock"` == `"CapsLock"`).
pub fn key_name_to_vk(name: &str) -> Option<Vk> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return u16::from_str_radix(hex, 16)
            .ok()
            .filter(|code| (1..=0xFE).contains(code))
            .map(Vk);
    }

    let wanted = normalize_name(trimmed);

    if let Some((_, vk)) = KEY_ALIASES.iter().find(|(alias, _)| *alias == wanted) {
        return Some(*vk);
    }

    (1u16..=0xFE)
        .map(Vk)
        .find(|vk| vk_to_key_name(*vk).is_some_and(|n| normalize_name(n) == wanted))
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}
