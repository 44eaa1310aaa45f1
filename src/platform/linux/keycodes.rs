//! Linux input event code names.
//!
//! Config files name keys the way `linux/input-event-codes.h` does, lowercased
//! and without the `KEY_` prefix (`leftctrl`, `a`, `f12`, `volumeup`). Pointer
//! buttons use a `mouse:` prefix. A handful of aliases cover names people
//! reach for first (`ctrl`, `super`, `escape`).
//!
//! - `keycode_from_name`: config parsing (case-insensitive, `None` if unknown).
//! - `name_of`: log output (canonical name, never an alias).

use crate::binding::Keycode;

/// Canonical names. The first entry for a code is the one `name_of` returns.
const KEY_NAMES: &[(&str, u16)] = &[
    // Control and editing
    ("esc", 1),
    ("backspace", 14),
    ("tab", 15),
    ("enter", 28),
    ("space", 57),
    ("capslock", 58),
    ("numlock", 69),
    ("scrolllock", 70),
    ("sysrq", 99),
    ("linefeed", 101),
    ("home", 102),
    ("up", 103),
    ("pageup", 104),
    ("left", 105),
    ("right", 106),
    ("end", 107),
    ("down", 108),
    ("pagedown", 109),
    ("insert", 110),
    ("delete", 111),
    ("pause", 119),
    ("compose", 127),
    ("menu", 139),
    // Modifiers
    ("leftctrl", 29),
    ("leftshift", 42),
    ("rightshift", 54),
    ("leftalt", 56),
    ("rightctrl", 97),
    ("rightalt", 100),
    ("leftmeta", 125),
    ("rightmeta", 126),
    // Digits (2..=11 = 1..0)
    ("1", 2),
    ("2", 3),
    ("3", 4),
    ("4", 5),
    ("5", 6),
    ("6", 7),
    ("7", 8),
    ("8", 9),
    ("9", 10),
    ("0", 11),
    // Letters
    ("q", 16),
    ("w", 17),
    ("e", 18),
    ("r", 19),
    ("t", 20),
    ("y", 21),
    ("u", 22),
    ("i", 23),
    ("o", 24),
    ("p", 25),
    ("a", 30),
    ("s", 31),
    ("d", 32),
    ("f", 33),
    ("g", 34),
    ("h", 35),
    ("j", 36),
    ("k", 37),
    ("l", 38),
    ("z", 44),
    ("x", 45),
    ("c", 46),
    ("v", 47),
    ("b", 48),
    ("n", 49),
    ("m", 50),
    // Punctuation
    ("minus", 12),
    ("equal", 13),
    ("leftbrace", 26),
    ("rightbrace", 27),
    ("semicolon", 39),
    ("apostrophe", 40),
    ("grave", 41),
    ("backslash", 43),
    ("comma", 51),
    ("dot", 52),
    ("slash", 53),
    ("102nd", 86),
    // Function keys
    ("f1", 59),
    ("f2", 60),
    ("f3", 61),
    ("f4", 62),
    ("f5", 63),
    ("f6", 64),
    ("f7", 65),
    ("f8", 66),
    ("f9", 67),
    ("f10", 68),
    ("f11", 87),
    ("f12", 88),
    ("f13", 183),
    ("f14", 184),
    ("f15", 185),
    ("f16", 186),
    ("f17", 187),
    ("f18", 188),
    ("f19", 189),
    ("f20", 190),
    ("f21", 191),
    ("f22", 192),
    ("f23", 193),
    ("f24", 194),
    // Keypad
    ("kpasterisk", 55),
    ("kp7", 71),
    ("kp8", 72),
    ("kp9", 73),
    ("kpminus", 74),
    ("kp4", 75),
    ("kp5", 76),
    ("kp6", 77),
    ("kpplus", 78),
    ("kp1", 79),
    ("kp2", 80),
    ("kp3", 81),
    ("kp0", 82),
    ("kpdot", 83),
    ("kpenter", 96),
    ("kpslash", 98),
    ("kpequal", 117),
    ("kpcomma", 121),
    // Media and system
    ("mute", 113),
    ("volumedown", 114),
    ("volumeup", 115),
    ("power", 116),
    ("calc", 140),
    ("sleep", 142),
    ("wakeup", 143),
    ("mail", 155),
    ("back", 158),
    ("forward", 159),
    ("nextsong", 163),
    ("playpause", 164),
    ("previoussong", 165),
    ("stopcd", 166),
    ("homepage", 172),
    ("refresh", 173),
    ("print", 210),
    ("search", 217),
    ("brightnessdown", 224),
    ("brightnessup", 225),
    ("media", 226),
    ("kbdillumtoggle", 228),
    ("kbdillumdown", 229),
    ("kbdillumup", 230),
    ("micmute", 248),
    // Pointer buttons
    ("mouse:left", 0x110),
    ("mouse:right", 0x111),
    ("mouse:middle", 0x112),
    // Thumb buttons report BTN_SIDE and BTN_EXTRA
    ("mouse:backward", 0x113),
    ("mouse:forward", 0x114),
];

/// Alternative spellings accepted in config files.
const ALIASES: &[(&str, u16)] = &[
    ("ctrl", 29),
    ("shift", 42),
    ("alt", 56),
    ("altgr", 100),
    ("super", 125),
    ("meta", 125),
    ("escape", 1),
    ("return", 28),
    ("del", 111),
    ("mouse:back", 0x113),
    ("mouse:side", 0x113),
    ("mouse:extra", 0x114),
];

/// Resolves a config key name to its event code.
pub fn keycode_from_name(name: &str) -> Option<Keycode> {
    let name = name.trim().to_ascii_lowercase();
    let name = name.strip_prefix("key_").unwrap_or(&name);
    KEY_NAMES
        .iter()
        .chain(ALIASES)
        .find(|(candidate, _)| *candidate == name)
        .map(|&(_, code)| Keycode(code))
}

/// Canonical name of `keycode`, or `None` for codes outside the table.
pub fn name_of(keycode: Keycode) -> Option<&'static str> {
    KEY_NAMES
        .iter()
        .find(|&&(_, code)| code == keycode.0)
        .map(|&(name, _)| name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
