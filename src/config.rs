//! Configuration loading.
//!
//! The daemon reads one TOML file at startup:
//!
//! ```toml
//! [general]
//! key_interval = 0.0          # seconds between signals of a key sequence
//! key_repeat_delay = 0.5
//! key_repeat_interval = 0.0333
//! swipe_threshold = 50.0
//! shell = "sh"
//! log_level = "info"
//!
//! [[modifiers]]
//! name = "hyper"
//! keys = [{ key = "capslock", send = false }]
//!
//! [[entries]]
//! key = "h"
//! modifiers = ["hyper"]
//! on_press = ["+left"]        # array: key sequence; string: shell command
//!
//! [[entries]]
//! gesture = "swipe"
//! fingers = 3
//! direction = "up"
//! on_start = "rofi -show run"
//! ```
//!
//! Everything is validated before the engine starts. Errors name the offending
//! location, e.g. `entries[2].on_press[1]`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::binding::{
    Action, BindingError, Bindings, BindingsBuilder, Direction, Fingers, Gesturebind, KeySignal,
    Keycode, Trigger,
};
use crate::engine::EngineSettings;
use crate::platform::keycodes::keycode_from_name;
use crate::undo;

/// Searched in order when no path is given on the command line.
pub const DEFAULT_PATHS: [&str; 2] = ["config.toml", "/etc/keyweave/config.toml"];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file found (tried {tried})")]
    NotFound { tried: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config at {location}: {reason}")]
    Invalid { location: String, reason: String },
    #[error("invalid config at {location}: {source}")]
    Binding {
        location: String,
        #[source]
        source: BindingError,
    },
}

fn invalid(location: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { location: location.into(), reason: reason.into() }
}

// ---------------------------------------------------------------------------
// [general]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    pub key_interval: f64,
    pub key_repeat_delay: f64,
    pub key_repeat_interval: f64,
    pub swipe_threshold: f64,
    pub shell: String,
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            key_interval: 0.0,
            key_repeat_delay: 0.5,
            key_repeat_interval: 1.0 / 30.0,
            swipe_threshold: 50.0,
            shell: "sh".into(),
            log_level: "info".into(),
        }
    }
}

impl GeneralConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let timings = [
            ("general.key_interval", self.key_interval, false),
            ("general.key_repeat_delay", self.key_repeat_delay, false),
            ("general.key_repeat_interval", self.key_repeat_interval, true),
        ];
        for (location, value, positive) in timings {
            let in_range = value.is_finite()
                && value <= MAX_TIMING_SECS
                && (value > 0.0 || (!positive && value == 0.0));
            if !in_range {
                let lower = if positive { "above 0" } else { "at least 0" };
                return Err(invalid(
                    location,
                    format!("expected seconds {lower} and at most {MAX_TIMING_SECS}, got {value}"),
                ));
            }
        }
        if !self.swipe_threshold.is_finite() || self.swipe_threshold <= 0.0 {
            return Err(invalid(
                "general.swipe_threshold",
                format!("expected a positive number, got {}", self.swipe_threshold),
            ));
        }
        if self.shell.trim().is_empty() {
            return Err(invalid("general.shell", "shell must not be empty"));
        }
        Ok(())
    }

    pub fn key_repeat_delay(&self) -> Duration {
        seconds(self.key_repeat_delay)
    }

    pub fn key_repeat_interval(&self) -> Duration {
        seconds(self.key_repeat_interval)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            key_interval: seconds(self.key_interval),
            swipe_threshold: self.swipe_threshold,
        }
    }
}

/// Upper bound for every `[general]` timing, in seconds.
const MAX_TIMING_SECS: f64 = 3600.0;

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.clamp(0.0, MAX_TIMING_SECS)).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Raw file layout
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    general: GeneralConfig,
    #[serde(default)]
    modifiers: Vec<RawModifier>,
    #[serde(default)]
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModifier {
    name: String,
    keys: Vec<RawTrigger>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTrigger {
    key: String,
    send: Option<RawSend>,
}

/// `send = false` relays nothing, `send = true` (the default) relays the
/// trigger itself, `send = "name"` relays another key.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSend {
    Relay(bool),
    Key(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAction {
    Command(String),
    Keys(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    key: Option<String>,
    #[serde(default)]
    modifiers: Vec<String>,
    on_press: Option<RawAction>,
    on_release: Option<RawAction>,

    gesture: Option<String>,
    fingers: Option<i64>,
    direction: Option<String>,
    repeats: Option<bool>,
    on_start: Option<RawAction>,
    on_reverse: Option<RawAction>,
}

// ---------------------------------------------------------------------------
// Loaded config
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Config {
    pub general: GeneralConfig,
    pub bindings: Bindings,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;
        raw.general.validate()?;

        let mut builder = BindingsBuilder::new();
        for (index, modifier) in raw.modifiers.iter().enumerate() {
            add_modifier(&mut builder, index, modifier)?;
        }
        for (index, entry) in raw.entries.iter().enumerate() {
            let location = format!("entries[{index}]");
            match (&entry.key, &entry.gesture) {
                (Some(key), None) => add_keybind(&mut builder, &location, key, entry)?,
                (None, Some(gesture)) => add_gesturebind(&mut builder, &location, gesture, entry)?,
                _ => {
                    let reason = "entry must set exactly one of `key` or `gesture`";
                    return Err(invalid(location, reason));
                }
            }
        }

        Ok(Self { general: raw.general, bindings: builder.build() })
    }
}

/// Picks the config file: `explicit` if given, else the first of
/// [`DEFAULT_PATHS`] that exists.
pub fn locate(explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    DEFAULT_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
        .ok_or_else(|| ConfigError::NotFound { tried: DEFAULT_PATHS.join(", ") })
}

pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let config = Config::from_toml(&text)?;
    log::info!(
        "config: loaded {} modifier(s), {} keybind(s), {} gesturebind(s) from {}",
        config.bindings.modifiers().len(),
        config.bindings.keybinds().len(),
        config.bindings.gesturebinds().len(),
        path.display()
    );
    Ok(config)
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

fn resolve_key(name: &str, location: &str) -> Result<Keycode, ConfigError> {
    keycode_from_name(name).ok_or_else(|| invalid(location, format!("unknown key `{name}`")))
}

/// Parses `+name` (press), `-name` (release) or `name` (press then release).
fn parse_signal(text: &str, location: &str, out: &mut Vec<KeySignal>) -> Result<(), ConfigError> {
    let (name, press, release) = match text.as_bytes().first() {
        Some(b'+') => (&text[1..], true, false),
        Some(b'-') => (&text[1..], false, true),
        _ => (text, true, true),
    };
    if name.is_empty() {
        return Err(invalid(location, format!("malformed key signal `{text}`")));
    }
    let keycode = resolve_key(name, location)?;
    if press {
        out.push(KeySignal::press(keycode));
    }
    if release {
        out.push(KeySignal::release(keycode));
    }
    Ok(())
}

fn parse_action(raw: &RawAction, location: &str) -> Result<Action, ConfigError> {
    match raw {
        RawAction::Command(command) => {
            if command.trim().is_empty() {
                return Err(invalid(location, "command is empty"));
            }
            Ok(Action::command(command.as_str()))
        }
        RawAction::Keys(names) => {
            if names.is_empty() {
                return Err(invalid(location, "key sequence is empty"));
            }
            let mut signals = Vec::with_capacity(names.len() * 2);
            for (index, name) in names.iter().enumerate() {
                parse_signal(name, &format!("{location}[{index}]"), &mut signals)?;
            }
            Ok(Action::key_sequence(signals))
        }
    }
}

fn add_modifier(
    builder: &mut BindingsBuilder,
    index: usize,
    raw: &RawModifier,
) -> Result<(), ConfigError> {
    let location = format!("modifiers[{index}]");
    let mut triggers = Vec::with_capacity(raw.keys.len());
    for (key_index, trigger) in raw.keys.iter().enumerate() {
        let key_location = format!("{location}.keys[{key_index}]");
        let keycode = resolve_key(&trigger.key, &format!("{key_location}.key"))?;
        let send = match &trigger.send {
            None | Some(RawSend::Relay(true)) => Some(keycode),
            Some(RawSend::Relay(false)) => None,
            Some(RawSend::Key(name)) => Some(resolve_key(name, &format!("{key_location}.send"))?),
        };
        triggers.push(Trigger { keycode, send });
    }
    builder
        .add_modifier(&raw.name, triggers)
        .map(|_| ())
        .map_err(|source| ConfigError::Binding { location, source })
}

fn add_keybind(
    builder: &mut BindingsBuilder,
    location: &str,
    key: &str,
    raw: &RawEntry,
) -> Result<(), ConfigError> {
    let gesture_fields = [
        ("fingers", raw.fingers.is_some()),
        ("direction", raw.direction.is_some()),
        ("repeats", raw.repeats.is_some()),
        ("on_start", raw.on_start.is_some()),
        ("on_reverse", raw.on_reverse.is_some()),
    ];
    if let Some((field, _)) = gesture_fields.iter().find(|(_, set)| *set) {
        return Err(invalid(location, format!("`{field}` is only valid for gesture entries")));
    }

    let target = resolve_key(key, &format!("{location}.key"))?;
    let mut modifiers = Vec::with_capacity(raw.modifiers.len());
    for (index, name) in raw.modifiers.iter().enumerate() {
        let id = builder.modifier_id(name).ok_or_else(|| {
            invalid(format!("{location}.modifiers[{index}]"), format!("unknown modifier `{name}`"))
        })?;
        modifiers.push(id);
    }

    let on_press = raw
        .on_press
        .as_ref()
        .ok_or_else(|| invalid(location, "key entry needs `on_press`"))?;
    let on_press = parse_action(on_press, &format!("{location}.on_press"))?;
    let on_release = match &raw.on_release {
        Some(action) => Some(parse_action(action, &format!("{location}.on_release"))?),
        None => undo::undo_action(&on_press),
    };

    builder
        .add_keybind(target, modifiers, on_press, on_release)
        .map(|_| ())
        .map_err(|source| ConfigError::Binding { location: location.to_owned(), source })
}

fn add_gesturebind(
    builder: &mut BindingsBuilder,
    location: &str,
    gesture: &str,
    raw: &RawEntry,
) -> Result<(), ConfigError> {
    let key_fields = [
        ("modifiers", !raw.modifiers.is_empty()),
        ("on_press", raw.on_press.is_some()),
        ("on_release", raw.on_release.is_some()),
    ];
    if let Some((field, _)) = key_fields.iter().find(|(_, set)| *set) {
        return Err(invalid(location, format!("`{field}` is only valid for key entries")));
    }

    match gesture {
        "swipe" => {}
        "pinch" => {
            return Err(invalid(format!("{location}.gesture"), "pinch gestures are not supported"));
        }
        other => {
            let reason = format!("unknown gesture `{other}`");
            return Err(invalid(format!("{location}.gesture"), reason));
        }
    }

    let fingers = raw
        .fingers
        .ok_or_else(|| invalid(location, "gesture entry needs `fingers`"))?;
    let fingers = u32::try_from(fingers)
        .ok()
        .and_then(Fingers::from_count)
        .ok_or_else(|| {
            invalid(format!("{location}.fingers"), format!("expected 3 or 4, got {fingers}"))
        })?;
    let direction: Direction = raw
        .direction
        .as_deref()
        .ok_or_else(|| invalid(location, "gesture entry needs `direction`"))?
        .parse()
        .map_err(|reason: String| invalid(format!("{location}.direction"), reason))?;

    let on_start = raw
        .on_start
        .as_ref()
        .ok_or_else(|| invalid(location, "gesture entry needs `on_start`"))?;
    let on_start = parse_action(on_start, &format!("{location}.on_start"))?;

    // No reverse action: a key sequence is tapped.
    let (on_forward, on_backward) = match &raw.on_reverse {
        Some(action) => (on_start, Some(parse_action(action, &format!("{location}.on_reverse"))?)),
        None => (undo::self_releasing(on_start), None),
    };

    builder
        .add_gesturebind(Gesturebind {
            fingers,
            direction,
            repeat: raw.repeats.unwrap_or(false),
            on_forward,
            on_backward,
        })
        .map_err(|source| ConfigError::Binding { location: location.to_owned(), source })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
