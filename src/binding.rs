//! Binding model: modifiers, keybinds, gesturebinds and the actions they fire.
//!
//! The tables are assembled once at startup through [`BindingsBuilder`], which
//! enforces the load-time invariants, and are read-only afterwards. Runtime
//! activation flags are not stored here; the engine keeps them in its own state,
//! indexed by [`ModifierId`] and [`KeybindId`].
//!
//! Cross references are arena indices rather than pointers:
//!
//! ```text
//! Bindings
//!  ├─ modifiers:  Vec<Modifier>  ──dependents──▶ KeybindId
//!  ├─ keybinds:   Vec<Keybind>   ──modifiers───▶ ModifierId
//!  └─ gesturebinds
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Keys and signals
// ---------------------------------------------------------------------------

/// A Linux input event code identifying a key or a pointer button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Keycode(pub u16);

impl Keycode {
    /// First code of the pointer button range (`BTN_MISC`).
    pub const POINTER_BASE: u16 = 256;

    /// Keyboard keys auto-repeat and route to the virtual keyboard;
    /// everything else is a pointer button.
    pub fn is_keyboard(self) -> bool {
        self.0 < Self::POINTER_BASE
    }
}

impl fmt::Display for Keycode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match crate::platform::keycodes::name_of(*self) {
            Some(name) => write!(f, "{name}({})", self.0),
            None => write!(f, "#{}", self.0),
        }
    }
}

/// One emitted key or button transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySignal {
    pub keycode: Keycode,
    pub pressed: bool,
}

impl KeySignal {
    pub fn press(keycode: Keycode) -> Self {
        Self { keycode, pressed: true }
    }

    pub fn release(keycode: Keycode) -> Self {
        Self { keycode, pressed: false }
    }
}

/// What a binding does when it fires.
///
/// Both payloads are reference counted so that scheduled invocations can hold
/// on to the sequence without borrowing the binding tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Emit these signals in order through the virtual devices.
    KeySequence(Arc<[KeySignal]>),
    /// Run this string through the configured shell.
    Command(Arc<str>),
}

impl Action {
    pub fn key_sequence(signals: Vec<KeySignal>) -> Self {
        Action::KeySequence(signals.into())
    }

    pub fn command(command: impl Into<String>) -> Self {
        Action::Command(command.into().into())
    }

    /// Returns the signals of a key-sequence action.
    pub fn signals(&self) -> Option<&[KeySignal]> {
        match self {
            Action::KeySequence(signals) => Some(signals),
            Action::Command(_) => None,
        }
    }

    fn validate(&self) -> Result<(), BindingError> {
        match self {
            Action::KeySequence(signals) if signals.is_empty() => {
                Err(BindingError::EmptyKeySequence)
            }
            Action::Command(command) if command.trim().is_empty() => {
                Err(BindingError::EmptyCommand)
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Arena ids
// ---------------------------------------------------------------------------

/// Index of a [`Modifier`] inside [`Bindings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModifierId(usize);

impl ModifierId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a [`Keybind`] inside [`Bindings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeybindId(usize);

impl KeybindId {
    pub fn index(self) -> usize {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Modifiers and keybinds
// ---------------------------------------------------------------------------

/// A physical key that activates a modifier, plus what gets relayed for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub keycode: Keycode,
    /// Relayed to the output when the trigger changes state. `None` relays
    /// nothing; `Some(keycode)` equal to the trigger is the identity relay.
    pub send: Option<Keycode>,
}

/// A named set of trigger keys. Activated while any trigger is held.
#[derive(Debug, Clone)]
pub struct Modifier {
    pub name: String,
    pub triggers: Vec<Trigger>,
    dependents: Vec<KeybindId>,
}

impl Modifier {
    /// Looks up the trigger entry for `keycode`, if it belongs to this modifier.
    pub fn trigger(&self, keycode: Keycode) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.keycode == keycode)
    }

    /// Keybinds that require this modifier; released when it deactivates.
    pub fn dependents(&self) -> &[KeybindId] {
        &self.dependents
    }
}

/// A target key plus the modifiers that must all be active for it to fire.
#[derive(Debug, Clone)]
pub struct Keybind {
    pub target: Keycode,
    pub modifiers: Vec<ModifierId>,
    pub on_press: Action,
    pub on_release: Option<Action>,
}

// ---------------------------------------------------------------------------
// Gestures
// ---------------------------------------------------------------------------

/// Swipe direction in screen coordinates (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(format!("unknown direction `{other}` (expected up, down, left or right)")),
        }
    }
}

/// Finger counts a swipe binding can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingers {
    Three,
    Four,
}

impl Fingers {
    pub fn from_count(count: u32) -> Option<Self> {
        match count {
            3 => Some(Fingers::Three),
            4 => Some(Fingers::Four),
            _ => None,
        }
    }

    pub fn count(self) -> u32 {
        match self {
            Fingers::Three => 3,
            Fingers::Four => 4,
        }
    }
}

/// A multi-finger swipe direction mapped to forward/backward actions.
#[derive(Debug, Clone)]
pub struct Gesturebind {
    pub fingers: Fingers,
    pub direction: Direction,
    /// When false, fires at most once per gesture.
    pub repeat: bool,
    pub on_forward: Action,
    pub on_backward: Option<Action>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Invariant violations detected while assembling the binding tables.
#[derive(Debug, Error, PartialEq)]
pub enum BindingError {
    #[error("modifier `{0}` is defined more than once")]
    DuplicateModifier(String),
    #[error("modifier `{0}` has no trigger keys")]
    EmptyModifier(String),
    #[error("key {keycode} already triggers modifier `{owner}`")]
    TriggerAlreadyOwned { keycode: Keycode, owner: String },
    #[error("key {keycode} triggers modifier `{owner}` and cannot be a keybind target")]
    TargetIsTrigger { keycode: Keycode, owner: String },
    #[error("a {}-finger swipe {direction} is already bound", .fingers.count())]
    DuplicateGesture { fingers: Fingers, direction: Direction },
    #[error("key sequence is empty")]
    EmptyKeySequence,
    #[error("command is empty")]
    EmptyCommand,
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// The complete, validated binding tables.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    modifiers: Vec<Modifier>,
    keybinds: Vec<Keybind>,
    gesturebinds: Vec<Gesturebind>,
    keybinds_by_target: HashMap<Keycode, Vec<KeybindId>>,
    trigger_owner: HashMap<Keycode, ModifierId>,
}

impl Bindings {
    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn modifier(&self, id: ModifierId) -> &Modifier {
        &self.modifiers[id.0]
    }

    pub fn modifier_id(&self, name: &str) -> Option<ModifierId> {
        self.modifiers.iter().position(|m| m.name == name).map(ModifierId)
    }

    pub fn keybinds(&self) -> &[Keybind] {
        &self.keybinds
    }

    pub fn keybind(&self, id: KeybindId) -> &Keybind {
        &self.keybinds[id.0]
    }

    /// Keybinds targeting `keycode`, in definition order.
    pub fn keybinds_for(&self, keycode: Keycode) -> &[KeybindId] {
        self.keybinds_by_target
            .get(&keycode)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The modifier that `keycode` triggers, if any.
    pub fn trigger_owner(&self, keycode: Keycode) -> Option<ModifierId> {
        self.trigger_owner.get(&keycode).copied()
    }

    pub fn gesturebinds(&self) -> &[Gesturebind] {
        &self.gesturebinds
    }

    pub fn gesturebinds_for(
        &self,
        fingers: Fingers,
        direction: Direction,
    ) -> impl Iterator<Item = &Gesturebind> {
        self.gesturebinds
            .iter()
            .filter(move |g| g.fingers == fingers && g.direction == direction)
    }
}

/// Assembles [`Bindings`], rejecting anything that breaks the model invariants.
#[derive(Debug, Default)]
pub struct BindingsBuilder {
    bindings: Bindings,
}

impl BindingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modifier_id(&self, name: &str) -> Option<ModifierId> {
        self.bindings.modifier_id(name)
    }

    /// Adds a modifier.
    ///
    /// Pointer-button triggers never relay anything, whatever `send` says.
    ///
    /// # Errors
    ///
    /// Fails when the name is taken, no triggers are given, or a trigger key
    /// already belongs to a modifier or is the target of a keybind.
    pub fn add_modifier(
        &mut self,
        name: &str,
        triggers: Vec<Trigger>,
    ) -> Result<ModifierId, BindingError> {
        if self.bindings.modifier_id(name).is_some() {
            return Err(BindingError::DuplicateModifier(name.to_owned()));
        }
        if triggers.is_empty() {
            return Err(BindingError::EmptyModifier(name.to_owned()));
        }

        let id = ModifierId(self.bindings.modifiers.len());
        let mut claimed: Vec<Keycode> = Vec::with_capacity(triggers.len());
        for trigger in &triggers {
            let owner = self
                .bindings
                .trigger_owner(trigger.keycode)
                .map(|owner| self.bindings.modifier(owner).name.clone())
                .or_else(|| claimed.contains(&trigger.keycode).then(|| name.to_owned()));
            if let Some(owner) = owner {
                return Err(BindingError::TriggerAlreadyOwned { keycode: trigger.keycode, owner });
            }
            if !self.bindings.keybinds_for(trigger.keycode).is_empty() {
                return Err(BindingError::TargetIsTrigger {
                    keycode: trigger.keycode,
                    owner: name.to_owned(),
                });
            }
            claimed.push(trigger.keycode);
        }

        let triggers: Vec<Trigger> = triggers
            .into_iter()
            .map(|t| Trigger {
                keycode: t.keycode,
                send: if t.keycode.is_keyboard() { t.send } else { None },
            })
            .collect();
        for trigger in &triggers {
            self.bindings.trigger_owner.insert(trigger.keycode, id);
        }
        self.bindings.modifiers.push(Modifier {
            name: name.to_owned(),
            triggers,
            dependents: Vec::new(),
        });
        Ok(id)
    }

    /// Adds a keybind and registers it with every modifier it requires.
    ///
    /// # Errors
    ///
    /// Fails when the target is a modifier trigger or an action is empty.
    pub fn add_keybind(
        &mut self,
        target: Keycode,
        modifiers: Vec<ModifierId>,
        on_press: Action,
        on_release: Option<Action>,
    ) -> Result<KeybindId, BindingError> {
        if let Some(owner) = self.bindings.trigger_owner(target) {
            return Err(BindingError::TargetIsTrigger {
                keycode: target,
                owner: self.bindings.modifier(owner).name.clone(),
            });
        }
        on_press.validate()?;
        if let Some(action) = &on_release {
            action.validate()?;
        }

        let mut required = modifiers;
        required.sort_unstable();
        required.dedup();

        let id = KeybindId(self.bindings.keybinds.len());
        for modifier in &required {
            self.bindings.modifiers[modifier.0].dependents.push(id);
        }
        self.bindings.keybinds_by_target.entry(target).or_default().push(id);
        self.bindings.keybinds.push(Keybind {
            target,
            modifiers: required,
            on_press,
            on_release,
        });
        Ok(id)
    }

    /// Adds a gesturebind. Each (fingers, direction) pair can be bound once.
    pub fn add_gesturebind(&mut self, gesturebind: Gesturebind) -> Result<(), BindingError> {
        if self
            .bindings
            .gesturebinds_for(gesturebind.fingers, gesturebind.direction)
            .next()
            .is_some()
        {
            return Err(BindingError::DuplicateGesture {
                fingers: gesturebind.fingers,
                direction: gesturebind.direction,
            });
        }
        gesturebind.on_forward.validate()?;
        if let Some(action) = &gesturebind.on_backward {
            action.validate()?;
        }
        self.bindings.gesturebinds.push(gesturebind);
        Ok(())
    }

    pub fn build(self) -> Bindings {
        self.bindings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
