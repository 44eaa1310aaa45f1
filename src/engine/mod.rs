//! Binding engine.
//!
//! Consumes normalized input events, updates the held-key set and the modifier
//! and keybind activation flags, and fires actions through the [`Scheduler`].
//!
//! Each key or button event runs through two stages:
//!
//! 1. modifier state machine (`modifier.rs`): may consume the event
//! 2. keybind resolver (`keybind.rs`): fires matches or passes the event through
//!
//! Gestures are handled separately (`gesture.rs`). All state lives in
//! [`Engine`]; nothing is global.

mod gesture;
mod keybind;
mod modifier;
mod scheduler;

use std::time::{Duration, Instant};

pub use scheduler::Scheduler;

use gesture::GestureTracker;

use crate::binding::{Bindings, Keycode};
use crate::event_bus::{InputEvent, ReactorEvent};
use crate::held_keys::HeldKeySet;
use crate::output::OutputSink;
use crate::platform::ProcessHost;

/// Tunables the engine needs from the `[general]` config section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub key_interval: Duration,
    pub swipe_threshold: f64,
}

pub struct Engine<O, P> {
    bindings: Bindings,
    held: HeldKeySet,
    modifier_active: Vec<bool>,
    keybind_active: Vec<bool>,
    gesture: GestureTracker,
    scheduler: Scheduler<O, P>,
}

impl<O: OutputSink, P: ProcessHost> Engine<O, P> {
    pub fn new(bindings: Bindings, settings: EngineSettings, output: O, host: P) -> Self {
        Self {
            modifier_active: vec![false; bindings.modifiers().len()],
            keybind_active: vec![false; bindings.keybinds().len()],
            bindings,
            held: HeldKeySet::new(),
            gesture: GestureTracker::new(settings.swipe_threshold),
            scheduler: Scheduler::new(output, host, settings.key_interval),
        }
    }

    pub fn scheduler(&self) -> &Scheduler<O, P> {
        &self.scheduler
    }

    pub fn handle(&mut self, event: ReactorEvent, now: Instant) {
        match event {
            ReactorEvent::Input(input) => self.handle_input(input, now),
            ReactorEvent::ProcessExit(exit) => self.scheduler.on_process_exit(exit),
        }
    }

    pub fn handle_input(&mut self, event: InputEvent, now: Instant) {
        match event {
            InputEvent::Key { keycode, pressed } if keycode.is_keyboard() => {
                self.key_event(keycode, pressed, now)
            }
            InputEvent::Button { keycode, pressed } if !keycode.is_keyboard() => {
                self.key_event(keycode, pressed, now)
            }
            InputEvent::Key { keycode, .. } | InputEvent::Button { keycode, .. } => {
                log::debug!("engine: {keycode} arrived on the wrong event kind, ignored");
            }
            InputEvent::GestureBegin { fingers } => self.gesture_begin(fingers),
            InputEvent::GestureUpdate { dx, dy } => self.gesture_update(dx, dy, now),
            InputEvent::GestureEnd => self.gesture_end(),
            InputEvent::PointerMotion(motion) => self.scheduler.relay_motion(&motion),
        }
    }

    fn key_event(&mut self, keycode: Keycode, pressed: bool, now: Instant) {
        self.held.update(keycode, pressed);
        if self.run_modifiers(keycode, pressed, now) {
            return;
        }
        self.resolve_keybinds(keycode, pressed, now);
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.scheduler.on_tick(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
impl<O, P> Engine<O, P> {
    pub fn held(&self) -> &HeldKeySet {
        &self.held
    }

    pub fn gesture(&self) -> Option<&gesture::GestureState> {
        self.gesture.state()
    }

    pub fn is_modifier_active(&self, name: &str) -> bool {
        self.bindings
            .modifier_id(name)
            .is_some_and(|id| self.modifier_active[id.index()])
    }

    pub fn is_keybind_active(&self, id: crate::binding::KeybindId) -> bool {
        self.keybind_active[id.index()]
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::binding::{Action, BindingsBuilder, KeySignal, Trigger};
    use crate::platform::mock::{RecordingOutput, RecordingProcessHost};

    pub type TestEngine = Engine<RecordingOutput, RecordingProcessHost>;

    pub const LEFT_SHIFT: Keycode = Keycode(42);
    pub const RIGHT_SHIFT: Keycode = Keycode(54);
    pub const LEFT_CTRL: Keycode = Keycode(29);
    pub const A: Keycode = Keycode(30);
    pub const B: Keycode = Keycode(48);
    pub const C: Keycode = Keycode(46);

    pub fn settings() -> EngineSettings {
        EngineSettings { key_interval: Duration::ZERO, swipe_threshold: 50.0 }
    }

    pub fn engine(bindings: Bindings) -> TestEngine {
        Engine::new(
            bindings,
            settings(),
            RecordingOutput::default(),
            RecordingProcessHost::default(),
        )
    }

    pub fn identity(keycode: Keycode) -> Trigger {
        Trigger { keycode, send: Some(keycode) }
    }

    pub fn tap(keycode: Keycode) -> Action {
        Action::key_sequence(vec![KeySignal::press(keycode), KeySignal::release(keycode)])
    }

    pub fn key(engine: &mut TestEngine, keycode: Keycode, pressed: bool) {
        engine.handle_input(InputEvent::Key { keycode, pressed }, Instant::now());
    }

    /// `shift` modifier on both shift keys, plus an empty builder to extend.
    pub fn with_shift() -> (BindingsBuilder, crate::binding::ModifierId) {
        let mut builder = BindingsBuilder::new();
        let shift = builder
            .add_modifier("shift", vec![identity(LEFT_SHIFT), identity(RIGHT_SHIFT)])
            .unwrap();
        (builder, shift)
    }
}
