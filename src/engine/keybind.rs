//! Keybind resolver.

use std::time::Instant;

use crate::binding::{KeySignal, Keycode};
use crate::output::OutputSink;
use crate::platform::ProcessHost;

use super::Engine;

impl<O: OutputSink, P: ProcessHost> Engine<O, P> {
    /// Fires every keybind on `keycode` whose state changes and whose
    /// modifiers are all active. Matches are independent of each other.
    /// Unhandled events pass through with auto-repeat.
    pub(super) fn resolve_keybinds(&mut self, keycode: Keycode, pressed: bool, now: Instant) {
        let mut handled = false;

        for &id in self.bindings.keybinds_for(keycode) {
            if self.keybind_active[id.index()] == pressed {
                continue;
            }
            let keybind = self.bindings.keybind(id);
            if !keybind.modifiers.iter().all(|m| self.modifier_active[m.index()]) {
                continue;
            }

            self.keybind_active[id.index()] = pressed;
            handled = true;
            log::debug!(
                "keybind: {} {}",
                keybind.target,
                if pressed { "pressed" } else { "released" }
            );
            let action =
                if pressed { Some(&keybind.on_press) } else { keybind.on_release.as_ref() };
            if let Some(action) = action {
                self.scheduler.fire(action, now);
            }
        }

        if !handled {
            self.scheduler.emit(KeySignal { keycode, pressed }, true, now);
        }
    }
}
