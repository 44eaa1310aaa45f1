//! Modifier state machine.
//!
//! A modifier is active while any of its trigger keys is held. Trigger events
//! are consumed: the keybind resolver never sees them, and the configured
//! relay key (if any) is emitted in their place without auto-repeat.
//!
//! When a modifier drops from active to inactive, every active keybind that
//! required it is released first, so a chord never outlives its modifiers.

use std::time::Instant;

use crate::binding::{KeySignal, Keycode};
use crate::output::OutputSink;
use crate::platform::ProcessHost;

use super::Engine;

impl<O: OutputSink, P: ProcessHost> Engine<O, P> {
    /// Re-evaluates every modifier after `keycode` changed state. The held set
    /// must already reflect the event. Returns true when the event was a
    /// trigger key and must not reach the keybind resolver.
    pub(super) fn run_modifiers(&mut self, keycode: Keycode, pressed: bool, now: Instant) -> bool {
        let mut consumed = false;

        for (index, modifier) in self.bindings.modifiers().iter().enumerate() {
            let activated = modifier.triggers.iter().any(|t| self.held.contains(t.keycode));

            if let Some(trigger) = modifier.trigger(keycode) {
                consumed = true;
                if let Some(send) = trigger.send {
                    self.scheduler.emit(KeySignal { keycode: send, pressed }, false, now);
                }
            }

            if self.modifier_active[index] && !activated {
                log::debug!("modifier: `{}` released", modifier.name);
                for &dependent in modifier.dependents() {
                    if !self.keybind_active[dependent.index()] {
                        continue;
                    }
                    self.keybind_active[dependent.index()] = false;
                    if let Some(action) = &self.bindings.keybind(dependent).on_release {
                        self.scheduler.fire(action, now);
                    }
                }
            } else if !self.modifier_active[index] && activated {
                log::debug!("modifier: `{}` activated", modifier.name);
            }
            self.modifier_active[index] = activated;
        }

        consumed
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::binding::{Action, BindingsBuilder, KeySignal, Keycode, Trigger};
    use crate::platform::mock::Emitted;

    #[test]
    fn trigger_relays_itself_without_repeat() {
        let (builder, _) = with_shift();
        let mut engine = engine(builder.build());

        key(&mut engine, LEFT_SHIFT, true);

        assert!(engine.is_modifier_active("shift"));
        assert_eq!(
            engine.scheduler().output().emitted,
            vec![Emitted { signal: KeySignal::press(LEFT_SHIFT), auto_repeat: false }]
        );
    }

    #[test]
    fn modifier_stays_active_until_last_trigger_released() {
        let (builder, _) = with_shift();
        let mut engine = engine(builder.build());

        key(&mut engine, LEFT_SHIFT, true);
        key(&mut engine, RIGHT_SHIFT, true);
        key(&mut engine, LEFT_SHIFT, false);
        assert!(engine.is_modifier_active("shift"));

        key(&mut engine, RIGHT_SHIFT, false);
        assert!(!engine.is_modifier_active("shift"));
    }

    #[test]
    fn trigger_can_relay_another_key_or_nothing() {
        let mut builder = BindingsBuilder::new();
        builder
            .add_modifier("caps", vec![Trigger { keycode: Keycode(58), send: Some(LEFT_CTRL) }])
            .unwrap();
        builder
            .add_modifier("silent", vec![Trigger { keycode: Keycode(125), send: None }])
            .unwrap();
        let mut engine = engine(builder.build());

        key(&mut engine, Keycode(58), true);
        key(&mut engine, Keycode(125), true);
        key(&mut engine, Keycode(58), false);

        assert_eq!(
            engine.scheduler().output().signals(),
            vec![KeySignal::press(LEFT_CTRL), KeySignal::release(LEFT_CTRL)]
        );
        assert!(engine.is_modifier_active("silent"));
    }

    #[test]
    fn releasing_modifier_cascades_to_dependent_keybinds() {
        // Arrange: shift+a sends +c on press, -c on release.
        let (mut builder, shift) = with_shift();
        let kb = builder
            .add_keybind(
                A,
                vec![shift],
                Action::key_sequence(vec![KeySignal::press(C)]),
                Some(Action::key_sequence(vec![KeySignal::release(C)])),
            )
            .unwrap();
        let mut engine = engine(builder.build());

        // Act: release shift while a is still down.
        key(&mut engine, LEFT_SHIFT, true);
        key(&mut engine, A, true);
        key(&mut engine, LEFT_SHIFT, false);

        // Assert
        assert!(!engine.is_keybind_active(kb));
        assert_eq!(
            engine.scheduler().output().signals(),
            vec![
                KeySignal::press(LEFT_SHIFT),
                KeySignal::press(C),
                KeySignal::release(LEFT_SHIFT),
                KeySignal::release(C),
            ]
        );

        // The physical release of a is no longer bound and passes through.
        key(&mut engine, A, false);
        assert_eq!(
            engine.scheduler().output().signals().last(),
            Some(&KeySignal::release(A))
        );
    }

    #[test]
    fn cascade_skips_inactive_keybinds() {
        let (mut builder, shift) = with_shift();
        builder.add_keybind(A, vec![shift], tap(B), Some(tap(C))).unwrap();
        let mut engine = engine(builder.build());

        key(&mut engine, LEFT_SHIFT, true);
        key(&mut engine, LEFT_SHIFT, false);

        assert_eq!(
            engine.scheduler().output().signals(),
            vec![KeySignal::press(LEFT_SHIFT), KeySignal::release(LEFT_SHIFT)]
        );
    }
}
