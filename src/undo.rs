//! Release synthesis for key-sequence actions.
//!
//! A press sequence like `+leftctrl +c` leaves keys down when it finishes.
//! [`residual_releases`] computes the signals that bring everything back up,
//! in reverse order of the presses that are still outstanding.

use crate::binding::{Action, KeySignal, Keycode};

/// Releases for every key left held after replaying `signals` from a clean
/// state. Keys pressed more than once count once; a release clears the key.
pub fn residual_releases(signals: &[KeySignal]) -> Vec<KeySignal> {
    let mut held: Vec<Keycode> = Vec::new();
    for signal in signals {
        if signal.pressed {
            if !held.contains(&signal.keycode) {
                held.push(signal.keycode);
            }
        } else {
            held.retain(|k| *k != signal.keycode);
        }
    }
    held.into_iter().rev().map(KeySignal::release).collect()
}

/// The action that undoes `action`, or `None` when there is nothing to undo.
/// Commands cannot be undone.
pub fn undo_action(action: &Action) -> Option<Action> {
    let releases = residual_releases(action.signals()?);
    if releases.is_empty() {
        None
    } else {
        Some(Action::key_sequence(releases))
    }
}

/// `action` followed by its own undo, so that nothing stays held afterwards.
pub fn self_releasing(action: Action) -> Action {
    match undo_action(&action) {
        Some(Action::KeySequence(releases)) => {
            let mut signals = action.signals().map(<[_]>::to_vec).unwrap_or_default();
            signals.extend(releases.iter().copied());
            Action::key_sequence(signals)
        }
        _ => action,
    }
}
