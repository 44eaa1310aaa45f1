//! Physically held keys and buttons, as seen by the daemon.

use crate::binding::Keycode;

/// Maximum number of simultaneously tracked keys. Further presses are dropped
/// from the set (the events themselves are still processed).
pub const HELD_KEYS_CAPACITY: usize = 16;

/// Bounded set of held keycodes in press order. Each code appears at most once.
#[derive(Debug, Clone)]
pub struct HeldKeySet {
    keys: Vec<Keycode>,
}

impl Default for HeldKeySet {
    fn default() -> Self {
        Self::new()
    }
}

impl HeldKeySet {
    pub fn new() -> Self {
        Self { keys: Vec::with_capacity(HELD_KEYS_CAPACITY) }
    }

    pub fn contains(&self, keycode: Keycode) -> bool {
        self.keys.contains(&keycode)
    }

    /// Returns false when the key was already held or the set is full.
    pub fn insert(&mut self, keycode: Keycode) -> bool {
        if self.contains(keycode) {
            return false;
        }
        if self.keys.len() >= HELD_KEYS_CAPACITY {
            log::warn!("held_keys: more than {HELD_KEYS_CAPACITY} keys held, ignoring {keycode}");
            return false;
        }
        self.keys.push(keycode);
        true
    }

    pub fn remove(&mut self, keycode: Keycode) -> bool {
        let before = self.keys.len();
        self.keys.retain(|k| *k != keycode);
        self.keys.len() != before
    }

    /// Applies one transition.
    pub fn update(&mut self, keycode: Keycode, pressed: bool) {
        if pressed {
            self.insert(keycode);
        } else {
            self.remove(keycode);
        }
    }

}

#[cfg(test)]
impl HeldKeySet {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Keycode> + '_ {
        self.keys.iter().copied()
    }
}
