//! Output sink: what the engine emits goes through here.
//!
//! [`RepeatingOutput`] adds software auto-repeat on top of a [`VirtualOutput`].
//! Physical auto-repeat events are dropped at capture, so a key held through
//! the daemon only repeats if this layer repeats it.

use std::time::{Duration, Instant};

use crate::binding::{KeySignal, Keycode};
use crate::event_bus::PointerMotion;
use crate::platform::VirtualOutput;

pub const KEY_RELEASE: i32 = 0;
pub const KEY_PRESS: i32 = 1;
pub const KEY_REPEAT: i32 = 2;

/// The engine's view of the virtual devices.
pub trait OutputSink {
    /// Emits one signal. `auto_repeat` makes a keyboard press start repeating
    /// until it is released or another repeating press supersedes it.
    fn emit(&mut self, signal: KeySignal, auto_repeat: bool, now: Instant);

    fn relay_motion(&mut self, motion: &PointerMotion);

    /// When [`OutputSink::on_tick`] next has work to do.
    fn next_deadline(&self) -> Option<Instant> {
        None
    }

    fn on_tick(&mut self, _now: Instant) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Repeat {
    keycode: Keycode,
    due: Instant,
}

/// Virtual devices plus the auto-repeat timer. At most one key repeats at a time.
pub struct RepeatingOutput<W: VirtualOutput> {
    writer: W,
    delay: Duration,
    interval: Duration,
    repeat: Option<Repeat>,
}

impl<W: VirtualOutput> RepeatingOutput<W> {
    pub fn new(writer: W, delay: Duration, interval: Duration) -> Self {
        Self { writer, delay, interval, repeat: None }
    }

    #[cfg(test)]
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// The key currently repeating (or waiting out its initial delay).
    pub fn repeating(&self) -> Option<Keycode> {
        self.repeat.map(|r| r.keycode)
    }

    fn write(&mut self, keycode: Keycode, value: i32) {
        if let Err(e) = self.writer.write_key(keycode, value) {
            log::warn!("output: failed to write {keycode} value {value}: {e}");
        }
    }
}

impl<W: VirtualOutput> OutputSink for RepeatingOutput<W> {
    fn emit(&mut self, signal: KeySignal, auto_repeat: bool, now: Instant) {
        let KeySignal { keycode, pressed } = signal;
        self.write(keycode, if pressed { KEY_PRESS } else { KEY_RELEASE });

        if pressed {
            if auto_repeat && keycode.is_keyboard() {
                self.repeat = Some(Repeat { keycode, due: now + self.delay });
            }
        } else if self.repeating() == Some(keycode) {
            self.repeat = None;
        }
    }

    fn relay_motion(&mut self, motion: &PointerMotion) {
        if let Err(e) = self.writer.write_motion(motion) {
            log::warn!("output: failed to write pointer motion: {e}");
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.repeat.map(|r| r.due)
    }

    fn on_tick(&mut self, now: Instant) {
        let Some(repeat) = self.repeat else {
            return;
        };
        if repeat.due > now {
            return;
        }
        self.write(repeat.keycode, KEY_REPEAT);
        self.repeat = Some(Repeat { keycode: repeat.keycode, due: now + self.interval });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
