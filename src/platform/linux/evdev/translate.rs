//! Per-device translation from raw evdev events to [`InputEvent`]s.
//!
//! Keyboards and pointers map one-to-one, except that relative motion is
//! accumulated until `SYN_REPORT` so a diagonal move stays one report.
//! Touchpads are read without a grab and only contribute swipes: three or four
//! fingers down begins a gesture, position changes become updates scaled to
//! 1000-DPI units, and any change in finger count ends it.

use evdev::{AbsoluteAxisType, InputEventKind, Key, RelativeAxisType, Synchronization};

use crate::binding::Keycode;
use crate::event_bus::{InputEvent, PointerMotion};

const MM_PER_INCH: f64 = 25.4;
const NORMALIZED_DPI: f64 = 1000.0;

/// Finger count reported by each `BTN_TOOL_*` key.
const TOOL_FINGERS: [(Key, u32); 5] = [
    (Key::BTN_TOOL_FINGER, 1),
    (Key::BTN_TOOL_DOUBLETAP, 2),
    (Key::BTN_TOOL_TRIPLETAP, 3),
    (Key::BTN_TOOL_QUADTAP, 4),
    (Key::BTN_TOOL_QUINTTAP, 5),
];

const MIN_SWIPE_FINGERS: u32 = 3;
const MAX_SWIPE_FINGERS: u32 = 4;

pub enum DeviceTranslator {
    /// Grabbed keyboard or mouse.
    Direct(DirectTranslator),
    /// Ungrabbed touchpad.
    Touchpad(SwipeSynthesizer),
}

impl DeviceTranslator {
    pub fn translate(&mut self, event: evdev::InputEvent, out: &mut Vec<InputEvent>) {
        match self {
            DeviceTranslator::Direct(t) => t.translate(event, out),
            DeviceTranslator::Touchpad(t) => t.translate(event, out),
        }
    }
}

// ---------------------------------------------------------------------------
// Keyboards and pointers
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct DirectTranslator {
    motion: PointerMotion,
}

impl DirectTranslator {
    pub fn translate(&mut self, event: evdev::InputEvent, out: &mut Vec<InputEvent>) {
        match event.kind() {
            InputEventKind::Key(key) => {
                // Kernel auto-repeat (2) is dropped; output repeats in software.
                let pressed = match event.value() {
                    1 => true,
                    0 => false,
                    _ => return,
                };
                let keycode = Keycode(key.code());
                out.push(if keycode.is_keyboard() {
                    InputEvent::Key { keycode, pressed }
                } else {
                    InputEvent::Button { keycode, pressed }
                });
            }
            InputEventKind::RelAxis(axis) => match axis {
                RelativeAxisType::REL_X => self.motion.dx += event.value(),
                RelativeAxisType::REL_Y => self.motion.dy += event.value(),
                RelativeAxisType::REL_WHEEL => self.motion.wheel += event.value(),
                RelativeAxisType::REL_HWHEEL => self.motion.hwheel += event.value(),
                _ => {}
            },
            InputEventKind::Synchronization(Synchronization::SYN_REPORT) => {
                if !self.motion.is_empty() {
                    out.push(InputEvent::PointerMotion(std::mem::take(&mut self.motion)));
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Touchpads
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SwipeSynthesizer {
    /// Device units to 1000-DPI units, per axis.
    scale_x: f64,
    scale_y: f64,
    fingers: u32,
    x: Option<i32>,
    y: Option<i32>,
    swipe: Option<Swipe>,
}

#[derive(Debug, Clone, Copy)]
struct Swipe {
    fingers: u32,
    x: i32,
    y: i32,
}

impl SwipeSynthesizer {
    /// `resolution_*` is the axis resolution in units per millimetre; zero
    /// (unknown) leaves device units unscaled.
    pub fn new(resolution_x: i32, resolution_y: i32) -> Self {
        Self {
            scale_x: scale_for(resolution_x),
            scale_y: scale_for(resolution_y),
            fingers: 0,
            x: None,
            y: None,
            swipe: None,
        }
    }

    pub fn translate(&mut self, event: evdev::InputEvent, out: &mut Vec<InputEvent>) {
        match event.kind() {
            InputEventKind::Key(key) => {
                let Some(&(_, count)) = TOOL_FINGERS.iter().find(|(tool, _)| *tool == key) else {
                    return;
                };
                match event.value() {
                    1 => self.fingers = count,
                    0 if self.fingers == count => self.fingers = 0,
                    _ => {}
                }
            }
            InputEventKind::AbsAxis(AbsoluteAxisType::ABS_X) => self.x = Some(event.value()),
            InputEventKind::AbsAxis(AbsoluteAxisType::ABS_Y) => self.y = Some(event.value()),
            InputEventKind::Synchronization(Synchronization::SYN_REPORT) => self.sync(out),
            _ => {}
        }
    }

    fn sync(&mut self, out: &mut Vec<InputEvent>) {
        if let Some(swipe) = self.swipe {
            if swipe.fingers != self.fingers {
                self.swipe = None;
                out.push(InputEvent::GestureEnd);
            }
        }

        let (Some(x), Some(y)) = (self.x, self.y) else {
            return;
        };
        if let Some(swipe) = self.swipe.as_mut() {
            if (swipe.x, swipe.y) != (x, y) {
                let dx = f64::from(x - swipe.x) * self.scale_x;
                let dy = f64::from(y - swipe.y) * self.scale_y;
                swipe.x = x;
                swipe.y = y;
                out.push(InputEvent::GestureUpdate { dx, dy });
            }
        } else if (MIN_SWIPE_FINGERS..=MAX_SWIPE_FINGERS).contains(&self.fingers) {
            self.swipe = Some(Swipe { fingers: self.fingers, x, y });
            out.push(InputEvent::GestureBegin { fingers: self.fingers });
        }
    }
}

fn scale_for(resolution: i32) -> f64 {
    if resolution > 0 {
        NORMALIZED_DPI / MM_PER_INCH / f64::from(resolution)
    } else {
        1.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::EventType;

    fn key(key: Key, value: i32) -> evdev::InputEvent {
        evdev::InputEvent::new(EventType::KEY, key.code(), value)
    }

    fn rel(axis: RelativeAxisType, value: i32) -> evdev::InputEvent {
        evdev::InputEvent::new(EventType::RELATIVE, axis.0, value)
    }

    fn abs(axis: AbsoluteAxisType, value: i32) -> evdev::InputEvent {
        evdev::InputEvent::new(EventType::ABSOLUTE, axis.0, value)
    }

    fn syn() -> evdev::InputEvent {
        evdev::InputEvent::new(EventType::SYNCHRONIZATION, Synchronization::SYN_REPORT.0, 0)
    }

    fn run(translator: &mut DeviceTranslator, events: &[evdev::InputEvent]) -> Vec<InputEvent> {
        let mut out = Vec::new();
        for &event in events {
            translator.translate(event, &mut out);
        }
        out
    }

    #[test]
    fn keys_and_buttons_are_split_and_repeats_dropped() {
        let mut t = DeviceTranslator::Direct(DirectTranslator::default());

        let out = run(
            &mut t,
            &[key(Key::KEY_A, 1), key(Key::KEY_A, 2), key(Key::KEY_A, 0), key(Key::BTN_LEFT, 1)],
        );

        assert_eq!(
            out,
            vec![
                InputEvent::Key { keycode: Keycode(30), pressed: true },
                InputEvent::Key { keycode: Keycode(30), pressed: false },
                InputEvent::Button { keycode: Keycode(0x110), pressed: true },
            ]
        );
    }

    #[test]
    fn motion_is_batched_per_report() {
        let mut t = DeviceTranslator::Direct(DirectTranslator::default());

        let out = run(
            &mut t,
            &[
                rel(RelativeAxisType::REL_X, 3),
                rel(RelativeAxisType::REL_Y, -2),
                syn(),
                syn(),
                rel(RelativeAxisType::REL_WHEEL, 1),
                syn(),
            ],
        );

        assert_eq!(
            out,
            vec![
                InputEvent::PointerMotion(PointerMotion { dx: 3, dy: -2, ..Default::default() }),
                InputEvent::PointerMotion(PointerMotion { wheel: 1, ..Default::default() }),
            ]
        );
    }

    #[test]
    fn three_finger_drag_becomes_a_swipe() {
        // Unknown resolution: device units pass through unscaled.
        let mut t = DeviceTranslator::Touchpad(SwipeSynthesizer::new(0, 0));

        let out = run(
            &mut t,
            &[
                key(Key::BTN_TOOL_TRIPLETAP, 1),
                abs(AbsoluteAxisType::ABS_X, 100),
                abs(AbsoluteAxisType::ABS_Y, 200),
                syn(),
                abs(AbsoluteAxisType::ABS_Y, 150),
                syn(),
                key(Key::BTN_TOOL_TRIPLETAP, 0),
                syn(),
            ],
        );

        assert_eq!(
            out,
            vec![
                InputEvent::GestureBegin { fingers: 3 },
                InputEvent::GestureUpdate { dx: 0.0, dy: -50.0 },
                InputEvent::GestureEnd,
            ]
        );
    }

    #[test]
    fn finger_count_change_restarts_swipe() {
        let mut t = DeviceTranslator::Touchpad(SwipeSynthesizer::new(0, 0));

        let out = run(
            &mut t,
            &[
                key(Key::BTN_TOOL_TRIPLETAP, 1),
                abs(AbsoluteAxisType::ABS_X, 10),
                abs(AbsoluteAxisType::ABS_Y, 10),
                syn(),
                key(Key::BTN_TOOL_TRIPLETAP, 0),
                key(Key::BTN_TOOL_QUADTAP, 1),
                syn(),
            ],
        );

        assert_eq!(
            out,
            vec![
                InputEvent::GestureBegin { fingers: 3 },
                InputEvent::GestureEnd,
                InputEvent::GestureBegin { fingers: 4 },
            ]
        );
    }

    #[test]
    fn one_and_two_finger_contact_is_ignored() {
        let mut t = DeviceTranslator::Touchpad(SwipeSynthesizer::new(0, 0));

        let out = run(
            &mut t,
            &[
                key(Key::BTN_TOOL_FINGER, 1),
                abs(AbsoluteAxisType::ABS_X, 10),
                abs(AbsoluteAxisType::ABS_Y, 10),
                syn(),
                key(Key::BTN_TOOL_FINGER, 0),
                key(Key::BTN_TOOL_DOUBLETAP, 1),
                abs(AbsoluteAxisType::ABS_X, 90),
                syn(),
            ],
        );

        assert!(out.is_empty());
    }

    #[test]
    fn resolution_scales_to_normalized_units() {
        let mut synth = SwipeSynthesizer::new(20, 40);
        let mut out = Vec::new();

        for event in [
            key(Key::BTN_TOOL_QUADTAP, 1),
            abs(AbsoluteAxisType::ABS_X, 0),
            abs(AbsoluteAxisType::ABS_Y, 0),
            syn(),
            abs(AbsoluteAxisType::ABS_X, 20),
            abs(AbsoluteAxisType::ABS_Y, 40),
            syn(),
        ] {
            synth.translate(event, &mut out);
        }

        // One millimetre on each axis.
        let InputEvent::GestureUpdate { dx, dy } = out[1] else {
            panic!("expected an update, got {:?}", out[1]);
        };
        let mm = NORMALIZED_DPI / MM_PER_INCH;
        assert!((dx - mm).abs() < 1e-9);
        assert!((dy - mm).abs() < 1e-9);
    }
}
