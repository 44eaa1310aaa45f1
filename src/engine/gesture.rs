//! Swipe recognition.
//!
//! [`GestureTracker`] accumulates swipe displacement and reports a [`Step`]
//! every time an axis crosses the threshold. The first crossing commits the
//! gesture to a direction; later crossings along the same axis either continue
//! it (forward) or reverse it (backward). Crossings on the other axis reset
//! the accumulator but fire nothing.

use crate::binding::{Action, Direction, Fingers};
use crate::output::OutputSink;
use crate::platform::ProcessHost;

use super::Engine;

/// Progress of the gesture in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureState {
    pub fingers: u32,
    pub x: f64,
    pub y: f64,
    pub committed: Option<Direction>,
}

/// A threshold crossing that may fire a gesturebind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub fingers: u32,
    /// Direction the gesture first crossed in.
    pub committed: Direction,
    /// Direction of this crossing: `committed` or its opposite.
    pub candidate: Direction,
    /// False only for the crossing that committed the gesture.
    pub repeating: bool,
}

impl Step {
    pub fn is_forward(&self) -> bool {
        self.candidate == self.committed
    }
}

#[derive(Debug)]
pub struct GestureTracker {
    threshold: f64,
    current: Option<GestureState>,
}

impl GestureTracker {
    pub fn new(threshold: f64) -> Self {
        Self { threshold, current: None }
    }

    pub fn state(&self) -> Option<&GestureState> {
        self.current.as_ref()
    }

    /// Starts tracking. A begin while tracking restarts from zero.
    pub fn begin(&mut self, fingers: u32) {
        self.current = Some(GestureState { fingers, x: 0.0, y: 0.0, committed: None });
    }

    pub fn end(&mut self) {
        self.current = None;
    }

    /// Accumulates displacement. Returns a step when the gesture crossed the
    /// threshold along its committed axis (or committed right now).
    pub fn update(&mut self, dx: f64, dy: f64) -> Option<Step> {
        let threshold = self.threshold;
        let state = self.current.as_mut()?;
        state.x += dx;
        state.y += dy;

        let candidate = if state.x.abs() > threshold {
            let direction = if state.x > 0.0 { Direction::Right } else { Direction::Left };
            state.x -= threshold.copysign(state.x);
            direction
        } else if state.y.abs() > threshold {
            let direction = if state.y > 0.0 { Direction::Down } else { Direction::Up };
            state.y -= threshold.copysign(state.y);
            direction
        } else {
            return None;
        };

        match state.committed {
            None => {
                state.committed = Some(candidate);
                Some(Step {
                    fingers: state.fingers,
                    committed: candidate,
                    candidate,
                    repeating: false,
                })
            }
            Some(committed) if candidate == committed || candidate == committed.opposite() => {
                Some(Step { fingers: state.fingers, committed, candidate, repeating: true })
            }
            Some(_) => None,
        }
    }
}

impl<O: OutputSink, P: ProcessHost> Engine<O, P> {
    pub(super) fn gesture_begin(&mut self, fingers: u32) {
        log::debug!("gesture: begin with {fingers} finger(s)");
        self.gesture.begin(fingers);
    }

    pub(super) fn gesture_end(&mut self) {
        if self.gesture.state().is_some() {
            log::debug!("gesture: end");
        }
        self.gesture.end();
    }

    pub(super) fn gesture_update(&mut self, dx: f64, dy: f64, now: std::time::Instant) {
        if !dx.is_finite() || !dy.is_finite() {
            log::debug!("gesture: ignoring non-finite update ({dx}, {dy})");
            return;
        }
        if self.gesture.state().is_none() {
            log::debug!("gesture: update without begin, ignored");
            return;
        }
        let Some(step) = self.gesture.update(dx, dy) else {
            return;
        };
        let Some(fingers) = Fingers::from_count(step.fingers) else {
            return;
        };

        for bind in self.bindings.gesturebinds_for(fingers, step.committed) {
            if step.repeating && !bind.repeat {
                continue;
            }
            let action: Option<&Action> = if step.is_forward() {
                Some(&bind.on_forward)
            } else {
                bind.on_backward.as_ref()
            };
            if let Some(action) = action {
                log::debug!(
                    "gesture: {}-finger swipe {} fired {}",
                    step.fingers,
                    step.committed,
                    if step.is_forward() { "forward" } else { "backward" }
                );
                self.scheduler.fire(action, now);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_does_nothing() {
        let mut tracker = GestureTracker::new(50.0);
        tracker.begin(3);
        assert_eq!(tracker.update(30.0, -40.0), None);
        assert_eq!(tracker.update(20.0, 0.0), None);
        let state = tracker.state().unwrap();
        assert_eq!((state.x, state.y), (50.0, -40.0));
    }

    #[test]
    fn first_crossing_commits_direction() {
        let mut tracker = GestureTracker::new(50.0);
        tracker.begin(3);

        let step = tracker.update(0.0, -60.0).unwrap();

        assert_eq!(step.committed, Direction::Up);
        assert!(step.is_forward());
        assert!(!step.repeating);
        assert_eq!(tracker.state().unwrap().y, -10.0);
    }

    #[test]
    fn horizontal_axis_wins_ties() {
        let mut tracker = GestureTracker::new(50.0);
        tracker.begin(4);

        let step = tracker.update(-70.0, 80.0).unwrap();

        assert_eq!(step.committed, Direction::Left);
        let state = tracker.state().unwrap();
        assert_eq!((state.x, state.y), (-20.0, 80.0));
    }

    #[test]
    fn continuing_and_reversing_are_repeating_steps() {
        let mut tracker = GestureTracker::new(50.0);
        tracker.begin(3);
        tracker.update(0.0, 51.0);

        let forward = tracker.update(0.0, 52.0).unwrap();
        let backward = tracker.update(0.0, -200.0).unwrap();

        assert!(forward.repeating && forward.is_forward());
        assert_eq!(forward.committed, Direction::Down);
        assert!(backward.repeating && !backward.is_forward());
        assert_eq!(backward.candidate, Direction::Up);
    }

    #[test]
    fn orthogonal_crossing_resets_axis_without_firing() {
        let mut tracker = GestureTracker::new(50.0);
        tracker.begin(3);
        tracker.update(0.0, 60.0);

        assert_eq!(tracker.update(75.0, 0.0), None);
        assert_eq!(tracker.state().unwrap().x, 25.0);
        assert_eq!(tracker.state().unwrap().committed, Some(Direction::Down));
    }

    #[test]
    fn update_without_begin_is_ignored() {
        let mut tracker = GestureTracker::new(50.0);
        assert_eq!(tracker.update(500.0, 0.0), None);
        assert!(tracker.state().is_none());
    }

    #[test]
    fn begin_restarts_tracking() {
        let mut tracker = GestureTracker::new(50.0);
        tracker.begin(3);
        tracker.update(60.0, 0.0);

        tracker.begin(4);

        assert_eq!(
            tracker.state(),
            Some(&GestureState { fingers: 4, x: 0.0, y: 0.0, committed: None })
        );
    }

    #[test]
    fn end_clears_state() {
        let mut tracker = GestureTracker::new(50.0);
        tracker.begin(3);
        tracker.end();
        assert!(tracker.state().is_none());
    }
}
