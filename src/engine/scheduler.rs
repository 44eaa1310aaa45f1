//! Action execution: paced key sequences and fire-and-forget commands.
//!
//! With a zero key interval a sequence is emitted in full on the spot. With a
//! positive interval the first signal goes out immediately and the rest follow
//! one per interval, driven by [`Scheduler::on_tick`]. Several sequences can be
//! in flight at once; each advances independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::binding::{Action, KeySignal};
use crate::event_bus::{PointerMotion, ProcessExit};
use crate::output::OutputSink;
use crate::platform::ProcessHost;

/// A key sequence that still has signals left to emit.
#[derive(Debug)]
struct SequenceRun {
    signals: Arc<[KeySignal]>,
    cursor: usize,
    due: Instant,
}

pub struct Scheduler<O, P> {
    output: O,
    host: P,
    key_interval: Duration,
    runs: Vec<SequenceRun>,
    /// Commands started and not yet reaped, by pid.
    commands: HashMap<u32, Arc<str>>,
}

impl<O: OutputSink, P: ProcessHost> Scheduler<O, P> {
    pub fn new(output: O, host: P, key_interval: Duration) -> Self {
        Self {
            output,
            host,
            key_interval,
            runs: Vec::new(),
            commands: HashMap::new(),
        }
    }

    /// Sequences with signals still pending.
    pub fn pending_runs(&self) -> usize {
        self.runs.len()
    }

    /// Commands still running.
    pub fn live_commands(&self) -> impl Iterator<Item = (u32, &str)> {
        self.commands.iter().map(|(pid, cmd)| (*pid, &**cmd))
    }

    pub fn fire(&mut self, action: &Action, now: Instant) {
        match action {
            Action::KeySequence(signals) => self.run_sequence(signals, now),
            Action::Command(command) => self.run_command(command),
        }
    }

    /// Emits a single signal immediately.
    pub fn emit(&mut self, signal: KeySignal, auto_repeat: bool, now: Instant) {
        self.output.emit(signal, auto_repeat, now);
    }

    pub fn relay_motion(&mut self, motion: &PointerMotion) {
        self.output.relay_motion(motion);
    }

    fn run_sequence(&mut self, signals: &Arc<[KeySignal]>, now: Instant) {
        if self.key_interval.is_zero() {
            for &signal in signals.iter() {
                self.output.emit(signal, true, now);
            }
            return;
        }

        let Some(&first) = signals.first() else {
            return;
        };
        self.output.emit(first, true, now);
        if signals.len() > 1 {
            self.runs.push(SequenceRun {
                signals: Arc::clone(signals),
                cursor: 1,
                due: now + self.key_interval,
            });
        }
    }

    fn run_command(&mut self, command: &Arc<str>) {
        match self.host.spawn(command) {
            Ok(pid) => {
                log::debug!("scheduler: started `{command}` as pid {pid}");
                self.commands.insert(pid, Arc::clone(command));
            }
            Err(e) => log::warn!("scheduler: {e}"),
        }
    }

    /// Advances every run that is due and the output's repeat timer.
    pub fn on_tick(&mut self, now: Instant) {
        for run in &mut self.runs {
            if run.due > now {
                continue;
            }
            self.output.emit(run.signals[run.cursor], true, now);
            run.cursor += 1;
            run.due = now + self.key_interval;
        }
        self.runs.retain(|run| run.cursor < run.signals.len());
        self.output.on_tick(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.runs
            .iter()
            .map(|run| run.due)
            .chain(self.output.next_deadline())
            .min()
    }

    /// Forgets a finished command and reports abnormal exits.
    pub fn on_process_exit(&mut self, exit: ProcessExit) {
        let Some(command) = self.commands.remove(&exit.pid) else {
            log::debug!("scheduler: exit for unknown pid {}", exit.pid);
            return;
        };
        if exit.outcome.is_success() {
            log::debug!("scheduler: `{command}` (pid {}) finished", exit.pid);
        } else {
            log::warn!("scheduler: `{command}` (pid {}) ended with {:?}", exit.pid, exit.outcome);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
impl<O, P> Scheduler<O, P> {
    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn host(&self) -> &P {
        &self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Keycode;
    use crate::event_bus::ExitOutcome;
    use crate::platform::mock::{RecordingOutput, RecordingProcessHost};

    const CTRL: Keycode = Keycode(29);
    const C: Keycode = Keycode(46);

    fn copy() -> Action {
        Action::key_sequence(vec![
            KeySignal::press(CTRL),
            KeySignal::press(C),
            KeySignal::release(C),
            KeySignal::release(CTRL),
        ])
    }

    fn scheduler(interval: Duration) -> Scheduler<RecordingOutput, RecordingProcessHost> {
        Scheduler::new(RecordingOutput::default(), RecordingProcessHost::default(), interval)
    }

    #[test]
    fn zero_interval_emits_whole_sequence_synchronously() {
        let mut s = scheduler(Duration::ZERO);

        s.fire(&copy(), Instant::now());

        assert_eq!(s.output().signals(), copy().signals().unwrap());
        assert!(s.output().emitted.iter().all(|e| e.auto_repeat));
        assert_eq!(s.pending_runs(), 0);
        assert_eq!(s.next_deadline(), None);
    }

    #[test]
    fn positive_interval_emits_one_signal_per_tick() {
        // Arrange
        let interval = Duration::from_millis(10);
        let mut s = scheduler(interval);
        let t0 = Instant::now();

        // Act
        s.fire(&copy(), t0);
        let after_fire = s.output().emitted.len();
        s.on_tick(t0 + Duration::from_millis(5));
        let early = s.output().emitted.len();
        for step in 1..=3 {
            s.on_tick(t0 + interval * step);
        }

        // Assert
        assert_eq!(after_fire, 1);
        assert_eq!(early, 1);
        assert_eq!(s.output().signals(), copy().signals().unwrap());
        assert_eq!(s.pending_runs(), 0);
    }

    #[test]
    fn deadline_tracks_earliest_run() {
        let interval = Duration::from_millis(10);
        let mut s = scheduler(interval);
        let t0 = Instant::now();

        s.fire(&copy(), t0);
        s.fire(&copy(), t0 + Duration::from_millis(3));

        assert_eq!(s.pending_runs(), 2);
        assert_eq!(s.next_deadline(), Some(t0 + interval));
    }

    #[test]
    fn single_signal_sequence_leaves_no_run() {
        let mut s = scheduler(Duration::from_millis(10));
        s.fire(&Action::key_sequence(vec![KeySignal::press(C)]), Instant::now());
        assert_eq!(s.output().signals(), vec![KeySignal::press(C)]);
        assert_eq!(s.pending_runs(), 0);
    }

    #[test]
    fn concurrent_runs_interleave() {
        let interval = Duration::from_millis(10);
        let mut s = scheduler(interval);
        let t0 = Instant::now();
        let a = Action::key_sequence(vec![KeySignal::press(CTRL), KeySignal::release(CTRL)]);
        let b = Action::key_sequence(vec![KeySignal::press(C), KeySignal::release(C)]);

        s.fire(&a, t0);
        s.fire(&b, t0);
        s.on_tick(t0 + interval);

        assert_eq!(
            s.output().signals(),
            vec![
                KeySignal::press(CTRL),
                KeySignal::press(C),
                KeySignal::release(CTRL),
                KeySignal::release(C),
            ]
        );
    }

    #[test]
    fn command_is_spawned_and_reaped() {
        let mut s = scheduler(Duration::ZERO);

        s.fire(&Action::command("notify-send hi"), Instant::now());
        assert_eq!(s.host().spawned, vec!["notify-send hi".to_string()]);
        assert_eq!(s.live_commands().collect::<Vec<_>>(), vec![(100, "notify-send hi")]);

        s.on_process_exit(ProcessExit { pid: 100, outcome: ExitOutcome::Exited(1) });
        assert_eq!(s.live_commands().count(), 0);
    }

    #[test]
    fn spawn_failure_is_not_fatal() {
        let mut s = Scheduler::new(
            RecordingOutput::default(),
            RecordingProcessHost { should_fail: true, ..Default::default() },
            Duration::ZERO,
        );

        s.fire(&Action::command("missing-binary"), Instant::now());

        assert_eq!(s.live_commands().count(), 0);
        s.fire(&copy(), Instant::now());
        assert_eq!(s.output().emitted.len(), 4);
    }

    #[test]
    fn exit_for_unknown_pid_is_ignored() {
        let mut s = scheduler(Duration::ZERO);
        s.on_process_exit(ProcessExit { pid: 4242, outcome: ExitOutcome::Exited(0) });
        assert_eq!(s.live_commands().count(), 0);
    }
}
