//! Recording test doubles for the platform traits.

use std::time::Instant;

use super::{PlatformError, ProcessHost, VirtualOutput};
use crate::binding::{KeySignal, Keycode};
use crate::event_bus::PointerMotion;
use crate::output::OutputSink;

fn injected_failure() -> PlatformError {
    PlatformError::Io(std::io::Error::other("injected failure"))
}

/// Records raw device writes. Fails every write when `should_fail` is set.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    pub keys: Vec<(Keycode, i32)>,
    pub motions: Vec<PointerMotion>,
    pub should_fail: bool,
}

impl VirtualOutput for RecordingWriter {
    fn write_key(&mut self, keycode: Keycode, value: i32) -> Result<(), PlatformError> {
        if self.should_fail {
            return Err(injected_failure());
        }
        self.keys.push((keycode, value));
        Ok(())
    }

    fn write_motion(&mut self, motion: &PointerMotion) -> Result<(), PlatformError> {
        if self.should_fail {
            return Err(injected_failure());
        }
        self.motions.push(*motion);
        Ok(())
    }
}

/// One call to [`OutputSink::emit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emitted {
    pub signal: KeySignal,
    pub auto_repeat: bool,
}

/// Records what the engine asks the output to emit.
#[derive(Debug, Default)]
pub struct RecordingOutput {
    pub emitted: Vec<Emitted>,
    pub motions: Vec<PointerMotion>,
}

impl RecordingOutput {
    /// Emitted signals without the repeat flag.
    pub fn signals(&self) -> Vec<KeySignal> {
        self.emitted.iter().map(|e| e.signal).collect()
    }
}

impl OutputSink for RecordingOutput {
    fn emit(&mut self, signal: KeySignal, auto_repeat: bool, _now: Instant) {
        self.emitted.push(Emitted { signal, auto_repeat });
    }

    fn relay_motion(&mut self, motion: &PointerMotion) {
        self.motions.push(*motion);
    }
}

/// Records spawned commands and hands out sequential pids starting at 100.
#[derive(Debug, Default)]
pub struct RecordingProcessHost {
    pub spawned: Vec<String>,
    pub should_fail: bool,
}

impl ProcessHost for RecordingProcessHost {
    fn spawn(&mut self, command: &str) -> Result<u32, PlatformError> {
        if self.should_fail {
            return Err(PlatformError::Spawn {
                command: command.to_owned(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        self.spawned.push(command.to_owned());
        Ok(99 + self.spawned.len() as u32)
    }
}
