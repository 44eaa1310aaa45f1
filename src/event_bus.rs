//! Events flowing into the reactor.
//!
//! Capture tasks and child-process watchers run concurrently with the engine
//! and talk to it only through a bounded [`tokio::sync::mpsc`] channel of
//! [`ReactorEvent`]s. The engine itself never blocks on the channel.

use std::process::ExitStatus;

use tokio::sync::mpsc;

use crate::binding::Keycode;

/// Queue depth between producers and the reactor.
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

pub type EventSender = mpsc::Sender<ReactorEvent>;
pub type EventReceiver = mpsc::Receiver<ReactorEvent>;

/// Creates the channel every producer clones its sender from.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::channel(EVENT_QUEUE_CAPACITY)
}

/// Relative pointer motion accumulated over one device report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerMotion {
    pub dx: i32,
    pub dy: i32,
    pub wheel: i32,
    pub hwheel: i32,
}

impl PointerMotion {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A normalized input event from a physical device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Keyboard key transition (code below 256).
    Key { keycode: Keycode, pressed: bool },
    /// Pointer button transition (code 256 and above).
    Button { keycode: Keycode, pressed: bool },
    /// A multi-finger swipe started.
    GestureBegin { fingers: u32 },
    /// Swipe displacement since the previous update, in 1000-DPI units.
    GestureUpdate { dx: f64, dy: f64 },
    GestureEnd,
    /// Motion from a grabbed pointer, forwarded unchanged.
    PointerMotion(PointerMotion),
}

/// How a spawned command finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited(i32),
    Signaled(i32),
    WaitFailed(String),
}

impl ExitOutcome {
    pub fn from_status(status: ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match (status.code(), status.signal()) {
            (Some(code), _) => ExitOutcome::Exited(code),
            (None, Some(signal)) => ExitOutcome::Signaled(signal),
            (None, None) => ExitOutcome::WaitFailed(format!("unrecognized exit status {status}")),
        }
    }

    pub fn is_success(&self) -> bool {
        *self == ExitOutcome::Exited(0)
    }
}

/// Completion notice for a command started by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    pub pid: u32,
    pub outcome: ExitOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReactorEvent {
    Input(InputEvent),
    ProcessExit(ProcessExit),
}
