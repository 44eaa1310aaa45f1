//! Platform abstraction layer.
//!
//! Defines the seams between the engine and the operating system:
//!
//! - [`InputCapture`]: reads physical devices and feeds the reactor channel.
//! - [`VirtualOutput`]: writes key and pointer events to virtual devices.
//! - [`ProcessHost`]: starts shell commands without waiting for them.
//!
//! The Linux implementations live in [`linux`]; test doubles in `mock`.

pub mod linux;
#[cfg(test)]
pub mod mock;

pub use linux::keycodes;

use thiserror::Error;

use crate::binding::Keycode;
use crate::event_bus::{EventSender, PointerMotion};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform unavailable: {0}")]
    Unavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Source of physical input events.
pub trait InputCapture {
    /// Opens the devices and starts forwarding their events to `events`.
    /// Returns once capture is running.
    fn start(&mut self, events: EventSender) -> Result<(), PlatformError>;

    /// Stops forwarding and releases any grabbed devices.
    fn stop(&mut self) -> Result<(), PlatformError>;
}

/// Sink for synthesized device events.
pub trait VirtualOutput {
    /// Writes one key event: 0 release, 1 press, 2 auto-repeat.
    fn write_key(&mut self, keycode: Keycode, value: i32) -> Result<(), PlatformError>;

    fn write_motion(&mut self, motion: &PointerMotion) -> Result<(), PlatformError>;
}

/// Starts commands asynchronously. Completion is reported through the reactor
/// channel as a [`crate::event_bus::ProcessExit`].
pub trait ProcessHost {
    /// Starts `command` and returns the child's pid.
    fn spawn(&mut self, command: &str) -> Result<u32, PlatformError>;
}
