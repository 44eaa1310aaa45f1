//! Linux platform backend.
//!
//! Capture: direct evdev (/dev/input/event*) via `EvdevCapture`.
//! Output: two uinput virtual devices via `VirtualDevices`.
//! Commands: `<shell> -c` children via `ShellProcessHost`.
//!
//! Required access: read on /dev/input/event* (the `input` group) and write on
//! /dev/uinput.

mod evdev;
pub mod keycodes;
pub mod process;
pub mod uinput;

use self::evdev::EvdevCapture;
use self::process::ShellProcessHost;
use self::uinput::VirtualDevices;

use crate::event_bus::EventSender;
use crate::platform::{InputCapture, PlatformError};

// ---------------------------------------------------------------------------
// Factory: input capture
// ---------------------------------------------------------------------------

/// Returns the evdev capture backend, not yet started.
pub fn create_input_capture() -> Box<dyn InputCapture> {
    Box::new(EvdevCapture::new())
}

// ---------------------------------------------------------------------------
// Factory: output
// ---------------------------------------------------------------------------

/// Creates the virtual keyboard and pointer.
pub fn create_virtual_devices() -> Result<VirtualDevices, PlatformError> {
    VirtualDevices::create()
}

// ---------------------------------------------------------------------------
// Factory: process host
// ---------------------------------------------------------------------------

pub fn create_process_host(shell: &str, events: EventSender) -> ShellProcessHost {
    ShellProcessHost::new(shell, events)
}
