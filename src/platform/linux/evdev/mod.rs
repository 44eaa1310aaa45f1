//! evdev input capture and event translation.

mod capture;
mod translate;

pub use capture::EvdevCapture;
