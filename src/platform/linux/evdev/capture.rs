//! Device capture via the Linux evdev interface (/dev/input/event*).
//!
//! `EvdevCapture` implements the `InputCapture` trait. `start()` enumerates
//! keyboards, mice and touchpads under /dev/input/, grabs the keyboards and
//! mice so their events reach applications only through the daemon, then
//! spawns a background thread with a single-threaded tokio runtime. The runtime
//! reads from every device concurrently via `futures::stream::SelectAll` and
//! forwards translated events to the reactor channel.
//!
//! Touchpads are not grabbed: pointer motion and taps keep working normally
//! and the daemon only observes multi-finger swipes.
//!
//! Required permissions: the process user must be a member of the `input` group.
//!   sudo usermod -aG input $USER   (then log out and back in)

use std::thread;
use std::thread::JoinHandle;

use evdev::{AbsoluteAxisType, Device, Key};
use futures::stream::SelectAll;
use futures::StreamExt;
use tokio::sync::oneshot;

use super::translate::{DeviceTranslator, DirectTranslator, SwipeSynthesizer};
use crate::event_bus::{EventSender, ReactorEvent};
use crate::platform::linux::uinput::is_own_device;
use crate::platform::{InputCapture, PlatformError};

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

pub struct EvdevCapture {
    stop_tx: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl EvdevCapture {
    pub fn new() -> Self {
        Self { stop_tx: None, thread: None }
    }
}

impl InputCapture for EvdevCapture {
    fn start(&mut self, events: EventSender) -> Result<(), PlatformError> {
        // Open and grab in the calling thread so errors surface immediately.
        let devices = open_devices()?;

        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);

        let thread = thread::Builder::new()
            .name("keyweave-capture".into())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => rt,
                    Err(e) => {
                        log::error!("capture: failed to build tokio runtime: {e}");
                        return;
                    }
                };
                rt.block_on(capture_loop(devices, events, stop_rx));
            })?;

        self.thread = Some(thread);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlatformError> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
        Ok(())
    }
}

impl Drop for EvdevCapture {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// ---------------------------------------------------------------------------
// Device enumeration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceRole {
    Keyboard,
    Pointer,
    Touchpad,
}

/// A device is a keyboard if it has `KEY_A`, a touchpad if it reports finger
/// tools and absolute position, and a pointer if it has `BTN_LEFT` and
/// relative axes. Everything else is left alone.
fn classify(device: &Device) -> Option<DeviceRole> {
    let keys = device.supported_keys()?;
    if keys.contains(Key::KEY_A) {
        Some(DeviceRole::Keyboard)
    } else if keys.contains(Key::BTN_TOOL_TRIPLETAP)
        && device
            .supported_absolute_axes()
            .is_some_and(|axes| axes.contains(AbsoluteAxisType::ABS_X))
    {
        Some(DeviceRole::Touchpad)
    } else if keys.contains(Key::BTN_LEFT) && device.supported_relative_axes().is_some() {
        Some(DeviceRole::Pointer)
    } else {
        None
    }
}

fn touchpad_translator(device: &Device) -> DeviceTranslator {
    let (res_x, res_y) = match device.get_abs_state() {
        Ok(state) => (
            state[AbsoluteAxisType::ABS_X.0 as usize].resolution,
            state[AbsoluteAxisType::ABS_Y.0 as usize].resolution,
        ),
        Err(e) => {
            log::warn!("capture: cannot read touchpad resolution ({e}), using device units");
            (0, 0)
        }
    };
    DeviceTranslator::Touchpad(SwipeSynthesizer::new(res_x, res_y))
}

/// Opens every relevant device, grabbing keyboards and pointers.
///
/// Returns `Err` when nothing usable is found (commonly because the process
/// user is not in the `input` group; see module-level documentation).
fn open_devices() -> Result<Vec<(Device, DeviceTranslator)>, PlatformError> {
    let mut opened = Vec::new();

    for (path, mut device) in evdev::enumerate() {
        let name = device.name().unwrap_or("unnamed").to_owned();
        if is_own_device(device.input_id()) {
            log::debug!("capture: skipping own device {name:?}");
            continue;
        }
        let Some(role) = classify(&device) else {
            continue;
        };

        let translator = match role {
            DeviceRole::Touchpad => touchpad_translator(&device),
            DeviceRole::Keyboard | DeviceRole::Pointer => {
                if let Err(e) = device.grab() {
                    log::warn!("capture: cannot grab {name:?} at {}: {e}", path.display());
                    continue;
                }
                DeviceTranslator::Direct(DirectTranslator::default())
            }
        };
        log::info!("capture: {role:?} {name:?} at {}", path.display());
        opened.push((device, translator));
    }

    if opened.iter().all(|(_, t)| matches!(t, DeviceTranslator::Touchpad(_))) {
        return Err(PlatformError::Unavailable(
            "No keyboard or mouse devices could be opened in /dev/input/. \
             Ensure this user is in the 'input' group: \
             sudo usermod -aG input $USER (then log out and back in)."
                .into(),
        ));
    }
    Ok(opened)
}

// ---------------------------------------------------------------------------
// Async event loop
// ---------------------------------------------------------------------------

/// Reads from all devices until stopped, every stream ends, or the reactor
/// goes away. A device that errors (e.g. unplugged) is dropped on its own.
async fn capture_loop(
    devices: Vec<(Device, DeviceTranslator)>,
    events: EventSender,
    stop_rx: oneshot::Receiver<()>,
) {
    let mut translators = Vec::with_capacity(devices.len());
    let mut streams = SelectAll::new();
    for (index, (device, translator)) in devices.into_iter().enumerate() {
        translators.push(translator);
        match device.into_event_stream() {
            Ok(stream) => streams.push(
                stream
                    .map(move |result| (index, result))
                    .take_while(|(index, result)| {
                        if let Err(e) = result {
                            log::warn!("capture: device #{index} stopped: {e}");
                        }
                        futures::future::ready(result.is_ok())
                    }),
            ),
            Err(e) => log::warn!("capture: cannot stream device #{index}: {e}"),
        }
    }

    log::info!("capture: evdev capture active on {} device(s)", streams.len());

    let mut batch = Vec::new();
    tokio::select! {
        _ = stop_rx => {
            log::info!("capture: stop signal received");
        }
        _ = async {
            while let Some((index, result)) = streams.next().await {
                let Ok(event) = result else { continue };
                translators[index].translate(event, &mut batch);
                for input in batch.drain(..) {
                    if events.send(ReactorEvent::Input(input)).await.is_err() {
                        log::info!("capture: reactor closed");
                        return;
                    }
                }
            }
            log::info!("capture: all evdev streams ended");
        } => {}
    }
}
