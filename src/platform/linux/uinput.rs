//! Virtual output devices via /dev/uinput.
//!
//! Two devices are created: a keyboard carrying every key code from `KEY_ESC`
//! to `KEY_MICMUTE`, and a pointer with the five standard buttons plus X/Y
//! motion and both wheels. Both use [`VIRTUAL_VENDOR_ID`] so capture can
//! recognize and skip them.
//!
//! Required permissions: write access to /dev/uinput.

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, BusType, EventType, InputEvent, InputId, Key, RelativeAxisType};

use crate::binding::Keycode;
use crate::event_bus::PointerMotion;
use crate::platform::{PlatformError, VirtualOutput};

pub const VIRTUAL_VENDOR_ID: u16 = 0x4b57;
pub const VIRTUAL_KEYBOARD_PRODUCT_ID: u16 = 0x0001;
pub const VIRTUAL_POINTER_PRODUCT_ID: u16 = 0x0002;

const KEYBOARD_NAME: &str = "keyweave virtual keyboard";
const POINTER_NAME: &str = "keyweave virtual pointer";

const FIRST_KEY: u16 = 1; // KEY_ESC
const LAST_KEY: u16 = 248; // KEY_MICMUTE

const POINTER_BUTTONS: [Key; 5] = [
    Key::BTN_LEFT,
    Key::BTN_RIGHT,
    Key::BTN_MIDDLE,
    Key::BTN_SIDE,
    Key::BTN_EXTRA,
];

/// True for devices created by [`VirtualDevices::create`].
pub fn is_own_device(id: InputId) -> bool {
    id.vendor() == VIRTUAL_VENDOR_ID
        && matches!(id.product(), VIRTUAL_KEYBOARD_PRODUCT_ID | VIRTUAL_POINTER_PRODUCT_ID)
}

fn virtual_id(product: u16) -> InputId {
    InputId::new(BusType::BUS_VIRTUAL, VIRTUAL_VENDOR_ID, product, 1)
}

pub struct VirtualDevices {
    keyboard: VirtualDevice,
    pointer: VirtualDevice,
}

impl VirtualDevices {
    pub fn create() -> Result<Self, PlatformError> {
        let mut keys = AttributeSet::<Key>::new();
        for code in FIRST_KEY..=LAST_KEY {
            keys.insert(Key::new(code));
        }
        let keyboard = VirtualDeviceBuilder::new()
            .map_err(unavailable)?
            .name(KEYBOARD_NAME)
            .input_id(virtual_id(VIRTUAL_KEYBOARD_PRODUCT_ID))
            .with_keys(&keys)?
            .build()?;

        let mut buttons = AttributeSet::<Key>::new();
        for button in POINTER_BUTTONS {
            buttons.insert(button);
        }
        let mut axes = AttributeSet::<RelativeAxisType>::new();
        for axis in [
            RelativeAxisType::REL_X,
            RelativeAxisType::REL_Y,
            RelativeAxisType::REL_WHEEL,
            RelativeAxisType::REL_HWHEEL,
        ] {
            axes.insert(axis);
        }
        let pointer = VirtualDeviceBuilder::new()
            .map_err(unavailable)?
            .name(POINTER_NAME)
            .input_id(virtual_id(VIRTUAL_POINTER_PRODUCT_ID))
            .with_keys(&buttons)?
            .with_relative_axes(&axes)?
            .build()?;

        log::info!("uinput: created `{KEYBOARD_NAME}` and `{POINTER_NAME}`");
        Ok(Self { keyboard, pointer })
    }
}

fn unavailable(e: std::io::Error) -> PlatformError {
    PlatformError::Unavailable(format!(
        "cannot open /dev/uinput ({e}). Load the uinput module and grant this user write access."
    ))
}

/// Relative axis events for the non-zero components of `motion`.
fn motion_events(motion: &PointerMotion) -> Vec<InputEvent> {
    [
        (RelativeAxisType::REL_X, motion.dx),
        (RelativeAxisType::REL_Y, motion.dy),
        (RelativeAxisType::REL_WHEEL, motion.wheel),
        (RelativeAxisType::REL_HWHEEL, motion.hwheel),
    ]
    .into_iter()
    .filter(|&(_, value)| value != 0)
    .map(|(axis, value)| InputEvent::new(EventType::RELATIVE, axis.0, value))
    .collect()
}

impl VirtualOutput for VirtualDevices {
    fn write_key(&mut self, keycode: Keycode, value: i32) -> Result<(), PlatformError> {
        let device = if keycode.is_keyboard() { &mut self.keyboard } else { &mut self.pointer };
        device.emit(&[InputEvent::new(EventType::KEY, keycode.0, value)])?;
        Ok(())
    }

    fn write_motion(&mut self, motion: &PointerMotion) -> Result<(), PlatformError> {
        let events = motion_events(motion);
        if !events.is_empty() {
            self.pointer.emit(&events)?;
        }
        Ok(())
    }
}
