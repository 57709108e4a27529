//! Backend init/teardown and the frame present path.
//!
//! `Backend::init()` is the single entry point: it opens the panel,
//! allocates the back buffer, and opens whatever input devices are
//! configured, in that order. A failure at any step rolls back everything
//! already acquired — each owned resource has a `Drop` impl, so an early
//! return during init is enough; there is no separate cleanup stack.
//!
//! At most one `Backend` may be live per process. This is enforced with
//! an atomic flag rather than a global mutable device list, since the
//! backend itself is now a plain owned value rather than process-wide
//! statics.
//!
//! This crate is Linux-only: the wire layout in [`crate::sys`] and the
//! ioctls built on top of it have no meaning on another OS, and the
//! `input` module depends on it unconditionally. `Backend::init_fake`
//! (backed by [`crate::panel::FakePanel`]) is what the test suite uses
//! instead of the real `Backend::init` path, so tests never touch
//! `/dev/fb0` or `/dev/input/event*`.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};
use crate::input::{DeviceClass, Event, InputReader};
use crate::panel::PanelDevice;
use crate::rotate;
use crate::surface::Surface;

static BACKEND_LIVE: AtomicBool = AtomicBool::new(false);

/// Environment variable listing input devices to open at init, in the
/// format `class:path[,class:path...]` (class `0` = keyboard, `1` =
/// touch). Absent or empty means no input devices are opened.
pub const INPUT_DEVICES_ENV_VAR: &str = "FBCON_INPUT_DEVICES";

/// Number of multi-touch slots assumed for any device named in
/// `FBCON_INPUT_DEVICES` as a touch device. Auto-discovery of a device's
/// real slot count is out of scope (see the design notes); this fixed
/// size covers every panel this backend targets.
const DEFAULT_TOUCH_SLOTS: usize = 10;

/// The live backend: owns the panel, the back buffer, and the input
/// device list. Deliberately carries no `Send`/`Sync` impl — it wraps raw
/// file descriptors and a raw mapped pointer, and teardown must happen on
/// the thread that called `init`.
pub struct Backend<P: PanelDevice> {
    panel: P,
    surface: Surface,
    input: InputReader,
    _not_send_sync: std::marker::PhantomData<*const ()>,
}

impl Backend<crate::panel::FakePanel> {
    /// Init against an in-memory fake panel, for tests and headless runs.
    pub fn init_fake() -> Result<Self> {
        Self::init_with_panel(crate::panel::FakePanel::new())
    }
}

#[cfg(unix)]
impl Backend<crate::panel::LinuxPanel> {
    /// Init against the real panel device named by `FBCON_DEVICE` (or
    /// `/dev/fb0`), opening any input devices named by
    /// `FBCON_INPUT_DEVICES`.
    pub fn init() -> Result<Self> {
        let panel = crate::panel::LinuxPanel::open()?;
        Self::init_with_panel(panel)
    }
}

impl<P: PanelDevice> Backend<P> {
    fn init_with_panel(panel: P) -> Result<Self> {
        if BACKEND_LIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::DeviceUnavailable {
                path: "<backend>".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::AlreadyExists),
            });
        }

        let result = (|| {
            let surface = Surface::new(false)?;
            let input = open_configured_input_devices()?;
            Ok((surface, input))
        })();

        match result {
            Ok((surface, input)) => Ok(Self {
                panel,
                surface,
                input,
                _not_send_sync: std::marker::PhantomData,
            }),
            Err(e) => {
                // `panel` and whatever was partially constructed above
                // are dropped here, releasing their resources before we
                // clear the singleton flag.
                BACKEND_LIVE.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Borrow the back buffer the application draws into.
    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    /// Drain pending input events.
    pub fn poll_input(&mut self) -> Vec<Event> {
        self.input.pump()
    }

    /// Rotate the back buffer into the panel's inactive half and request
    /// a pan. Blocks in the kernel until the next vertical blank if the
    /// pan succeeds.
    pub fn present(&mut self) {
        let dst = self.panel.back_half_mut();
        rotate::rotate(self.surface.as_slice(), &mut dst[..rotate::DST_WIDTH * rotate::DST_HEIGHT]);
        self.panel.pan();
    }
}

impl<P: PanelDevice> Drop for Backend<P> {
    fn drop(&mut self) {
        BACKEND_LIVE.store(false, Ordering::Release);
    }
}

fn open_configured_input_devices() -> Result<InputReader> {
    let mut reader = InputReader::new();
    let Ok(spec) = std::env::var(INPUT_DEVICES_ENV_VAR) else {
        return Ok(reader);
    };
    if spec.trim().is_empty() {
        return Ok(reader);
    }

    for entry in spec.split(',') {
        let (class_code, path) = entry.split_once(':').ok_or_else(|| {
            Error::UnknownInputDevice(entry.to_string())
        })?;
        let class = DeviceClass::from_code(class_code)
            .ok_or_else(|| Error::UnknownInputDevice(entry.to_string()))?;

        let source = crate::input::LinuxEventSource::open(path)?;

        let slot_count = match class {
            DeviceClass::Touch => DEFAULT_TOUCH_SLOTS,
            DeviceClass::Keyboard => 0,
        };
        reader.add_device(path.to_string(), class, Box::new(source), slot_count)?;
    }

    Ok(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RED_MASK;

    #[test]
    fn single_backend_at_a_time() {
        let backend = Backend::init_fake().unwrap();
        let second = Backend::init_fake();
        assert!(second.is_err());
        drop(backend);
        assert!(Backend::init_fake().is_ok());
    }

    #[test]
    fn present_rotates_and_toggles_active_half() {
        let mut backend = Backend::init_fake().unwrap();
        backend.surface_mut().as_mut_slice()[0] = RED_MASK;
        backend.present();

        let panel = &backend.panel;
        // Row 319, column 0 of the now-front half holds the rotated pixel.
        assert_eq!(panel.front_half()[319 * rotate::DST_WIDTH], RED_MASK);
    }
}
