//! Non-blocking drain of evdev devices: key event emission and multi-touch
//! slot resync bookkeeping.
//!
//! A device list owns zero or more [`EventSource`]s, each either a
//! keyboard (scan codes only) or a touch device (scan codes plus slot
//! tracking, used only to keep resync correct — there is no public touch
//! event API beyond what [`InputReader::pump`] emits). [`LinuxEventSource`]
//! is the real `libc`-backed implementation; [`FakeEventSource`] is an
//! in-memory stand-in for tests.

pub mod keymap;

use crate::error::{Error, Result};
use crate::sys::{self, InputEvent};
use keymap::Scancode;
use log::trace;

const MAX_BATCH: usize = 32;

/// What kind of device a path in `FBCON_INPUT_DEVICES` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Keyboard,
    Touch,
}

impl DeviceClass {
    /// Parse the small integer class prefix used in `FBCON_INPUT_DEVICES`
    /// (`0:path` for a keyboard, `1:path` for a touch device).
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(DeviceClass::Keyboard),
            "1" => Some(DeviceClass::Touch),
            _ => None,
        }
    }
}

/// An event emitted by [`InputReader::pump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    KeyDown(Scancode),
    KeyUp(Scancode),
    TouchDown { slot: usize, x: i32, y: i32 },
    TouchMove { slot: usize, x: i32, y: i32 },
    TouchUp { slot: usize },
}

/// The raw device operations an [`InputReader`] needs: a non-blocking
/// batched read, and the two control calls touch resync depends on.
pub trait EventSource {
    /// Read up to `buf.len()` events without blocking. Returns the number
    /// read, or `None` if the read would block (no more events pending).
    fn read_events(&mut self, buf: &mut [InputEvent]) -> Option<usize>;

    /// `EVIOCGABS(ABS_MT_SLOT)` — the currently selected slot index.
    fn query_current_slot(&self) -> Option<i32>;

    /// `EVIOCGMTSLOTS` for one axis code, one value per slot.
    fn query_mt_slot_values(&self, code: u32, slot_count: usize) -> Option<Vec<i32>>;
}

#[derive(Debug, Clone, Copy, Default)]
struct SlotRecord {
    tracking_id: i32,
    x: i32,
    y: i32,
    pressure: i32,
}

impl SlotRecord {
    fn absent() -> Self {
        Self {
            tracking_id: -1,
            x: 0,
            y: 0,
            pressure: 0,
        }
    }
}

struct TouchState {
    slots: Vec<SlotRecord>,
    current_slot: usize,
}

struct DeviceEntry {
    path: String,
    class: DeviceClass,
    source: Box<dyn EventSource>,
    out_of_sync: bool,
    touch: Option<TouchState>,
}

/// The device list: add/remove are O(n) over the devices currently held,
/// keyed by path, with duplicate paths rejected. This is the idiomatic
/// Rust shape of what upstream keeps as a singly-linked list of device
/// records — a `Vec` scanned linearly has the same complexity profile
/// without hand-rolled unsafe list surgery.
#[derive(Default)]
pub struct InputReader {
    devices: Vec<DeviceEntry>,
}

impl InputReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device, rejecting duplicate paths. `slot_count` is only
    /// meaningful for `DeviceClass::Touch` and sizes the per-slot record
    /// array; pass `0` for keyboards.
    pub fn add_device(
        &mut self,
        path: impl Into<String>,
        class: DeviceClass,
        source: Box<dyn EventSource>,
        slot_count: usize,
    ) -> Result<()> {
        let path = path.into();
        if self.devices.iter().any(|d| d.path == path) {
            return Err(Error::UnknownInputDevice(path));
        }
        let touch = match class {
            DeviceClass::Touch => Some(TouchState {
                slots: vec![SlotRecord::absent(); slot_count],
                current_slot: 0,
            }),
            DeviceClass::Keyboard => None,
        };
        self.devices.push(DeviceEntry {
            path,
            class,
            source,
            out_of_sync: false,
            touch,
        });
        Ok(())
    }

    /// Remove a device by path, closing it (via `Drop` on its boxed
    /// source) in the same step. Returns whether a device was removed.
    pub fn remove_device(&mut self, path: &str) -> bool {
        let before = self.devices.len();
        self.devices.retain(|d| d.path != path);
        self.devices.len() != before
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Drain every device's pending events, translating keys and updating
    /// touch resync state as it goes.
    pub fn pump(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        for device in &mut self.devices {
            pump_device(device, &mut out);
        }
        out
    }
}

fn pump_device(device: &mut DeviceEntry, out: &mut Vec<Event>) {
    let mut buf = [InputEvent::default(); MAX_BATCH];
    loop {
        let n = match device.source.read_events(&mut buf) {
            Some(n) if n > 0 => n,
            _ => break,
        };
        for ev in &buf[..n] {
            if device.out_of_sync
                && device.class == DeviceClass::Touch
                && ev.type_ == sys::EV_SYN
                && ev.code != sys::SYN_REPORT
            {
                // Known limitation: a finger lifted and replaced on the
                // same slot entirely inside this window is lost. The
                // resync below only sees the slot's settled state.
                break;
            }

            match ev.type_ {
                sys::EV_KEY => {
                    let scancode = keymap::translate(ev.code);
                    if scancode == Scancode::Unknown {
                        trace!("dropping unmapped keycode {}", ev.code);
                        continue;
                    }
                    match ev.value {
                        0 => out.push(Event::KeyUp(scancode)),
                        1 | 2 => out.push(Event::KeyDown(scancode)),
                        _ => {}
                    }
                }
                sys::EV_SYN if ev.code == sys::SYN_DROPPED => {
                    device.out_of_sync = true;
                    resync(device, out);
                }
                sys::EV_SYN if ev.code == sys::SYN_REPORT => {
                    device.out_of_sync = false;
                }
                _ => {}
            }
        }
        if n < MAX_BATCH {
            break;
        }
    }
}

fn resync(device: &mut DeviceEntry, out: &mut Vec<Event>) {
    let Some(touch) = device.touch.as_mut() else {
        return;
    };
    let slot_count = touch.slots.len();
    if slot_count == 0 {
        return;
    }

    let ids = device
        .source
        .query_mt_slot_values(sys::ABS_MT_TRACKING_ID, slot_count);
    let xs = device
        .source
        .query_mt_slot_values(sys::ABS_MT_POSITION_X, slot_count);
    let ys = device
        .source
        .query_mt_slot_values(sys::ABS_MT_POSITION_Y, slot_count);
    let pressures = device
        .source
        .query_mt_slot_values(sys::ABS_MT_PRESSURE, slot_count);

    let (Some(ids), Some(xs), Some(ys)) = (ids, xs, ys) else {
        return;
    };
    let pressures = pressures.unwrap_or_else(|| vec![0; slot_count]);

    for slot in 0..slot_count {
        let new = SlotRecord {
            tracking_id: ids[slot],
            x: xs[slot],
            y: ys[slot],
            pressure: pressures[slot],
        };
        let old = touch.slots[slot];

        if old.tracking_id < 0 && new.tracking_id >= 0 {
            out.push(Event::TouchDown {
                slot,
                x: new.x,
                y: new.y,
            });
        } else if old.tracking_id >= 0 && new.tracking_id < 0 {
            out.push(Event::TouchUp { slot });
        } else if new.tracking_id >= 0 && (old.x != new.x || old.y != new.y || old.pressure != new.pressure) {
            out.push(Event::TouchMove {
                slot,
                x: new.x,
                y: new.y,
            });
        }

        touch.slots[slot] = new;
    }

    if let Some(current) = device.source.query_current_slot() {
        touch.current_slot = current.max(0) as usize;
    }
}

#[cfg(unix)]
pub struct LinuxEventSource {
    fd: std::os::unix::io::RawFd,
}

#[cfg(unix)]
impl LinuxEventSource {
    pub fn open(path: &str) -> Result<Self> {
        use std::ffi::CString;

        let c_path = CString::new(path).map_err(|_| Error::DeviceUnavailable {
            path: path.to_string(),
            source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
        })?;
        // SAFETY: c_path is valid and NUL-terminated for this call.
        let fd = unsafe {
            libc::open(
                c_path.as_ptr(),
                libc::O_RDONLY | libc::O_NONBLOCK | libc::O_CLOEXEC,
            )
        };
        if fd < 0 {
            return Err(Error::DeviceUnavailable {
                path: path.to_string(),
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(Self { fd })
    }
}

#[cfg(unix)]
impl EventSource for LinuxEventSource {
    fn read_events(&mut self, buf: &mut [InputEvent]) -> Option<usize> {
        let want = buf.len() * std::mem::size_of::<InputEvent>();
        // SAFETY: buf is a valid, writable region of `want` bytes.
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, want) };
        if n <= 0 {
            return None;
        }
        Some(n as usize / std::mem::size_of::<InputEvent>())
    }

    fn query_current_slot(&self) -> Option<i32> {
        let mut info = sys::InputAbsinfo::default();
        // SAFETY: fd is open, info is a valid writable InputAbsinfo.
        let rc = unsafe {
            libc::ioctl(
                self.fd,
                sys::eviocgabs(sys::ABS_MT_SLOT) as _,
                &mut info as *mut sys::InputAbsinfo,
            )
        };
        if rc != 0 {
            return None;
        }
        Some(info.value)
    }

    fn query_mt_slot_values(&self, code: u32, slot_count: usize) -> Option<Vec<i32>> {
        // Wire layout: a leading u32 naming the axis, followed by one i32
        // per slot.
        let mut buf = vec![0i32; 1 + slot_count];
        buf[0] = code as i32;
        let len = (buf.len() * std::mem::size_of::<i32>()) as u32;
        // SAFETY: fd is open, buf is sized for `len` bytes.
        let rc = unsafe {
            libc::ioctl(
                self.fd,
                sys::eviocgmtslots(len) as _,
                buf.as_mut_ptr() as *mut libc::c_void,
            )
        };
        if rc != 0 {
            return None;
        }
        Some(buf[1..].to_vec())
    }
}

#[cfg(unix)]
impl Drop for LinuxEventSource {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

/// In-memory stand-in for [`LinuxEventSource`], used in tests. Events are
/// fed via [`FakeEventSource::push_event`]; absolute-axis responses are
/// scripted via the `abs_*` fields.
#[derive(Default)]
pub struct FakeEventSource {
    queue: std::collections::VecDeque<InputEvent>,
    pub current_slot: i32,
    pub slot_values: std::collections::HashMap<u32, Vec<i32>>,
}

impl FakeEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&mut self, type_: u16, code: u16, value: i32) {
        self.queue.push_back(InputEvent {
            time_sec: 0,
            time_usec: 0,
            type_,
            code,
            value,
        });
    }

    pub fn push_key(&mut self, code: u16, value: i32) {
        self.push_event(sys::EV_KEY, code, value);
    }

    pub fn push_sync(&mut self, code: u16) {
        self.push_event(sys::EV_SYN, code, 0);
    }
}

impl EventSource for FakeEventSource {
    fn read_events(&mut self, buf: &mut [InputEvent]) -> Option<usize> {
        if self.queue.is_empty() {
            return None;
        }
        let mut n = 0;
        while n < buf.len() {
            match self.queue.pop_front() {
                Some(ev) => {
                    buf[n] = ev;
                    n += 1;
                }
                None => break,
            }
        }
        Some(n)
    }

    fn query_current_slot(&self) -> Option<i32> {
        Some(self.current_slot)
    }

    fn query_mt_slot_values(&self, code: u32, slot_count: usize) -> Option<Vec<i32>> {
        let values = self.slot_values.get(&code)?;
        if values.len() != slot_count {
            return None;
        }
        Some(values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_press_then_release_round_trips() {
        let mut reader = InputReader::new();
        let mut source = FakeEventSource::new();
        source.push_key(30, 1); // A down
        source.push_key(30, 0); // A up
        reader
            .add_device("fake0", DeviceClass::Keyboard, Box::new(source), 0)
            .unwrap();

        let events = reader.pump();
        assert_eq!(
            events,
            vec![
                Event::KeyDown(Scancode::A),
                Event::KeyUp(Scancode::A),
            ]
        );
    }

    #[test]
    fn unknown_keycode_is_dropped() {
        let mut reader = InputReader::new();
        let mut source = FakeEventSource::new();
        source.push_key(sys::BTN_TOUCH, 1);
        reader
            .add_device("fake0", DeviceClass::Keyboard, Box::new(source), 0)
            .unwrap();
        assert!(reader.pump().is_empty());
    }

    #[test]
    fn duplicate_device_path_is_rejected() {
        let mut reader = InputReader::new();
        reader
            .add_device(
                "fake0",
                DeviceClass::Keyboard,
                Box::new(FakeEventSource::new()),
                0,
            )
            .unwrap();
        let err = reader
            .add_device(
                "fake0",
                DeviceClass::Keyboard,
                Box::new(FakeEventSource::new()),
                0,
            )
            .unwrap_err();
        assert!(matches!(err, Error::UnknownInputDevice(_)));
    }

    #[test]
    fn touch_resync_classifies_down_transition() {
        let mut reader = InputReader::new();
        let mut source = FakeEventSource::new();
        source
            .slot_values
            .insert(sys::ABS_MT_TRACKING_ID, vec![5]);
        source.slot_values.insert(sys::ABS_MT_POSITION_X, vec![10]);
        source.slot_values.insert(sys::ABS_MT_POSITION_Y, vec![20]);
        source.slot_values.insert(sys::ABS_MT_PRESSURE, vec![1]);
        source.push_sync(sys::SYN_DROPPED);
        reader
            .add_device("touch0", DeviceClass::Touch, Box::new(source), 1)
            .unwrap();

        let events = reader.pump();
        assert_eq!(
            events,
            vec![Event::TouchDown {
                slot: 0,
                x: 10,
                y: 20
            }]
        );
    }

    /// Exercises `resync`'s `move` and `up` branches directly rather than
    /// through `InputReader::pump`: once a `FakeEventSource` is boxed into
    /// a device entry there is no way to mutate its scripted slot values
    /// in place, so a multi-step touch gesture is driven by swapping in a
    /// freshly scripted source between calls and reusing the same
    /// `DeviceEntry` (and therefore its carried-over slot state) across
    /// both.
    #[test]
    fn resync_classifies_move_then_up_transitions() {
        let mut device = DeviceEntry {
            path: "touch0".to_string(),
            class: DeviceClass::Touch,
            source: Box::new(FakeEventSource::new()),
            out_of_sync: false,
            touch: Some(TouchState {
                slots: vec![SlotRecord {
                    tracking_id: 5,
                    x: 10,
                    y: 20,
                    pressure: 1,
                }],
                current_slot: 0,
            }),
        };

        // Same tracking id, new coordinates -> move.
        let mut moved = FakeEventSource::new();
        moved.slot_values.insert(sys::ABS_MT_TRACKING_ID, vec![5]);
        moved.slot_values.insert(sys::ABS_MT_POSITION_X, vec![30]);
        moved.slot_values.insert(sys::ABS_MT_POSITION_Y, vec![40]);
        moved.slot_values.insert(sys::ABS_MT_PRESSURE, vec![1]);
        device.source = Box::new(moved);

        let mut out = Vec::new();
        resync(&mut device, &mut out);
        assert_eq!(
            out,
            vec![Event::TouchMove {
                slot: 0,
                x: 30,
                y: 40
            }]
        );

        // Tracking id goes negative -> up.
        let mut lifted = FakeEventSource::new();
        lifted.slot_values.insert(sys::ABS_MT_TRACKING_ID, vec![-1]);
        lifted.slot_values.insert(sys::ABS_MT_POSITION_X, vec![30]);
        lifted.slot_values.insert(sys::ABS_MT_POSITION_Y, vec![40]);
        lifted.slot_values.insert(sys::ABS_MT_PRESSURE, vec![0]);
        device.source = Box::new(lifted);

        out.clear();
        resync(&mut device, &mut out);
        assert_eq!(out, vec![Event::TouchUp { slot: 0 }]);
    }

    #[test]
    fn out_of_sync_suppresses_batch_until_report() {
        let mut reader = InputReader::new();
        let mut source = FakeEventSource::new();
        source
            .slot_values
            .insert(sys::ABS_MT_TRACKING_ID, vec![5]);
        source.slot_values.insert(sys::ABS_MT_POSITION_X, vec![10]);
        source.slot_values.insert(sys::ABS_MT_POSITION_Y, vec![20]);
        source.slot_values.insert(sys::ABS_MT_PRESSURE, vec![1]);
        // Dropped notification triggers an immediate resync (one TouchDown);
        // a non-report sync boundary then marks the rest of this batch
        // stale, so the key event queued behind it must never surface.
        source.push_sync(sys::SYN_DROPPED);
        source.push_event(sys::EV_SYN, 2, 0);
        source.push_key(30, 1);
        reader
            .add_device("touch0", DeviceClass::Touch, Box::new(source), 1)
            .unwrap();

        let events = reader.pump();
        assert_eq!(
            events,
            vec![Event::TouchDown {
                slot: 0,
                x: 10,
                y: 20
            }]
        );
    }

    #[test]
    fn remove_device_drops_it() {
        let mut reader = InputReader::new();
        reader
            .add_device(
                "fake0",
                DeviceClass::Keyboard,
                Box::new(FakeEventSource::new()),
                0,
            )
            .unwrap();
        assert_eq!(reader.device_count(), 1);
        assert!(reader.remove_device("fake0"));
        assert_eq!(reader.device_count(), 0);
        assert!(!reader.remove_device("fake0"));
    }
}
