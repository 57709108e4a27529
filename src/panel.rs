//! The physical panel: the `/dev/fb0`-style character device the rotated
//! frame is paged onto.
//!
//! [`LinuxPanel`] is the real, `libc`-backed implementation. [`FakePanel`]
//! is an in-memory stand-in with the same [`PanelDevice`] surface, used in
//! tests that need to exercise [`crate::backend::Backend`] without a real
//! framebuffer device node.

use crate::error::{Error, Result};
use crate::rotate::{DST_HEIGHT, DST_WIDTH};
use log::warn;

/// Environment variable overriding the panel device path, mainly so tests
/// and alternate boards don't need `/dev/fb0` specifically.
pub const DEVICE_ENV_VAR: &str = "FBCON_DEVICE";
const DEFAULT_DEVICE_PATH: &str = "/dev/fb0";

/// A double-buffered panel: two `DST_WIDTH`×`DST_HEIGHT` regions stacked
/// vertically in video memory, one being scanned out while the other is
/// written into.
pub trait PanelDevice {
    /// The region not currently being scanned out, as a mutable pixel
    /// slice of length `DST_WIDTH * DST_HEIGHT`.
    fn back_half_mut(&mut self) -> &mut [u16];

    /// Pitch of the mapped region, in pixels. May exceed `DST_WIDTH` if
    /// the kernel reports padding; callers must write `DST_WIDTH` pixels
    /// per row, not `pitch`.
    fn pitch(&self) -> usize;

    /// Ask the kernel to scan out the half just written instead, waiting
    /// for the next vertical blank. Returns `false` (and logs a warning)
    /// if the pan ioctl failed; the caller keeps drawing into the same
    /// half next frame rather than treating this as fatal.
    fn pan(&mut self) -> bool;
}

#[cfg(unix)]
pub struct LinuxPanel {
    fd: std::os::unix::io::RawFd,
    map: *mut libc::c_void,
    map_len: usize,
    pitch_px: usize,
    active_half: usize,
}

#[cfg(unix)]
impl LinuxPanel {
    /// Open and map the panel device named by `FBCON_DEVICE`, falling
    /// back to `/dev/fb0`.
    pub fn open() -> Result<Self> {
        let path = std::env::var(DEVICE_ENV_VAR).unwrap_or_else(|_| DEFAULT_DEVICE_PATH.to_string());
        Self::open_path(&path)
    }

    pub fn open_path(path: &str) -> Result<Self> {
        use crate::sys;
        use std::ffi::CString;

        let c_path = CString::new(path).map_err(|_| Error::DeviceUnavailable {
            path: path.to_string(),
            source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
        })?;

        // SAFETY: c_path is a valid NUL-terminated string for the
        // duration of this call.
        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR | libc::O_CLOEXEC) };
        if fd < 0 {
            return Err(Error::DeviceUnavailable {
                path: path.to_string(),
                source: std::io::Error::last_os_error(),
            });
        }

        let mut fix = sys::FbFixScreeninfo::default();
        // SAFETY: fd is open, fix is a valid writable FbFixScreeninfo.
        let rc = unsafe {
            libc::ioctl(
                fd,
                sys::FBIOGET_FSCREENINFO as _,
                &mut fix as *mut sys::FbFixScreeninfo,
            )
        };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(Error::GeometryQueryFailed { source: err });
        }

        let mut var = sys::FbVarScreeninfo::default();
        // SAFETY: fd is open, var is a valid writable FbVarScreeninfo.
        let rc = unsafe {
            libc::ioctl(
                fd,
                sys::FBIOGET_VSCREENINFO as _,
                &mut var as *mut sys::FbVarScreeninfo,
            )
        };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(Error::GeometryQueryFailed { source: err });
        }

        let pitch_px = (fix.line_length as usize) / 2;
        if pitch_px != DST_WIDTH {
            warn!(
                "panel line length implies pitch {} px, expected {} (no row padding); \
                 present() writes DST_WIDTH*DST_HEIGHT contiguously and will misalign rows",
                pitch_px, DST_WIDTH
            );
        }
        let map_len = pitch_px * DST_HEIGHT * 2 * 2; // two halves, 2 bytes/px

        let map = unsafe {
            let mut p = libc::mmap(
                std::ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            );
            if p == libc::MAP_FAILED {
                // Fall back to a private copy-on-write mapping; panning
                // still issues the ioctl, it just won't be visible on a
                // device that refuses shared mappings (some emulators).
                p = libc::mmap(
                    std::ptr::null_mut(),
                    map_len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE,
                    fd,
                    0,
                );
            }
            p
        };
        if map == libc::MAP_FAILED {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(Error::MappingFailed { size: map_len, source: err });
        }

        Ok(Self {
            fd,
            map,
            map_len,
            pitch_px,
            active_half: 0,
        })
    }

    fn half_offset_pixels(&self, half: usize) -> usize {
        half * self.pitch_px * DST_HEIGHT
    }
}

#[cfg(unix)]
impl PanelDevice for LinuxPanel {
    fn back_half_mut(&mut self) -> &mut [u16] {
        let back = 1 - self.active_half;
        let off = self.half_offset_pixels(back);
        let len = self.pitch_px * DST_HEIGHT;
        // SAFETY: `map` is a valid mapping of at least `map_len` bytes,
        // and `off + len` never exceeds the two-half mapping.
        unsafe {
            let base = (self.map as *mut u16).add(off);
            std::slice::from_raw_parts_mut(base, len)
        }
    }

    fn pitch(&self) -> usize {
        self.pitch_px
    }

    fn pan(&mut self) -> bool {
        use crate::sys;

        let back = 1 - self.active_half;
        let mut var = sys::FbVarScreeninfo {
            xres: DST_WIDTH as u32,
            yres: DST_HEIGHT as u32,
            xoffset: 0,
            yoffset: (back * DST_HEIGHT) as u32,
            activate: sys::FB_ACTIVATE_VBL,
            ..Default::default()
        };

        // SAFETY: fd is open, var is a valid FbVarScreeninfo.
        let rc = unsafe {
            libc::ioctl(
                self.fd,
                sys::FBIOPAN_DISPLAY as _,
                &mut var as *mut sys::FbVarScreeninfo,
            )
        };
        if rc != 0 {
            warn!(
                "panel pan ioctl failed: {}",
                std::io::Error::last_os_error()
            );
            return false;
        }
        self.active_half = back;
        true
    }
}

#[cfg(unix)]
impl Drop for LinuxPanel {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.map, self.map_len);
            libc::close(self.fd);
        }
    }
}

/// In-memory stand-in for [`LinuxPanel`], used in tests.
pub struct FakePanel {
    halves: [Vec<u16>; 2],
    active_half: usize,
    pub pan_should_succeed: bool,
    pub pan_calls: usize,
}

impl FakePanel {
    pub fn new() -> Self {
        Self {
            halves: [
                vec![0u16; DST_WIDTH * DST_HEIGHT],
                vec![0u16; DST_WIDTH * DST_HEIGHT],
            ],
            active_half: 0,
            pan_should_succeed: true,
            pan_calls: 0,
        }
    }

    pub fn front_half(&self) -> &[u16] {
        &self.halves[self.active_half]
    }
}

impl Default for FakePanel {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelDevice for FakePanel {
    fn back_half_mut(&mut self) -> &mut [u16] {
        let back = 1 - self.active_half;
        &mut self.halves[back]
    }

    fn pitch(&self) -> usize {
        DST_WIDTH
    }

    fn pan(&mut self) -> bool {
        self.pan_calls += 1;
        if !self.pan_should_succeed {
            warn!("panel pan ioctl failed: simulated failure");
            return false;
        }
        self.active_half = 1 - self.active_half;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_panel_toggles_active_half_on_successful_pan() {
        let mut panel = FakePanel::new();
        panel.back_half_mut().fill(0xAAAA);
        assert!(panel.pan());
        assert!(panel.front_half().iter().all(|&p| p == 0xAAAA));
    }

    #[test]
    fn fake_panel_keeps_active_half_on_failed_pan() {
        let mut panel = FakePanel::new();
        panel.pan_should_succeed = false;
        panel.back_half_mut().fill(0xBBBB);
        assert!(!panel.pan());
        assert!(panel.front_half().iter().all(|&p| p == 0));
        assert_eq!(panel.pan_calls, 1);
    }
}
