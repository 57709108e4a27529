//! The application-facing back buffer.
//!
//! A fixed-size, fixed-format RGB565 surface the application draws into.
//! It never talks to the kernel directly; [`crate::backend::Backend`]
//! rotates its contents into the panel's mapped memory on present.

use crate::error::{Error, Result};
use crate::rotate::{SRC_HEIGHT, SRC_WIDTH};

/// RGB565 channel masks, matching the panel's reported `fb_bitfield`s.
pub const RED_MASK: u16 = 0xF800;
pub const GREEN_MASK: u16 = 0x07E0;
pub const BLUE_MASK: u16 = 0x001F;

/// The back buffer the application draws into: 320×240 pixels, RGB565,
/// row-major with a pitch equal to its width (no padding).
pub struct Surface {
    pixels: Vec<u16>,
}

impl Surface {
    pub const WIDTH: usize = SRC_WIDTH;
    pub const HEIGHT: usize = SRC_HEIGHT;

    /// Allocate a zeroed surface.
    ///
    /// `force_allocation_failure` exists only so tests can exercise the
    /// [`Error::AllocationFailed`] path; production callers always pass
    /// `false`, and on a host capable of running this backend at all the
    /// allocation below cannot realistically fail.
    pub fn new(force_allocation_failure: bool) -> Result<Self> {
        let len = Self::WIDTH * Self::HEIGHT;
        if force_allocation_failure {
            return Err(Error::AllocationFailed { size: len * 2 });
        }
        Ok(Self {
            pixels: vec![0u16; len],
        })
    }

    pub fn width(&self) -> usize {
        Self::WIDTH
    }

    pub fn height(&self) -> usize {
        Self::HEIGHT
    }

    /// Row pitch in pixels. Equal to `width()`; the backend never pads
    /// rows, so this is exposed mainly for API symmetry with the panel
    /// side, where pitch and width can differ.
    pub fn pitch(&self) -> usize {
        Self::WIDTH
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.pixels
    }

    pub fn as_mut_slice(&mut self) -> &mut [u16] {
        &mut self.pixels
    }

    /// Fill the whole surface with a single RGB565 color.
    pub fn clear(&mut self, color: u16) {
        self.pixels.fill(color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_surface_is_zeroed_and_sized() {
        let surf = Surface::new(false).unwrap();
        assert_eq!(surf.as_slice().len(), Surface::WIDTH * Surface::HEIGHT);
        assert!(surf.as_slice().iter().all(|&p| p == 0));
    }

    #[test]
    fn forced_allocation_failure_is_surfaced() {
        let err = Surface::new(true).unwrap_err();
        assert!(matches!(err, Error::AllocationFailed { .. }));
    }

    #[test]
    fn clear_fills_every_pixel() {
        let mut surf = Surface::new(false).unwrap();
        surf.clear(RED_MASK);
        assert!(surf.as_slice().iter().all(|&p| p == RED_MASK));
    }
}
