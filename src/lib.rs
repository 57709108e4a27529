//! Framebuffer + evdev video backend for a rotated handheld panel.
//!
//! The application draws into a fixed 320×240 RGB565 [`Surface`]; on
//! [`Backend::present`] the backend rotates that surface 90° into the
//! panel's native 240×320 orientation and pages it onto the kernel
//! framebuffer device, while [`Backend::poll_input`] drains keyboard and
//! touch events from evdev.
//!
//! Steady-state failures — a missed pan, a dropped read, an unknown scan
//! code — are logged through the `log` crate and swallowed rather than
//! propagated; only the fallible setup in [`Backend::init`] returns a
//! [`Error`].
//!
//! The kernel framebuffer and evdev wire layout in [`sys`] is Linux-only,
//! so this crate targets Linux exclusively rather than offering a
//! portable fallback; [`Backend::init_fake`] is the supported way to
//! exercise the rest of the pipeline without real display/input hardware.

pub mod backend;
pub mod error;
pub mod input;
pub mod panel;
pub mod rotate;
pub mod surface;
pub mod sys;

pub use backend::Backend;
pub use error::{Error, Result};
pub use input::keymap::Scancode;
pub use input::{DeviceClass, Event};
pub use surface::Surface;
