//! Error types surfaced by backend init.
//!
//! Steady-state failures (a missed pan, a dropped read, an unknown scan
//! code) are logged and swallowed instead of returned — see the module
//! docs on [`crate::backend`] and [`crate::input`].

use thiserror::Error;

/// The closed set of ways bringing the backend up can fail.
#[derive(Debug, Error)]
pub enum Error {
    /// The panel character device could not be opened.
    #[error("panel device {path} unavailable: {source}")]
    DeviceUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// `FBIOGET_FSCREENINFO` / `FBIOGET_VSCREENINFO` failed.
    #[error("failed to query panel geometry: {source}")]
    GeometryQueryFailed {
        #[source]
        source: std::io::Error,
    },

    /// Neither a shared nor a private mapping of the panel's video memory
    /// could be established.
    #[error("failed to map {size} bytes of panel video memory: {source}")]
    MappingFailed {
        size: usize,
        #[source]
        source: std::io::Error,
    },

    /// The back buffer allocation failed.
    #[error("failed to allocate {size}-byte back buffer")]
    AllocationFailed { size: usize },

    /// An input device path named in the device-list override could not be
    /// opened or does not name a device this backend understands.
    #[error("unknown input device {0:?}")]
    UnknownInputDevice(String),
}

pub type Result<T> = std::result::Result<T, Error>;
