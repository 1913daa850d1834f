//! Error handling for the AmScope camera wrapper

use crate::session::SessionState;

/// Result type for camera and frame buffer operations
pub type Result<T> = std::result::Result<T, ToupcamError>;

/// Errors that can occur when working with an AmScope camera
#[derive(Debug, thiserror::Error)]
pub enum ToupcamError {
    /// The running operating system has no Toupcam SDK build
    #[error("cannot detect a supported operating system (found `{0}`)")]
    UnsupportedPlatform(String),
    /// No home directory to resolve the driver directory against
    #[error("could not determine the user's home directory")]
    HomeDirNotFound,
    /// The SDK shared library could not be loaded
    #[error(transparent)]
    Library(#[from] toupcam_sys::LoadError),
    /// An SDK call returned a failing HRESULT
    #[error("{call} failed with HRESULT {code:#010x}")]
    Hresult { call: &'static str, code: i32 },
    /// A frame buffer was configured with zero capacity
    #[error("frame buffer capacity must be greater than zero")]
    InvalidCapacity,
    /// No frame was available before the call gave up
    #[error("frame buffer is empty")]
    Empty,
    /// The frame buffer was closed
    #[error("frame buffer is closed")]
    Closed,
    /// A lifecycle call was made from a state that does not allow it
    #[error("invalid camera session transition from {from:?} to {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },
    /// Raw pixel data does not match the declared geometry
    #[error("frame data has {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
    /// The declared geometry needs more bytes than can be addressed
    #[error("a {width}x{height} RGB24 frame does not fit in memory")]
    FrameTooLarge { width: u32, height: u32 },
    /// The device delivered a frame with a different size than negotiated
    #[error("device delivered a {}x{} frame, expected {}x{}", .actual.0, .actual.1, .expected.0, .expected.1)]
    GeometryMismatch { expected: (u32, u32), actual: (u32, u32) },
    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ToupcamError {
    /// Map an SDK status code to `Ok(())` or [`ToupcamError::Hresult`].
    pub(crate) fn check(call: &'static str, hr: toupcam_sys::HRESULT) -> Result<()> {
        if toupcam_sys::failed(hr) {
            Err(ToupcamError::Hresult { call, code: hr })
        } else {
            Ok(())
        }
    }

    /// True for the "nothing to read right now" condition of a frame buffer.
    pub fn is_empty(&self) -> bool {
        matches!(self, ToupcamError::Empty)
    }
}
