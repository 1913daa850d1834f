pub mod buffer;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod frame;
pub mod session;

pub use toupcam_sys as bindings;

// Re-export main types for convenience
pub use crate::buffer::{FrameBuffer, DEFAULT_CAPACITY};
pub use crate::config::SessionConfig;
pub use crate::driver::{DeviceHandle, Driver, EventCallback, NativeDriver};
pub use crate::error::{Result, ToupcamError};
pub use crate::event::CameraEvent;
pub use crate::frame::{Frame, TestPattern};
pub use crate::session::{EventHook, SessionState, Toupcam};
