use std::fmt;

use toupcam_sys::{
    TOUPCAM_EVENT_CHROME, TOUPCAM_EVENT_DISCONNECTED, TOUPCAM_EVENT_ERROR, TOUPCAM_EVENT_EXPOSURE,
    TOUPCAM_EVENT_IMAGE, TOUPCAM_EVENT_STILLIMAGE, TOUPCAM_EVENT_TEMPTINT, TOUPCAM_EVENT_TIMEOUT,
    TOUPCAM_EVENT_WBGAIN,
};

/// Notification delivered by the SDK to a streaming camera.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraEvent {
    Exposure = TOUPCAM_EVENT_EXPOSURE,
    TempTint = TOUPCAM_EVENT_TEMPTINT,
    Chrome = TOUPCAM_EVENT_CHROME,
    Image = TOUPCAM_EVENT_IMAGE,
    StillImage = TOUPCAM_EVENT_STILLIMAGE,
    WbGain = TOUPCAM_EVENT_WBGAIN,
    Error = TOUPCAM_EVENT_ERROR,
    Disconnected = TOUPCAM_EVENT_DISCONNECTED,
    Timeout = TOUPCAM_EVENT_TIMEOUT,
}

impl CameraEvent {
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            TOUPCAM_EVENT_EXPOSURE => Some(Self::Exposure),
            TOUPCAM_EVENT_TEMPTINT => Some(Self::TempTint),
            TOUPCAM_EVENT_CHROME => Some(Self::Chrome),
            TOUPCAM_EVENT_IMAGE => Some(Self::Image),
            TOUPCAM_EVENT_STILLIMAGE => Some(Self::StillImage),
            TOUPCAM_EVENT_WBGAIN => Some(Self::WbGain),
            TOUPCAM_EVENT_ERROR => Some(Self::Error),
            TOUPCAM_EVENT_DISCONNECTED => Some(Self::Disconnected),
            TOUPCAM_EVENT_TIMEOUT => Some(Self::Timeout),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Error, disconnect and timeout notifications.
    pub fn is_fault(self) -> bool {
        matches!(self, Self::Error | Self::Disconnected | Self::Timeout)
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Exposure => "exposure time changed",
            Self::TempTint => "white balance changed (temp/tint)",
            Self::Chrome => "chrome (reserved)",
            Self::Image => "live image arrived",
            Self::StillImage => "still image arrived",
            Self::WbGain => "white balance changed (rgb gain)",
            Self::Error => "generic error",
            Self::Disconnected => "camera disconnected",
            Self::Timeout => "timeout error",
        }
    }
}

impl fmt::Display for CameraEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#06x})", self.description(), self.as_raw())
    }
}
