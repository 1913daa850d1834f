//! Boundary between a camera session and the vendor SDK.
//!
//! [`NativeDriver`] forwards to the runtime-loaded Toupcam library. Other implementations
//! (scripted devices in tests, replay sources) plug into [`crate::Toupcam`] the same way.

use std::ffi::{c_int, c_uint, c_void};
use std::ptr::NonNull;

use log::{debug, warn};
use toupcam_sys::{IdChar, ToupcamLibrary, PIXEL_BITS_RGB24, ROW_PITCH_PACKED};

use crate::config::SessionConfig;
use crate::error::{Result, ToupcamError};
use crate::frame::frame_byte_len;

/// Event callback signature expected by the SDK: `(event code, context)`.
pub type EventCallback = toupcam_sys::PTOUPCAM_EVENT_CALLBACK;

/// Non-null handle of an opened camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHandle(NonNull<c_void>);

// The SDK handle is an opaque token; the SDK synchronises access to the device itself.
unsafe impl Send for DeviceHandle {}
unsafe impl Sync for DeviceHandle {}

impl DeviceHandle {
    pub fn from_raw(raw: *mut c_void) -> Option<Self> {
        NonNull::new(raw).map(Self)
    }

    pub fn as_raw(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Operations a camera session needs from the device layer.
pub trait Driver: Send + Sync + 'static {
    /// Open a camera. `None` means no camera could be opened.
    fn open(&self, device_id: Option<&str>) -> Option<DeviceHandle>;

    /// Release a handle returned by [`Driver::open`]. No callbacks run after this returns.
    fn close(&self, handle: DeviceHandle);

    /// Current output resolution as `(width, height)`.
    fn frame_size(&self, handle: DeviceHandle) -> Result<(u32, u32)>;

    /// Begin pull-mode delivery; `callback` is invoked with `ctx` on a driver thread.
    ///
    /// # Safety
    /// `ctx` must stay valid for `callback` until [`Driver::stop`] or [`Driver::close`]
    /// returns for `handle`.
    unsafe fn start_pull_mode(&self, handle: DeviceHandle, callback: EventCallback, ctx: *mut c_void) -> Result<()>;

    /// Copy the pending frame into `dest` as packed RGB24 and return its `(width, height)`.
    ///
    /// Fails with [`ToupcamError::FrameSize`] if `dest` cannot hold the pending frame.
    fn pull_image(&self, handle: DeviceHandle, dest: &mut [u8]) -> Result<(u32, u32)>;

    /// Stop delivering frames. No callbacks run after this returns successfully.
    fn stop(&self, handle: DeviceHandle) -> Result<()>;
}

/// [`Driver`] backed by the vendor's shared library.
#[derive(Debug)]
pub struct NativeDriver {
    lib: ToupcamLibrary,
}

impl NativeDriver {
    /// Load the SDK from the location described by `config`.
    pub fn load(config: &SessionConfig) -> Result<Self> {
        let path = config.library_path()?;
        debug!("loading Toupcam SDK from {}", path.display());
        let lib = unsafe { ToupcamLibrary::load(&path)? };
        Ok(Self { lib })
    }

    pub fn library(&self) -> &ToupcamLibrary {
        &self.lib
    }
}

/// NUL-terminated camera id in the SDK's native character type.
fn encode_device_id(id: &str) -> Option<Vec<IdChar>> {
    #[cfg(windows)]
    let mut units: Vec<IdChar> = id.encode_utf16().collect();
    #[cfg(not(windows))]
    let mut units: Vec<IdChar> = id.bytes().map(|b| b as IdChar).collect();

    if units.contains(&0) {
        return None;
    }
    units.push(0);
    Some(units)
}

impl Driver for NativeDriver {
    fn open(&self, device_id: Option<&str>) -> Option<DeviceHandle> {
        let raw = match device_id {
            None => unsafe { self.lib.open(std::ptr::null()) },
            Some(id) => {
                let Some(encoded) = encode_device_id(id) else {
                    warn!("camera id {id:?} contains a NUL character");
                    return None;
                };
                unsafe { self.lib.open(encoded.as_ptr()) }
            }
        };
        DeviceHandle::from_raw(raw)
    }

    fn close(&self, handle: DeviceHandle) {
        unsafe { self.lib.close(handle.as_raw()) };
    }

    fn frame_size(&self, handle: DeviceHandle) -> Result<(u32, u32)> {
        let mut width: c_int = 0;
        let mut height: c_int = 0;
        let hr = unsafe { self.lib.get_size(handle.as_raw(), &mut width, &mut height) };
        ToupcamError::check("Toupcam_get_Size", hr)?;
        match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
            _ => Err(ToupcamError::Hresult {
                call: "Toupcam_get_Size",
                code: toupcam_sys::E_UNEXPECTED,
            }),
        }
    }

    unsafe fn start_pull_mode(&self, handle: DeviceHandle, callback: EventCallback, ctx: *mut c_void) -> Result<()> {
        let hr = unsafe { self.lib.start_pull_mode_with_callback(handle.as_raw(), callback, ctx) };
        ToupcamError::check("Toupcam_StartPullModeWithCallback", hr)
    }

    fn pull_image(&self, handle: DeviceHandle, dest: &mut [u8]) -> Result<(u32, u32)> {
        // The SDK writes a full frame at its current resolution without a length argument.
        let (w, h) = self.frame_size(handle)?;
        let needed = frame_byte_len(w, h)?;
        if dest.len() < needed {
            return Err(ToupcamError::FrameSize {
                expected: needed,
                actual: dest.len(),
            });
        }

        let mut width: c_uint = 0;
        let mut height: c_uint = 0;
        let hr = unsafe {
            self.lib.pull_image_with_row_pitch(
                handle.as_raw(),
                dest.as_mut_ptr() as *mut c_void,
                PIXEL_BITS_RGB24,
                ROW_PITCH_PACKED,
                &mut width,
                &mut height,
            )
        };
        ToupcamError::check("Toupcam_PullImageWithRowPitch", hr)?;
        Ok((width, height))
    }

    fn stop(&self, handle: DeviceHandle) -> Result<()> {
        let hr = unsafe { self.lib.stop(handle.as_raw()) };
        ToupcamError::check("Toupcam_Stop", hr)
    }
}
