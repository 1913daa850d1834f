//! Raw bindings for the Toupcam SDK shipped with AmScope microscope cameras.
//!
//! The vendor library is not linked at build time. [`ToupcamLibrary::load`] opens
//! `toupcam.dll` / `libtoupcam.so` with `libloading` and resolves the pull-mode entry
//! points the higher-level `amscope` crate needs.

#![allow(non_camel_case_types)]

use std::ffi::{c_int, c_uint, c_void};
use std::path::{Path, PathBuf};

use libloading::Library;

/// Opaque camera handle returned by `Toupcam_Open`.
pub type HToupcam = *mut c_void;

/// COM-style status code. Negative values are failures.
pub type HRESULT = i32;

/// Character type of the camera id accepted by `Toupcam_Open`.
#[cfg(windows)]
pub type IdChar = u16;
#[cfg(not(windows))]
pub type IdChar = std::ffi::c_char;

/// Event notification installed with `Toupcam_StartPullModeWithCallback`.
///
/// Invoked on an SDK-owned thread with the event code and the context pointer that was
/// passed at registration time.
pub type PTOUPCAM_EVENT_CALLBACK = unsafe extern "system" fn(event: c_uint, ctx: *mut c_void);

pub const TOUPCAM_EVENT_EXPOSURE: c_uint = 0x0001; // exposure time changed
pub const TOUPCAM_EVENT_TEMPTINT: c_uint = 0x0002; // white balance changed, Temp/Tint mode
pub const TOUPCAM_EVENT_CHROME: c_uint = 0x0003; // reserved
pub const TOUPCAM_EVENT_IMAGE: c_uint = 0x0004; // live image arrived, pull it with Toupcam_PullImage
pub const TOUPCAM_EVENT_STILLIMAGE: c_uint = 0x0005; // snap (still) frame arrived
pub const TOUPCAM_EVENT_WBGAIN: c_uint = 0x0006; // white balance changed, RGB gain mode
pub const TOUPCAM_EVENT_ERROR: c_uint = 0x0080; // generic error
pub const TOUPCAM_EVENT_DISCONNECTED: c_uint = 0x0081; // camera disconnected
pub const TOUPCAM_EVENT_TIMEOUT: c_uint = 0x0082; // timeout error

/// Bits per pixel requested from `Toupcam_PullImageWithRowPitch`: interleaved RGB24.
pub const PIXEL_BITS_RGB24: c_int = 24;

/// Row pitch value meaning "no padding between rows".
pub const ROW_PITCH_PACKED: c_int = -1;

/// Directory under the user's home where the SDK shared library is installed.
pub const DRIVER_DIR_NAME: &str = "PyAmScope";

pub const S_OK: HRESULT = 0;
pub const E_UNEXPECTED: HRESULT = 0x8000_FFFF_u32 as i32;

pub fn succeeded(hr: HRESULT) -> bool {
    hr >= 0
}

pub fn failed(hr: HRESULT) -> bool {
    hr < 0
}

/// File name of the SDK shared library for an `std::env::consts::OS` value.
///
/// Returns `None` for platforms the vendor library is not distributed for.
pub fn library_file_name_for(os: &str) -> Option<&'static str> {
    match os {
        "windows" => Some("toupcam.dll"),
        "linux" => Some("libtoupcam.so"),
        _ => None,
    }
}

/// File name of the SDK shared library for the running platform.
pub fn library_file_name() -> Option<&'static str> {
    library_file_name_for(std::env::consts::OS)
}

type OpenFn = unsafe extern "system" fn(id: *const IdChar) -> HToupcam;
type CloseFn = unsafe extern "system" fn(h: HToupcam);
type GetSizeFn = unsafe extern "system" fn(h: HToupcam, width: *mut c_int, height: *mut c_int) -> HRESULT;
type StartPullModeWithCallbackFn =
    unsafe extern "system" fn(h: HToupcam, callback: Option<PTOUPCAM_EVENT_CALLBACK>, ctx: *mut c_void) -> HRESULT;
type PullImageWithRowPitchFn = unsafe extern "system" fn(
    h: HToupcam,
    image: *mut c_void,
    bits: c_int,
    row_pitch: c_int,
    width: *mut c_uint,
    height: *mut c_uint,
) -> HRESULT;
type StopFn = unsafe extern "system" fn(h: HToupcam) -> HRESULT;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to load Toupcam SDK from {path}: {source}")]
    Library {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("Toupcam SDK at {path} does not export `{symbol}`: {source}")]
    MissingSymbol {
        path: PathBuf,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
}

/// A loaded Toupcam SDK with its entry points resolved.
///
/// The function pointers stay valid for as long as this value is alive.
pub struct ToupcamLibrary {
    open: OpenFn,
    close: CloseFn,
    get_size: GetSizeFn,
    start_pull_mode_with_callback: StartPullModeWithCallbackFn,
    pull_image_with_row_pitch: PullImageWithRowPitchFn,
    stop: StopFn,
    path: PathBuf,
    _lib: Library,
}

impl std::fmt::Debug for ToupcamLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToupcamLibrary").field("path", &self.path).finish_non_exhaustive()
    }
}

macro_rules! resolve {
    ($lib:expr, $path:expr, $ty:ty, $name:literal) => {{
        let sym = unsafe { $lib.get::<$ty>(concat!($name, "\0").as_bytes()) }.map_err(|source| {
            LoadError::MissingSymbol {
                path: $path.to_path_buf(),
                symbol: $name,
                source,
            }
        })?;
        *sym
    }};
}

impl ToupcamLibrary {
    /// Load the SDK shared library at `path` and resolve every entry point.
    ///
    /// # Safety
    /// Loading a shared library runs its initialisers. `path` must point at a genuine
    /// Toupcam SDK build whose exports match the signatures declared in this crate.
    pub unsafe fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let lib = unsafe { Library::new(path) }.map_err(|source| LoadError::Library {
            path: path.to_path_buf(),
            source,
        })?;

        let open: OpenFn = resolve!(lib, path, OpenFn, "Toupcam_Open");
        let close: CloseFn = resolve!(lib, path, CloseFn, "Toupcam_Close");
        let get_size: GetSizeFn = resolve!(lib, path, GetSizeFn, "Toupcam_get_Size");
        let start_pull_mode_with_callback: StartPullModeWithCallbackFn =
            resolve!(lib, path, StartPullModeWithCallbackFn, "Toupcam_StartPullModeWithCallback");
        let pull_image_with_row_pitch: PullImageWithRowPitchFn =
            resolve!(lib, path, PullImageWithRowPitchFn, "Toupcam_PullImageWithRowPitch");
        let stop: StopFn = resolve!(lib, path, StopFn, "Toupcam_Stop");

        Ok(Self {
            open,
            close,
            get_size,
            start_pull_mode_with_callback,
            pull_image_with_row_pitch,
            stop,
            path: path.to_path_buf(),
            _lib: lib,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Toupcam_Open`. A null `id` opens the first camera found.
    ///
    /// # Safety
    /// `id` must be null or a NUL-terminated string of [`IdChar`].
    pub unsafe fn open(&self, id: *const IdChar) -> HToupcam {
        unsafe { (self.open)(id) }
    }

    /// # Safety
    /// `h` must be a live handle from [`Self::open`]; it is invalid afterwards.
    pub unsafe fn close(&self, h: HToupcam) {
        unsafe { (self.close)(h) }
    }

    /// # Safety
    /// `h` must be a live handle.
    pub unsafe fn get_size(&self, h: HToupcam, width: &mut c_int, height: &mut c_int) -> HRESULT {
        unsafe { (self.get_size)(h, width, height) }
    }

    /// # Safety
    /// `h` must be a live handle and `ctx` must remain valid until [`Self::stop`] or
    /// [`Self::close`] returns for this handle.
    pub unsafe fn start_pull_mode_with_callback(
        &self,
        h: HToupcam,
        callback: PTOUPCAM_EVENT_CALLBACK,
        ctx: *mut c_void,
    ) -> HRESULT {
        unsafe { (self.start_pull_mode_with_callback)(h, Some(callback), ctx) }
    }

    /// # Safety
    /// `h` must be a live handle and `image` must be writable for the full frame the SDK
    /// produces at the requested `bits` and `row_pitch`.
    pub unsafe fn pull_image_with_row_pitch(
        &self,
        h: HToupcam,
        image: *mut c_void,
        bits: c_int,
        row_pitch: c_int,
        width: &mut c_uint,
        height: &mut c_uint,
    ) -> HRESULT {
        unsafe { (self.pull_image_with_row_pitch)(h, image, bits, row_pitch, width, height) }
    }

    /// # Safety
    /// `h` must be a live handle.
    pub unsafe fn stop(&self, h: HToupcam) -> HRESULT {
        unsafe { (self.stop)(h) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_names_per_platform() {
        assert_eq!(library_file_name_for("windows"), Some("toupcam.dll"));
        assert_eq!(library_file_name_for("linux"), Some("libtoupcam.so"));
        assert_eq!(library_file_name_for("haiku"), None);
    }

    #[test]
    fn hresult_sign_decides_success() {
        assert!(succeeded(0));
        assert!(succeeded(1));
        assert!(failed(0x8000_4005_u32 as i32));
    }

    #[test]
    fn loading_missing_library_reports_path() {
        let path = std::env::temp_dir().join("definitely-not-a-toupcam-sdk.so");
        let err = unsafe { ToupcamLibrary::load(&path) }.unwrap_err();
        match err {
            LoadError::Library { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }
}
