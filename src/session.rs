//! Camera session: device lifecycle and pull-mode frame delivery.
//!
//! A [`Toupcam`] owns one device handle and feeds one [`FrameBuffer`]. Once streaming, the
//! SDK calls back on its own thread; image events are pulled, decoded into [`Frame`]s and
//! pushed into the buffer, where consumers pick them up at their own pace.

use std::ffi::{c_uint, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::buffer::FrameBuffer;
use crate::config::SessionConfig;
use crate::driver::{DeviceHandle, Driver, NativeDriver};
use crate::error::{Result, ToupcamError};
use crate::event::CameraEvent;
use crate::frame::{frame_byte_len, Frame};

/// Lifecycle state of a [`Toupcam`] session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No handle. Initial state and the state after `close`.
    Closed,
    /// Waiting on the device layer for a handle.
    Opening,
    /// Handle held, not streaming.
    Open,
    /// The last open attempt found no camera.
    OpenFailed,
    /// Callback registered, frames flowing into the buffer.
    Streaming,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Closed, Opening)
                | (OpenFailed, Opening)
                | (Opening, Open)
                | (Opening, OpenFailed)
                | (Open, Streaming)
                | (Streaming, Open)
                | (Open, Closed)
                | (Streaming, Closed)
        )
    }

    /// A device handle is held in this state.
    pub fn has_handle(self) -> bool {
        matches!(self, SessionState::Open | SessionState::Streaming)
    }
}

/// Callback receiving every decoded camera event on the SDK thread.
pub type EventHook = Arc<dyn Fn(CameraEvent) + Send + Sync>;

/// State shared with the SDK callback for the duration of one stream.
struct StreamContext<D: Driver> {
    driver: Arc<D>,
    handle: DeviceHandle,
    width: u32,
    height: u32,
    buffer: FrameBuffer,
    hook: Option<EventHook>,
    sequence: AtomicU64,
}

impl<D: Driver> StreamContext<D> {
    fn handle_event(&self, code: u32) {
        let Some(event) = CameraEvent::from_raw(code) else {
            debug!("ignoring unknown camera event {code:#06x}");
            return;
        };
        match event {
            CameraEvent::Image => self.pull_frame(),
            CameraEvent::Exposure
            | CameraEvent::TempTint
            | CameraEvent::Chrome
            | CameraEvent::StillImage
            | CameraEvent::WbGain => debug!("camera event: {event}"),
            CameraEvent::Error | CameraEvent::Disconnected | CameraEvent::Timeout => {
                warn!("camera event: {event}")
            }
        }
        if let Some(hook) = &self.hook {
            hook(event);
        }
    }

    fn pull_frame(&self) {
        match self.pull() {
            Ok(frame) => {
                if let Err(err) = self.buffer.put(frame) {
                    debug!("discarding pulled frame: {err}");
                }
            }
            Err(err) => warn!("failed to pull image: {err}"),
        }
    }

    fn pull(&self) -> Result<Frame> {
        let expected = (self.width, self.height);
        // The SDK buffer is only valid during the pull; copy into one we own.
        let mut data = vec![0u8; frame_byte_len(self.width, self.height)?];
        let actual = self.driver.pull_image(self.handle, &mut data)?;
        if actual != expected {
            return Err(ToupcamError::GeometryMismatch { expected, actual });
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        Ok(Frame::from_rgb24(self.width, self.height, data)?.with_sequence(sequence))
    }
}

unsafe extern "system" fn stream_event_trampoline<D: Driver>(event: c_uint, ctx: *mut c_void) {
    if ctx.is_null() {
        return;
    }
    let stream = unsafe { &*(ctx as *const StreamContext<D>) };
    if catch_unwind(AssertUnwindSafe(|| stream.handle_event(event))).is_err() {
        warn!("camera event handler panicked on event {event:#06x}");
    }
}

/// A single AmScope camera and the buffer its frames are delivered into.
pub struct Toupcam<D: Driver = NativeDriver> {
    driver: Arc<D>,
    buffer: FrameBuffer,
    device_id: Option<String>,
    handle: Option<DeviceHandle>,
    state: SessionState,
    frame_size: Option<(u32, u32)>,
    stream: Option<Arc<StreamContext<D>>>,
    hook: Option<EventHook>,
}

impl Toupcam<NativeDriver> {
    /// Load the SDK from the default location and open the first camera.
    ///
    /// Fails only if the SDK cannot be loaded. A missing camera leaves the session in
    /// [`SessionState::OpenFailed`].
    pub fn new() -> Result<Self> {
        Self::with_config(SessionConfig::from_env()?)
    }

    /// Like [`Toupcam::new`] but delivering frames into `buffer`.
    pub fn with_buffer(buffer: FrameBuffer) -> Result<Self> {
        Self::with_config_and_buffer(SessionConfig::from_env()?, buffer)
    }

    pub fn with_config(config: SessionConfig) -> Result<Self> {
        let buffer = FrameBuffer::new(config.buffer_capacity)?;
        Self::with_config_and_buffer(config, buffer)
    }

    pub fn with_config_and_buffer(config: SessionConfig, buffer: FrameBuffer) -> Result<Self> {
        let driver = NativeDriver::load(&config)?;
        Ok(Self::from_driver(driver, buffer, config.device_id))
    }
}

impl<D: Driver> Toupcam<D> {
    /// Build a session on top of any [`Driver`] and try to open the camera right away.
    pub fn from_driver(driver: D, buffer: FrameBuffer, device_id: Option<String>) -> Self {
        let mut session = Self {
            driver: Arc::new(driver),
            buffer,
            device_id,
            handle: None,
            state: SessionState::Closed,
            frame_size: None,
            stream: None,
            hook: None,
        };
        session.open_device();
        session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.has_handle()
    }

    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    /// `(width, height)` negotiated by the last `start_live`.
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.frame_size
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Install a callback for every camera event. Takes effect at the next `start_live`.
    pub fn set_event_hook<F>(&mut self, hook: F)
    where
        F: Fn(CameraEvent) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
    }

    pub fn clear_event_hook(&mut self) {
        self.hook = None;
    }

    fn check_transition(&self, next: SessionState) -> Result<()> {
        if self.state.can_transition_to(next) {
            Ok(())
        } else {
            Err(ToupcamError::InvalidTransition {
                from: self.state,
                to: next,
            })
        }
    }

    fn set_state(&mut self, next: SessionState) {
        debug_assert!(self.state.can_transition_to(next), "{:?} -> {:?}", self.state, next);
        debug!("camera session {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn live_handle(&self, next: SessionState) -> Result<DeviceHandle> {
        self.handle.ok_or(ToupcamError::InvalidTransition {
            from: self.state,
            to: next,
        })
    }

    /// Ask the device layer for a handle.
    ///
    /// A missing camera is not an error: it is logged and the session moves to
    /// [`SessionState::OpenFailed`], from which `open` may be retried.
    pub fn open(&mut self) -> Result<()> {
        self.check_transition(SessionState::Opening)?;
        self.open_device();
        Ok(())
    }

    fn open_device(&mut self) {
        self.set_state(SessionState::Opening);
        match self.driver.open(self.device_id.as_deref()) {
            Some(handle) => {
                self.handle = Some(handle);
                self.set_state(SessionState::Open);
            }
            None => {
                warn!("Unable to open connection to camera.");
                self.set_state(SessionState::OpenFailed);
            }
        }
    }

    /// Cache the frame size and start delivering frames into the buffer.
    ///
    /// Device errors are logged and leave the session [`SessionState::Open`].
    pub fn start_live(&mut self) -> Result<()> {
        self.check_transition(SessionState::Streaming)?;
        let handle = self.live_handle(SessionState::Streaming)?;

        let (width, height) = match self.driver.frame_size(handle) {
            Ok(size) => size,
            Err(err) => {
                warn!("failed to query camera frame size: {err}");
                return Ok(());
            }
        };
        self.frame_size = Some((width, height));

        let stream = Arc::new(StreamContext {
            driver: Arc::clone(&self.driver),
            handle,
            width,
            height,
            buffer: self.buffer.clone(),
            hook: self.hook.clone(),
            sequence: AtomicU64::new(0),
        });
        let ctx = Arc::as_ptr(&stream) as *mut c_void;
        // `stream` is kept in `self.stream` until the device has stopped calling back.
        let started = unsafe { self.driver.start_pull_mode(handle, stream_event_trampoline::<D>, ctx) };
        if let Err(err) = started {
            warn!("failed to start pull mode: {err}");
            return Ok(());
        }
        self.stream = Some(stream);
        self.set_state(SessionState::Streaming);
        debug!("streaming {width}x{height} frames");
        Ok(())
    }

    /// Stop frame delivery.
    ///
    /// If the device refuses, the failure is logged and the session keeps streaming.
    pub fn stop_live(&mut self) -> Result<()> {
        self.check_transition(SessionState::Open)?;
        let handle = self.live_handle(SessionState::Open)?;
        if let Err(err) = self.driver.stop(handle) {
            warn!("failed to stop camera stream: {err}");
            return Ok(());
        }
        self.stream = None;
        self.set_state(SessionState::Open);
        Ok(())
    }

    /// Release the device handle, stopping the stream first if needed.
    pub fn close(&mut self) -> Result<()> {
        self.check_transition(SessionState::Closed)?;
        if self.state == SessionState::Streaming {
            self.stop_live()?;
        }
        if let Some(handle) = self.handle.take() {
            self.driver.close(handle);
        }
        // No callbacks run once the handle is closed, even if stop failed above.
        self.stream = None;
        self.frame_size = None;
        self.set_state(SessionState::Closed);
        Ok(())
    }
}

impl<D: Driver> Drop for Toupcam<D> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(err) = self.close() {
                debug!("failed to close camera on drop: {err}");
            }
        }
    }
}
