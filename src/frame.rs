//! Decoded RGB24 frames

use std::borrow::Cow;
use std::path::Path;
use std::time::Instant;

use image::RgbImage;
use ndarray::{Array3, ArrayView3};

use crate::error::{Result, ToupcamError};

/// Interleaved colour channels per pixel.
pub const CHANNELS: usize = 3;

/// Bytes needed for a packed RGB24 image of the given size.
///
/// Fails with [`ToupcamError::FrameTooLarge`] if the size does not fit in memory.
pub fn frame_byte_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(CHANNELS))
        .ok_or(ToupcamError::FrameTooLarge { width, height })
}

/// One image pulled from the camera, shaped `(height, width, 3)`.
#[derive(Debug, Clone)]
pub struct Frame {
    pixels: Array3<u8>,
    sequence: u64,
    timestamp: Instant,
}

impl Frame {
    /// Wrap packed, top-down RGB24 bytes.
    pub fn from_rgb24(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = frame_byte_len(width, height)?;
        let actual = data.len();
        if actual != expected {
            return Err(ToupcamError::FrameSize { expected, actual });
        }
        let pixels = Array3::from_shape_vec((height as usize, width as usize, CHANNELS), data)
            .map_err(|_| ToupcamError::FrameSize { expected, actual })?;
        Ok(Self::from_array(pixels))
    }

    /// Wrap an existing `(height, width, 3)` array.
    pub fn from_pixels(pixels: Array3<u8>) -> Result<Self> {
        let (height, width, channels) = pixels.dim();
        if channels != CHANNELS {
            return Err(ToupcamError::FrameSize {
                expected: height * width * CHANNELS,
                actual: pixels.len(),
            });
        }
        Ok(Self::from_array(pixels))
    }

    fn from_array(pixels: Array3<u8>) -> Self {
        Self {
            pixels,
            sequence: 0,
            timestamp: Instant::now(),
        }
    }

    /// Create a test pattern frame (useful for testing consumers without hardware)
    pub fn test_pattern(width: u32, height: u32, pattern: TestPattern) -> Self {
        let (w, h) = (width as usize, height as usize);
        let pixels = Array3::from_shape_fn((h, w, CHANNELS), |(y, x, c)| match pattern {
            TestPattern::Gradient => match c {
                0 => (x * 255 / w.max(2).saturating_sub(1)) as u8,
                1 => (y * 255 / h.max(2).saturating_sub(1)) as u8,
                _ => ((x + y) % 256) as u8,
            },
            TestPattern::Checkerboard => {
                if (x / 32 + y / 32) % 2 == 0 { 255 } else { 0 }
            }
            TestPattern::Noise => {
                use std::collections::hash_map::DefaultHasher;
                use std::hash::{Hash, Hasher};

                let mut hasher = DefaultHasher::new();
                (x, y, c).hash(&mut hasher);
                (hasher.finish() % 256) as u8
            }
        });
        Self::from_array(pixels)
    }

    /// Set the per-stream sequence number
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn width(&self) -> u32 {
        self.pixels.dim().1 as u32
    }

    pub fn height(&self) -> u32 {
        self.pixels.dim().0 as u32
    }

    /// `(height, width, channels)`
    pub fn shape(&self) -> (usize, usize, usize) {
        self.pixels.dim()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    pub fn pixels(&self) -> ArrayView3<'_, u8> {
        self.pixels.view()
    }

    pub fn into_pixels(self) -> Array3<u8> {
        self.pixels
    }

    /// Row-major RGB24 bytes.
    pub fn as_raw(&self) -> Cow<'_, [u8]> {
        match self.pixels.as_slice() {
            Some(bytes) => Cow::Borrowed(bytes),
            None => Cow::Owned(self.pixels.iter().copied().collect()),
        }
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        let (width, height) = (self.width(), self.height());
        RgbImage::from_raw(width, height, self.as_raw().into_owned())
            .unwrap_or_else(|| RgbImage::new(width, height))
    }

    /// Encode the frame to `path`; the format follows the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_rgb_image().save(path)?;
        Ok(())
    }

    pub fn describe(&self) -> String {
        format!("#{} {}x{} rgb24", self.sequence, self.width(), self.height())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum TestPattern {
    Gradient,
    Checkerboard,
    Noise,
}
