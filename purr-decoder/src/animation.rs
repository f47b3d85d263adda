//! Decoded animation data structures

use image::RgbaImage;
use std::time::Duration;

/// A fully composited canvas and how long it stays on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    image: RgbaImage,
    delay: Duration,
}

impl DecodedFrame {
    /// Creates a new frame
    pub fn new(image: RgbaImage, delay: Duration) -> Self {
        Self { image, delay }
    }

    /// Canvas width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Canvas height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// RGBA8 pixels, row-major, tightly packed
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// The composited canvas
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Display duration
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Every frame of a decoded GIF, in display order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAnimation {
    width: u32,
    height: u32,
    loop_count: Option<u16>,
    frames: Vec<DecodedFrame>,
}

impl DecodedAnimation {
    /// Creates a new animation; `frames` must not be empty
    pub fn new(
        width: u32,
        height: u32,
        loop_count: Option<u16>,
        frames: Vec<DecodedFrame>,
    ) -> Self {
        debug_assert!(!frames.is_empty());
        Self {
            width,
            height,
            loop_count,
            frames,
        }
    }

    /// Canvas width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Canvas height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Loop count declared by the container, `Some(0)` meaning forever
    pub fn loop_count(&self) -> Option<u16> {
        self.loop_count
    }

    /// Frames in display order
    pub fn frames(&self) -> &[DecodedFrame] {
        &self.frames
    }

    /// Number of frames
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Sum of all frame delays
    pub fn total_duration(&self) -> Duration {
        self.frames.iter().map(DecodedFrame::delay).sum()
    }

    /// Total size of the decoded pixel data
    pub fn byte_size(&self) -> usize {
        self.frames.iter().map(|f| f.pixels().len()).sum()
    }
}
