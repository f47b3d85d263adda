//! Per-frame metadata parsed from the container

use crate::Palette;

/// How a frame's pixels are cleaned up before the next frame is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Disposal {
    /// No disposal specified; behaves like `Leave`
    #[default]
    None,
    /// Leave the frame in place
    Leave,
    /// Reset the frame's pixels to the background color
    RestoreBackground,
    /// Reset the frame's pixels to the canvas as it was before the frame
    RestorePrevious,
}

impl Disposal {
    /// Decodes the 3-bit disposal field of a graphic control extension.
    /// Reserved values are treated as `None`.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            1 => Disposal::Leave,
            2 => Disposal::RestoreBackground,
            3 => Disposal::RestorePrevious,
            _ => Disposal::None,
        }
    }
}

/// Rectangle a frame occupies within the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Region {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
}

impl Region {
    /// Creates a new region
    pub fn new(left: u16, top: u16, width: u16, height: u16) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Checks that the region lies entirely inside a canvas
    pub fn fits_within(&self, canvas_width: u16, canvas_height: u16) -> bool {
        self.left as u32 + self.width as u32 <= canvas_width as u32
            && self.top as u32 + self.height as u32 <= canvas_height as u32
    }

    /// Number of pixels covered by the region
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// One image block together with the control extension that preceded it
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameDescriptor {
    /// Position of this frame in the container
    pub index: usize,
    /// Placement within the canvas
    pub region: Region,
    /// Local color table, overriding the global one for this frame
    pub local_palette: Option<Palette>,
    /// Rows are stored in four interlaced passes
    pub interlaced: bool,
    /// Disposal applied before the next frame is drawn
    pub disposal: Disposal,
    /// Palette index that leaves the underlying pixel visible
    pub transparent_index: Option<u8>,
    /// Declared delay in milliseconds, before any playback policy
    pub delay_ms: u32,
    /// LZW minimum code size byte
    pub min_code_size: u8,
    /// Concatenated LZW data sub-blocks
    #[cfg_attr(feature = "serde", serde(skip))]
    pub data: Vec<u8>,
}
