//! Frame compositor applying disposal and transparency onto a persistent canvas

use crate::raster::IndexBuffer;
use crate::{Error, Result};
use image::{Rgba, RgbaImage};
use purr_core::{Disposal, FrameDescriptor, Palette, Region};

/// What the next frame needs to know about the one drawn before it
#[derive(Debug, Clone)]
struct DrawnFrame {
    region: Region,
    disposal: Disposal,
    /// Region-sized mask of pixels the frame emitted
    touched: Vec<bool>,
    /// Canvas before the frame was drawn, kept for `RestorePrevious`
    snapshot: Option<RgbaImage>,
}

/// Accumulates frames onto a canvas the size of the logical screen
pub struct FrameCompositor {
    background: Rgba<u8>,
    canvas: RgbaImage,
    previous: Option<DrawnFrame>,
}

impl FrameCompositor {
    /// Creates a compositor with a canvas filled with `background`
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Result<Self> {
        let canvas = try_filled(width, height, background)?;
        Ok(Self {
            background,
            canvas,
            previous: None,
        })
    }

    /// Current canvas
    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Disposes of the previous frame, draws `frame` and returns a copy of
    /// the composited canvas.
    ///
    /// Indices map through the frame's local palette, else `global_palette`.
    pub fn compose(
        &mut self,
        frame: &FrameDescriptor,
        indices: &IndexBuffer,
        global_palette: Option<&Palette>,
    ) -> Result<RgbaImage> {
        let palette = frame
            .local_palette
            .as_ref()
            .or(global_palette)
            .ok_or(purr_core::Error::MissingColorTable(frame.index))?;

        let region = frame.region;
        if indices.width() != region.width as usize || indices.height() != region.height as usize
        {
            return Err(Error::IndexBufferMismatch {
                frame: frame.index,
                width: indices.width(),
                height: indices.height(),
                region_width: region.width,
                region_height: region.height,
            });
        }

        if let Some(previous) = self.previous.take() {
            self.dispose(previous);
        }

        let snapshot = match frame.disposal {
            Disposal::RestorePrevious => Some(try_clone(&self.canvas)?),
            _ => None,
        };

        let mut touched = try_mask(region.pixel_count())?;
        for (x, y, index) in indices.written() {
            touched[y * region.width as usize + x] = true;

            if frame.transparent_index == Some(index) {
                continue;
            }
            // Indices outside the palette draw nothing
            if let Some(color) = palette.get(index) {
                self.canvas.put_pixel(
                    region.left as u32 + x as u32,
                    region.top as u32 + y as u32,
                    Rgba(color.to_rgba()),
                );
            }
        }

        self.previous = Some(DrawnFrame {
            region,
            disposal: frame.disposal,
            touched,
            snapshot,
        });

        try_clone(&self.canvas)
    }

    fn dispose(&mut self, previous: DrawnFrame) {
        let restore_from = match previous.disposal {
            Disposal::None | Disposal::Leave => return,
            Disposal::RestoreBackground => None,
            Disposal::RestorePrevious => previous.snapshot.as_ref(),
        };

        let region = previous.region;
        let width = region.width as usize;
        for (i, _) in previous.touched.iter().enumerate().filter(|(_, t)| **t) {
            let x = region.left as u32 + (i % width) as u32;
            let y = region.top as u32 + (i / width) as u32;
            let pixel = match restore_from {
                Some(snapshot) => *snapshot.get_pixel(x, y),
                None => self.background,
            };
            self.canvas.put_pixel(x, y, pixel);
        }
    }
}

fn try_buffer(len: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| Error::OutOfResources { bytes: len as u64 })?;
    Ok(buffer)
}

fn try_mask(len: usize) -> Result<Vec<bool>> {
    let mut mask = Vec::new();
    mask.try_reserve_exact(len)
        .map_err(|_| Error::OutOfResources { bytes: len as u64 })?;
    mask.resize(len, false);
    Ok(mask)
}

fn try_filled(width: u32, height: u32, fill: Rgba<u8>) -> Result<RgbaImage> {
    let len = width as usize * height as usize * 4;
    let mut buffer = try_buffer(len)?;
    for _ in 0..len / 4 {
        buffer.extend_from_slice(&fill.0);
    }
    RgbaImage::from_raw(width, height, buffer).ok_or(Error::OutOfResources { bytes: len as u64 })
}

fn try_clone(image: &RgbaImage) -> Result<RgbaImage> {
    let raw = image.as_raw();
    let mut buffer = try_buffer(raw.len())?;
    buffer.extend_from_slice(raw);
    RgbaImage::from_raw(image.width(), image.height(), buffer)
        .ok_or(Error::OutOfResources { bytes: raw.len() as u64 })
}
