//! Purr Decoder Library
//!
//! This library turns GIF bytes into a list of fully composited RGBA frames
//! with their display delays.

pub mod animation;
pub mod frame_compositor;
pub mod lzw;
pub mod raster;

pub use animation::{DecodedAnimation, DecodedFrame};
pub use frame_compositor::FrameCompositor;
pub use lzw::CodecError;

use image::Rgba;
use log::debug;
use purr_core::{ContainerReader, Palette};
use raster::IndexBuffer;
use std::time::Duration;

/// Result type for purr-decoder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for purr-decoder operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Container format error: {0}")]
    Format(#[from] purr_core::Error),

    #[error("LZW error in frame {frame}: {source}")]
    Codec {
        frame: usize,
        #[source]
        source: CodecError,
    },

    #[error("Out of resources: cannot allocate {bytes} bytes")]
    OutOfResources { bytes: u64 },

    #[error("Index buffer for frame {frame} is {width}x{height}, region is {region_width}x{region_height}")]
    IndexBufferMismatch {
        frame: usize,
        width: usize,
        height: usize,
        region_width: u16,
        region_height: u16,
    },
}

/// Decoder configuration
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Declared delays below this are considered unusably fast
    pub min_delay: Duration,
    /// Delay used in place of one below `min_delay`
    pub default_delay: Duration,
    /// Fill the canvas with the global background color instead of transparency
    pub opaque_background: bool,
    /// Upper bound on the decoded pixel data of one animation
    pub max_decoded_bytes: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(20),
            default_delay: Duration::from_millis(100),
            opaque_background: false,
            max_decoded_bytes: 512 * 1024 * 1024,
        }
    }
}

impl DecoderConfig {
    /// Applies the delay policy to a declared delay
    pub fn effective_delay(&self, declared_ms: u32) -> Duration {
        let declared = Duration::from_millis(declared_ms as u64);
        if declared < self.min_delay {
            self.default_delay
        } else {
            declared
        }
    }

    fn background(&self, global: Option<&Palette>, index: u8, transparent: Option<u8>) -> Rgba<u8> {
        if !self.opaque_background || transparent == Some(index) {
            return Rgba([0, 0, 0, 0]);
        }
        global
            .and_then(|palette| palette.get(index))
            .map_or(Rgba([0, 0, 0, 0]), |color| Rgba(color.to_rgba()))
    }
}

/// Decodes every frame of a GIF held in memory.
///
/// Either every frame decodes or an error is returned; there are no partial
/// results.
pub fn decode(data: &[u8], config: &DecoderConfig) -> Result<DecodedAnimation> {
    let mut reader = ContainerReader::new(data)?;
    let width = reader.header().width as u32;
    let height = reader.header().height as u32;
    let background_index = reader.header().background_index;
    let global_palette = reader.header().global_palette.clone();

    let frame_bytes = width as u64 * height as u64 * 4;
    let mut compositor: Option<FrameCompositor> = None;
    let mut frames = Vec::new();

    while let Some(frame) = reader.next_frame()? {
        // Decoded frames plus the working canvas and a possible snapshot
        let needed = frame_bytes * (frames.len() as u64 + 3);
        if needed > config.max_decoded_bytes {
            return Err(Error::OutOfResources { bytes: needed });
        }

        let mut indices = IndexBuffer::try_new(
            frame.region.width as usize,
            frame.region.height as usize,
            frame.interlaced,
        )
        .map_err(|_| Error::OutOfResources {
            bytes: frame.region.pixel_count() as u64,
        })?;

        lzw::decompress(frame.min_code_size, &frame.data, &mut indices).map_err(|source| {
            Error::Codec {
                frame: frame.index,
                source,
            }
        })?;

        if !indices.is_full() {
            debug!(
                "Frame {} ended after {} of {} pixels",
                frame.index,
                indices.emitted(),
                frame.region.pixel_count()
            );
        }

        let compositor = match compositor.as_mut() {
            Some(compositor) => compositor,
            None => {
                let background = config.background(
                    global_palette.as_ref(),
                    background_index,
                    frame.transparent_index,
                );
                compositor.insert(FrameCompositor::new(width, height, background)?)
            }
        };

        let image = compositor.compose(&frame, &indices, global_palette.as_ref())?;
        frames.push(DecodedFrame::new(image, config.effective_delay(frame.delay_ms)));
    }

    if frames.is_empty() {
        return Err(purr_core::Error::NoFrames.into());
    }

    debug!("Decoded {} frames of {}x{}", frames.len(), width, height);

    Ok(DecodedAnimation::new(
        width,
        height,
        reader.header().loop_count,
        frames,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use purr_core::testing::{self, FrameSpec, GifBuilder, DEFAULT_PALETTE};
    use purr_core::Rgb;

    const CLEAR: [u8; 4] = [0, 0, 0, 0];

    fn rgba(color: Rgb) -> [u8; 4] {
        color.to_rgba()
    }

    fn pixel(frame: &DecodedFrame, x: u32, y: u32) -> [u8; 4] {
        frame.image().get_pixel(x, y).0
    }

    #[test]
    fn test_decode_sample() {
        let animation = decode(testing::SAMPLE_10X10, &DecoderConfig::default()).unwrap();

        assert_eq!(animation.width(), 10);
        assert_eq!(animation.height(), 10);
        assert_eq!(animation.frame_count(), 1);

        let frame = &animation.frames()[0];
        assert_eq!(frame.pixels().len(), 10 * 10 * 4);
        // Zero delay falls back to the default
        assert_eq!(frame.delay(), Duration::from_millis(100));
        assert_eq!(animation.byte_size(), 10 * 10 * 4);

        let palette = [[255, 255, 255, 255], [255, 0, 0, 255], [0, 0, 255, 255]];
        for (y, row) in testing::SAMPLE_10X10_INDICES.iter().enumerate() {
            for (x, &index) in row.iter().enumerate() {
                assert_eq!(pixel(frame, x as u32, y as u32), palette[index as usize]);
            }
        }
    }

    #[test]
    fn test_decode_is_deterministic() {
        let data = GifBuilder::new(6, 4)
            .frame(FrameSpec::new(0, 0, 6, 4, (0..24).map(|i| i % 4).collect()).disposal(2))
            .frame(FrameSpec::new(1, 1, 3, 2, vec![2; 6]).transparent(2))
            .frame(FrameSpec::new(0, 0, 2, 4, vec![1; 8]).interlaced().disposal(3))
            .build();

        let first = decode(&data, &DecoderConfig::default()).unwrap();
        let second = decode(&data, &DecoderConfig::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.frame_count(), 3);
    }

    #[test]
    fn test_restore_background_between_frames() {
        let data = GifBuilder::new(2, 2)
            .frame(FrameSpec::new(0, 0, 2, 2, vec![2; 4]).disposal(2))
            .frame(FrameSpec::new(0, 0, 1, 1, vec![3]))
            .build();

        let animation = decode(&data, &DecoderConfig::default()).unwrap();
        let second = &animation.frames()[1];

        assert_eq!(pixel(second, 0, 0), rgba(DEFAULT_PALETTE[3]));
        assert_eq!(pixel(second, 1, 0), CLEAR);
        assert_eq!(pixel(second, 0, 1), CLEAR);
        assert_eq!(pixel(second, 1, 1), CLEAR);
        // The first frame itself is untouched
        assert_eq!(pixel(&animation.frames()[0], 1, 1), rgba(DEFAULT_PALETTE[2]));
    }

    #[test]
    fn test_interlaced_frame() {
        let rows: Vec<u8> = (0..9).map(|y| (y % 4) as u8).collect();
        let data = GifBuilder::new(1, 9)
            .frame(FrameSpec::new(0, 0, 1, 9, rows.clone()).interlaced())
            .build();

        let animation = decode(&data, &DecoderConfig::default()).unwrap();
        let frame = &animation.frames()[0];
        for (y, &index) in rows.iter().enumerate() {
            assert_eq!(pixel(frame, 0, y as u32), rgba(DEFAULT_PALETTE[index as usize]));
        }
    }

    #[test]
    fn test_local_palette_overrides_global() {
        let local = vec![Rgb::new(10, 20, 30), Rgb::new(40, 50, 60)];
        let data = GifBuilder::new(2, 1)
            .frame(FrameSpec::new(0, 0, 2, 1, vec![1, 0]).local_palette(local.clone()))
            .frame(FrameSpec::new(0, 0, 1, 1, vec![1]))
            .build();

        let animation = decode(&data, &DecoderConfig::default()).unwrap();
        assert_eq!(pixel(&animation.frames()[0], 0, 0), rgba(local[1]));
        assert_eq!(pixel(&animation.frames()[1], 0, 0), rgba(DEFAULT_PALETTE[1]));
        assert_eq!(pixel(&animation.frames()[1], 1, 0), rgba(local[0]));
    }

    #[test]
    fn test_delay_policy() {
        let data = GifBuilder::new(1, 1)
            .loop_count(3)
            .frame(FrameSpec::new(0, 0, 1, 1, vec![0]).delay_cs(1))
            .frame(FrameSpec::new(0, 0, 1, 1, vec![0]).delay_cs(2))
            .frame(FrameSpec::new(0, 0, 1, 1, vec![0]).delay_cs(50))
            .build();

        let animation = decode(&data, &DecoderConfig::default()).unwrap();
        let delays: Vec<_> = animation.frames().iter().map(DecodedFrame::delay).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(20),
                Duration::from_millis(500),
            ]
        );
        assert_eq!(animation.total_duration(), Duration::from_millis(620));
        assert_eq!(animation.loop_count(), Some(3));
    }

    #[test]
    fn test_opaque_background() {
        let data = GifBuilder::new(2, 1)
            .background_index(2)
            .frame(FrameSpec::new(0, 0, 1, 1, vec![1]))
            .build();

        let config = DecoderConfig {
            opaque_background: true,
            ..DecoderConfig::default()
        };
        let animation = decode(&data, &config).unwrap();
        let frame = &animation.frames()[0];
        assert_eq!(pixel(frame, 0, 0), rgba(DEFAULT_PALETTE[1]));
        assert_eq!(pixel(frame, 1, 0), rgba(DEFAULT_PALETTE[2]));

        let transparent = GifBuilder::new(2, 1)
            .background_index(2)
            .frame(FrameSpec::new(0, 0, 1, 1, vec![1]).transparent(2))
            .build();
        let animation = decode(&transparent, &config).unwrap();
        assert_eq!(pixel(&animation.frames()[0], 1, 0), CLEAR);
    }

    #[test]
    fn test_out_of_bounds_fails() {
        let data = GifBuilder::new(4, 4)
            .frame(FrameSpec::new(0, 0, 4, 4, vec![0; 16]))
            .frame(FrameSpec::new(0, 3, 4, 2, vec![0; 8]))
            .build();

        assert!(matches!(
            decode(&data, &DecoderConfig::default()),
            Err(Error::Format(purr_core::Error::FrameOutOfBounds { index: 1, .. }))
        ));
    }

    #[test]
    fn test_no_frames_fails() {
        let data = GifBuilder::new(4, 4).build();
        assert!(matches!(
            decode(&data, &DecoderConfig::default()),
            Err(Error::Format(purr_core::Error::NoFrames))
        ));
    }

    #[test]
    fn test_codec_error_names_frame() {
        let data = GifBuilder::new(2, 2)
            .frame(FrameSpec::new(0, 0, 2, 2, vec![0; 4]))
            .frame(FrameSpec::new(0, 0, 2, 2, vec![0; 4]).min_code_size(10))
            .build();

        assert!(matches!(
            decode(&data, &DecoderConfig::default()),
            Err(Error::Codec {
                frame: 1,
                source: CodecError::InvalidMinCodeSize(10)
            })
        ));
    }

    #[test]
    fn test_decoded_size_budget() {
        let data = GifBuilder::new(16, 16)
            .frame(FrameSpec::new(0, 0, 1, 1, vec![0]))
            .frame(FrameSpec::new(0, 0, 1, 1, vec![1]))
            .build();

        let config = DecoderConfig {
            max_decoded_bytes: 16 * 16 * 4 * 3,
            ..DecoderConfig::default()
        };
        assert!(matches!(
            decode(&data, &config),
            Err(Error::OutOfResources { .. })
        ));
    }

    #[test]
    fn test_truncated_files_fail() {
        let data = GifBuilder::new(8, 8)
            .frame(FrameSpec::new(0, 0, 8, 8, (0..64).map(|i| (i % 3) as u8).collect()))
            .frame(FrameSpec::new(2, 2, 4, 4, vec![3; 16]).disposal(2))
            .build();

        for len in 0..data.len() {
            assert!(
                decode(&data[..len], &DecoderConfig::default()).is_err(),
                "prefix of {} bytes decoded",
                len
            );
        }
    }

    #[test]
    fn test_flipped_bytes_never_panic() {
        let data = GifBuilder::new(8, 8)
            .frame(FrameSpec::new(0, 0, 8, 8, (0..64).map(|i| (i % 4) as u8).collect()))
            .frame(FrameSpec::new(1, 1, 6, 6, vec![2; 36]).interlaced().disposal(3))
            .build();

        for i in 0..data.len() {
            for mask in [0x01, 0x10, 0x80, 0xFF] {
                let mut corrupted = data.clone();
                corrupted[i] ^= mask;
                if let Ok(animation) = decode(&corrupted, &DecoderConfig::default()) {
                    for frame in animation.frames() {
                        assert_eq!(
                            frame.pixels().len(),
                            animation.width() as usize * animation.height() as usize * 4
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_truncated_lzw_stream_fails() {
        let mut data = GifBuilder::new(4, 1).build();
        let trailer = data.len() - 1;

        // Image whose single sub-block stops before the end code
        let lzw = testing::encode_literals(2, &[1, 2, 3, 0]);
        let mut image = vec![0x2C, 0, 0, 0, 0, 4, 0, 1, 0, 0, 2];
        testing::write_sub_blocks(&mut image, &lzw[..lzw.len() - 1]);
        data.splice(trailer..trailer, image);

        assert!(matches!(
            decode(&data, &DecoderConfig::default()),
            Err(Error::Codec {
                frame: 0,
                source: CodecError::Truncated
            })
        ));
    }
}
