//! GIF container parsing
//!
//! The container is a fixed prelude followed by a stream of tagged blocks:
//!
//! * Header - 6 bytes, `GIF87a` or `GIF89a`
//! * Logical screen descriptor - 7 bytes
//!     * bytes 0-3: canvas width, height (u16 LE)
//!     * byte 4:    packed; bit 7 global color table, bits 0-2 table size
//!     * byte 5:    background color index
//!     * byte 6:    pixel aspect ratio hint
//! * Global color table, `3 * 2^(size + 1)` bytes, if flagged
//! * Blocks, each introduced by one tag byte:
//!     * `0x21` extension, followed by a label byte and a sub-block chain
//!     * `0x2C` image descriptor (9 bytes), optional local color table,
//!       LZW minimum code size, LZW data as a sub-block chain
//!     * `0x3B` trailer

use crate::{ByteReader, Disposal, Error, FrameDescriptor, Palette, Region, Result};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace};

/// Signature for the 1987 revision
const SIGNATURE_87A: &[u8; 6] = b"GIF87a";

/// Signature for the 1989 revision
const SIGNATURE_89A: &[u8; 6] = b"GIF89a";

const BLOCK_EXTENSION: u8 = 0x21;
const BLOCK_IMAGE: u8 = 0x2C;
const BLOCK_TRAILER: u8 = 0x3B;

const EXTENSION_GRAPHICS: u8 = 0xF9;
const EXTENSION_APPLICATION: u8 = 0xFF;

const COLOR_TABLE_FLAG: u8 = 0b1000_0000;
const INTERLACE_FLAG: u8 = 0b0100_0000;
const TABLE_SIZE_MASK: u8 = 0b0000_0111;
const TRANSPARENCY_FLAG: u8 = 0b0000_0001;

/// Application identifiers that carry a loop count
const LOOPING_APPLICATIONS: [&[u8]; 2] = [b"NETSCAPE2.0", b"ANIMEXTS1.0"];

/// Container revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Version {
    Gif87a,
    Gif89a,
}

/// Everything known about the container before the first frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContainerHeader {
    /// Container revision
    pub version: Version,
    /// Canvas width in pixels
    pub width: u16,
    /// Canvas height in pixels
    pub height: u16,
    /// Global color table, if present
    pub global_palette: Option<Palette>,
    /// Background color index into the global table
    pub background_index: u8,
    /// Raw pixel aspect ratio byte (0 = unspecified)
    pub pixel_aspect: u8,
    /// Loop count from a looping application extension; `Some(0)` loops forever
    pub loop_count: Option<u16>,
}

impl ContainerHeader {
    /// Reads the signature, logical screen descriptor and global color table
    pub fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let version = match reader.read_exact(6) {
            Ok(sig) if sig == SIGNATURE_89A => Version::Gif89a,
            Ok(sig) if sig == SIGNATURE_87A => Version::Gif87a,
            _ => return Err(Error::NotThisContainer),
        };

        let width = reader.read_u16_le()?;
        let height = reader.read_u16_le()?;
        let flags = reader.read_u8()?;
        let background_index = reader.read_u8()?;
        let pixel_aspect = reader.read_u8()?;

        if width == 0 || height == 0 {
            return Err(Error::ZeroDimensions { width, height });
        }

        let global_palette = if flags & COLOR_TABLE_FLAG != 0 {
            Some(Palette::read(reader, flags & TABLE_SIZE_MASK)?)
        } else {
            None
        };

        Ok(Self {
            version,
            width,
            height,
            global_palette,
            background_index,
            pixel_aspect,
            loop_count: None,
        })
    }
}

/// Settings from a graphic control extension, pending the next image
#[derive(Debug, Clone, Copy, Default)]
struct GraphicsControl {
    disposal: Disposal,
    transparent_index: Option<u8>,
    delay_ms: u32,
}

/// Streaming block parser yielding one frame descriptor at a time
#[derive(Debug)]
pub struct ContainerReader<'a> {
    reader: ByteReader<'a>,
    header: ContainerHeader,
    pending: GraphicsControl,
    frames_read: usize,
    finished: bool,
}

impl<'a> ContainerReader<'a> {
    /// Parses the container prelude and positions the reader on the first block
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let header = ContainerHeader::read(&mut reader)?;

        debug!(
            "GIF header: {}x{}, global palette: {:?} entries",
            header.width,
            header.height,
            header.global_palette.as_ref().map(Palette::len)
        );

        Ok(Self {
            reader,
            header,
            pending: GraphicsControl::default(),
            frames_read: 0,
            finished: false,
        })
    }

    /// The header; `loop_count` is filled in as blocks are read
    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Number of frames yielded so far
    pub fn frames_read(&self) -> usize {
        self.frames_read
    }

    /// Reads blocks until the next image, returning `None` at the trailer
    pub fn next_frame(&mut self) -> Result<Option<FrameDescriptor>> {
        if self.finished {
            return Ok(None);
        }

        let result = self.read_until_frame();
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    fn read_until_frame(&mut self) -> Result<Option<FrameDescriptor>> {
        loop {
            let offset = self.reader.position();
            match self.reader.read_u8()? {
                BLOCK_TRAILER => {
                    debug!("GIF trailer after {} frames", self.frames_read);
                    return Ok(None);
                }
                BLOCK_EXTENSION => {
                    let label = self.reader.read_u8()?;
                    match label {
                        EXTENSION_GRAPHICS => self.read_graphics_control()?,
                        EXTENSION_APPLICATION => self.read_application()?,
                        _ => {
                            trace!("Skipping extension 0x{:02X} at offset {}", label, offset);
                            self.reader.skip_sub_blocks()?;
                        }
                    }
                }
                BLOCK_IMAGE => return self.read_image().map(Some),
                tag => return Err(Error::UnknownBlock { tag, offset }),
            }
        }
    }

    fn read_graphics_control(&mut self) -> Result<()> {
        let len = self.reader.read_u8()? as usize;
        if len == 0 {
            return Ok(());
        }

        let block = self.reader.read_exact(len)?;
        if len == 4 {
            let packed = block[0];
            self.pending = GraphicsControl {
                disposal: Disposal::from_bits(packed >> 2),
                transparent_index: (packed & TRANSPARENCY_FLAG != 0).then_some(block[3]),
                // Hundredths of a second
                delay_ms: LittleEndian::read_u16(&block[1..3]) as u32 * 10,
            };
        }

        self.reader.skip_sub_blocks()
    }

    fn read_application(&mut self) -> Result<()> {
        let len = self.reader.read_u8()? as usize;
        if len == 0 {
            return Ok(());
        }

        let identifier = self.reader.read_exact(len)?;
        if !LOOPING_APPLICATIONS.iter().any(|id| *id == identifier) {
            return self.reader.skip_sub_blocks();
        }

        loop {
            let len = self.reader.read_u8()? as usize;
            if len == 0 {
                return Ok(());
            }
            let block = self.reader.read_exact(len)?;
            if len == 3 && block[0] == 1 {
                self.header.loop_count = Some(LittleEndian::read_u16(&block[1..3]));
            }
        }
    }

    fn read_image(&mut self) -> Result<FrameDescriptor> {
        let index = self.frames_read;

        let left = self.reader.read_u16_le()?;
        let top = self.reader.read_u16_le()?;
        let width = self.reader.read_u16_le()?;
        let height = self.reader.read_u16_le()?;
        let flags = self.reader.read_u8()?;

        let region = Region::new(left, top, width, height);
        if !region.fits_within(self.header.width, self.header.height) {
            return Err(Error::FrameOutOfBounds {
                index,
                left,
                top,
                width,
                height,
                canvas_width: self.header.width,
                canvas_height: self.header.height,
            });
        }

        let local_palette = if flags & COLOR_TABLE_FLAG != 0 {
            Some(Palette::read(&mut self.reader, flags & TABLE_SIZE_MASK)?)
        } else {
            None
        };

        if local_palette.is_none() && self.header.global_palette.is_none() {
            return Err(Error::MissingColorTable(index));
        }

        let min_code_size = self.reader.read_u8()?;
        let mut data = Vec::new();
        self.reader.read_sub_blocks(&mut data)?;

        // Control extensions only apply to the image that follows them
        let control = std::mem::take(&mut self.pending);
        self.frames_read += 1;

        debug!(
            "Frame {}: {}x{} at ({}, {}), {} bytes of LZW data, {:?}, delay {}ms",
            index,
            width,
            height,
            left,
            top,
            data.len(),
            control.disposal,
            control.delay_ms
        );

        Ok(FrameDescriptor {
            index,
            region,
            local_palette,
            interlaced: flags & INTERLACE_FLAG != 0,
            disposal: control.disposal,
            transparent_index: control.transparent_index,
            delay_ms: control.delay_ms,
            min_code_size,
            data,
        })
    }
}

/// A fully parsed container
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Container {
    /// Container header
    pub header: ContainerHeader,
    /// Frames in file order
    pub frames: Vec<FrameDescriptor>,
}

impl Container {
    /// Parses every block of a container held in memory
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = ContainerReader::new(data)?;

        let mut frames = Vec::new();
        while let Some(frame) = reader.next_frame()? {
            frames.push(frame);
        }

        Ok(Self {
            header: reader.header,
            frames,
        })
    }

    /// Sum of the declared frame delays in milliseconds
    pub fn declared_duration_ms(&self) -> u64 {
        self.frames.iter().map(|f| f.delay_ms as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, FrameSpec, GifBuilder};
    use crate::Rgb;

    #[test]
    fn test_parse_sample() {
        let container = Container::parse(testing::SAMPLE_10X10).unwrap();

        assert_eq!(container.header.version, Version::Gif89a);
        assert_eq!(container.header.width, 10);
        assert_eq!(container.header.height, 10);
        let palette = container.header.global_palette.as_ref().unwrap();
        assert_eq!(palette.len(), 4);
        assert_eq!(palette.get(1), Some(Rgb::new(0xFF, 0, 0)));

        assert_eq!(container.frames.len(), 1);
        let frame = &container.frames[0];
        assert_eq!(frame.region, Region::new(0, 0, 10, 10));
        assert_eq!(frame.min_code_size, 2);
        assert_eq!(frame.data.len(), 0x16);
        assert_eq!(frame.disposal, Disposal::None);
        assert_eq!(frame.transparent_index, None);
        assert!(!frame.interlaced);
    }

    #[test]
    fn test_rejects_other_signatures() {
        assert!(matches!(
            Container::parse(b"\x89PNG\r\n\x1a\n"),
            Err(Error::NotThisContainer)
        ));
        assert!(matches!(Container::parse(b"GIF"), Err(Error::NotThisContainer)));
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        let data = GifBuilder::new(0, 4).build();
        assert!(matches!(
            Container::parse(&data),
            Err(Error::ZeroDimensions { width: 0, height: 4 })
        ));
    }

    #[test]
    fn test_control_extension_and_loop_count() {
        let data = GifBuilder::new(4, 4)
            .loop_count(0)
            .comment("hello")
            .frame(
                FrameSpec::new(0, 0, 2, 2, vec![1; 4])
                    .delay_cs(7)
                    .disposal(2)
                    .transparent(3),
            )
            .frame(FrameSpec::new(1, 1, 3, 3, vec![0; 9]).interlaced())
            .build();

        let container = Container::parse(&data).unwrap();
        assert_eq!(container.header.loop_count, Some(0));
        assert_eq!(container.frames.len(), 2);

        let first = &container.frames[0];
        assert_eq!(first.delay_ms, 70);
        assert_eq!(first.disposal, Disposal::RestoreBackground);
        assert_eq!(first.transparent_index, Some(3));

        // The control extension does not leak into the next image
        let second = &container.frames[1];
        assert_eq!(second.index, 1);
        assert_eq!(second.delay_ms, 0);
        assert_eq!(second.disposal, Disposal::None);
        assert_eq!(second.transparent_index, None);
        assert!(second.interlaced);
        assert_eq!(container.declared_duration_ms(), 70);
    }

    #[test]
    fn test_local_palette() {
        let local = vec![Rgb::new(1, 2, 3), Rgb::new(4, 5, 6)];
        let data = GifBuilder::new(2, 1)
            .frame(FrameSpec::new(0, 0, 2, 1, vec![0, 1]).local_palette(local.clone()))
            .build();

        let container = Container::parse(&data).unwrap();
        let palette = container.frames[0].local_palette.as_ref().unwrap();
        assert_eq!(palette.colors(), &local[..]);
    }

    #[test]
    fn test_frame_out_of_bounds() {
        let data = GifBuilder::new(4, 4)
            .frame(FrameSpec::new(2, 0, 3, 1, vec![0; 3]))
            .build();

        match Container::parse(&data) {
            Err(Error::FrameOutOfBounds { index, left, width, .. }) => {
                assert_eq!(index, 0);
                assert_eq!(left, 2);
                assert_eq!(width, 3);
            }
            other => panic!("expected out of bounds, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_color_table() {
        let data = GifBuilder::new(2, 2)
            .without_global_palette()
            .frame(FrameSpec::new(0, 0, 2, 2, vec![0; 4]))
            .build();

        assert!(matches!(
            Container::parse(&data),
            Err(Error::MissingColorTable(0))
        ));
    }

    #[test]
    fn test_unknown_block_tag() {
        let mut data = GifBuilder::new(2, 2).build();
        let trailer = data.len() - 1;
        data[trailer] = 0x42;

        assert!(matches!(
            Container::parse(&data),
            Err(Error::UnknownBlock { tag: 0x42, .. })
        ));
    }

    #[test]
    fn test_unknown_extension_is_skipped() {
        let mut data = GifBuilder::new(2, 2).build();
        let trailer = data.len() - 1;
        data.splice(trailer..trailer, [0x21, 0x01, 2, 0xAA, 0xBB, 0]);

        let container = Container::parse(&data).unwrap();
        assert!(container.frames.is_empty());
    }

    #[test]
    fn test_truncated_container_never_parses() {
        let data = testing::SAMPLE_10X10;
        for len in 0..data.len() {
            assert!(
                Container::parse(&data[..len]).is_err(),
                "prefix of {} bytes parsed",
                len
            );
        }
    }

    #[test]
    fn test_reader_stops_after_error() {
        let data = &testing::SAMPLE_10X10[..testing::SAMPLE_10X10.len() - 1];
        let mut reader = ContainerReader::new(data).unwrap();

        assert!(reader.next_frame().unwrap().is_some());
        assert!(reader.next_frame().is_err());
        assert!(reader.next_frame().unwrap().is_none());
        assert_eq!(reader.frames_read(), 1);
    }
}
