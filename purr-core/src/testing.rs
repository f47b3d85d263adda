//! GIF fixtures for tests across the workspace
//!
//! The builder packs indices with literal codes only, mirroring the
//! decoder's dictionary growth so that code widths line up.

use crate::Rgb;

/// The 10x10 sample from "What's in a GIF": red and blue quadrants with a
/// white center, four-color global table, one frame.
pub const SAMPLE_10X10: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, // GIF89a
    0x0A, 0x00, 0x0A, 0x00, 0x91, 0x00, 0x00, // 10x10, 4 color global table
    0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x00,
    0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, // graphic control
    0x2C, 0x00, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x0A, 0x00, 0x00, // image descriptor
    0x02, 0x16, 0x8C, 0x2D, 0x99, 0x87, 0x2A, 0x1C, 0xDC, 0x33, 0xA0, 0x02, 0x75, 0xEC,
    0x95, 0xFA, 0xA8, 0xDE, 0x60, 0x8C, 0x04, 0x91, 0x4C, 0x01, 0x00, // LZW data
    0x3B,
];

/// Palette indices of [`SAMPLE_10X10`], row-major
pub const SAMPLE_10X10_INDICES: [[u8; 10]; 10] = [
    [1, 1, 1, 1, 1, 2, 2, 2, 2, 2],
    [1, 1, 1, 1, 1, 2, 2, 2, 2, 2],
    [1, 1, 1, 1, 1, 2, 2, 2, 2, 2],
    [1, 1, 1, 0, 0, 0, 0, 2, 2, 2],
    [1, 1, 1, 0, 0, 0, 0, 2, 2, 2],
    [2, 2, 2, 0, 0, 0, 0, 1, 1, 1],
    [2, 2, 2, 0, 0, 0, 0, 1, 1, 1],
    [2, 2, 2, 2, 2, 1, 1, 1, 1, 1],
    [2, 2, 2, 2, 2, 1, 1, 1, 1, 1],
    [2, 2, 2, 2, 2, 1, 1, 1, 1, 1],
];

/// Colors of the global table used by [`GifBuilder`] unless overridden
pub const DEFAULT_PALETTE: [Rgb; 4] = [
    Rgb::new(0x00, 0x00, 0x00),
    Rgb::new(0xFF, 0xFF, 0xFF),
    Rgb::new(0xFF, 0x00, 0x00),
    Rgb::new(0x00, 0x00, 0xFF),
];

/// One image block to emit
#[derive(Debug, Clone)]
pub struct FrameSpec {
    left: u16,
    top: u16,
    width: u16,
    height: u16,
    indices: Vec<u8>,
    local_palette: Option<Vec<Rgb>>,
    interlaced: bool,
    control: Option<(u8, u16, Option<u8>)>,
    min_code_size: Option<u8>,
}

impl FrameSpec {
    /// A frame covering the given rectangle; `indices` are row-major
    pub fn new(left: u16, top: u16, width: u16, height: u16, indices: Vec<u8>) -> Self {
        Self {
            left,
            top,
            width,
            height,
            indices,
            local_palette: None,
            interlaced: false,
            control: None,
            min_code_size: None,
        }
    }

    /// Sets the delay in hundredths of a second
    pub fn delay_cs(mut self, delay: u16) -> Self {
        let control = self.control.get_or_insert((0, 0, None));
        control.1 = delay;
        self
    }

    /// Sets the raw 3-bit disposal field
    pub fn disposal(mut self, disposal: u8) -> Self {
        let control = self.control.get_or_insert((0, 0, None));
        control.0 = disposal;
        self
    }

    /// Marks a palette index as transparent
    pub fn transparent(mut self, index: u8) -> Self {
        let control = self.control.get_or_insert((0, 0, None));
        control.2 = Some(index);
        self
    }

    /// Attaches a local color table
    pub fn local_palette(mut self, colors: Vec<Rgb>) -> Self {
        self.local_palette = Some(colors);
        self
    }

    /// Stores rows in interlaced order
    pub fn interlaced(mut self) -> Self {
        self.interlaced = true;
        self
    }

    /// Overrides the LZW minimum code size
    pub fn min_code_size(mut self, size: u8) -> Self {
        self.min_code_size = Some(size);
        self
    }
}

/// Assembles a GIF89a byte stream
#[derive(Debug, Clone)]
pub struct GifBuilder {
    width: u16,
    height: u16,
    global_palette: Option<Vec<Rgb>>,
    background_index: u8,
    loop_count: Option<u16>,
    comment: Option<String>,
    frames: Vec<FrameSpec>,
}

impl GifBuilder {
    /// Creates a builder with the default four-color global table
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            global_palette: Some(DEFAULT_PALETTE.to_vec()),
            background_index: 0,
            loop_count: None,
            comment: None,
            frames: Vec::new(),
        }
    }

    /// Replaces the global color table
    pub fn global_palette(mut self, colors: Vec<Rgb>) -> Self {
        self.global_palette = Some(colors);
        self
    }

    /// Omits the global color table
    pub fn without_global_palette(mut self) -> Self {
        self.global_palette = None;
        self
    }

    /// Sets the background color index
    pub fn background_index(mut self, index: u8) -> Self {
        self.background_index = index;
        self
    }

    /// Emits a NETSCAPE2.0 looping extension
    pub fn loop_count(mut self, count: u16) -> Self {
        self.loop_count = Some(count);
        self
    }

    /// Emits a comment extension
    pub fn comment(mut self, text: &str) -> Self {
        self.comment = Some(text.to_string());
        self
    }

    /// Appends an image block
    pub fn frame(mut self, frame: FrameSpec) -> Self {
        self.frames.push(frame);
        self
    }

    /// Serializes the container
    pub fn build(&self) -> Vec<u8> {
        let mut out = b"GIF89a".to_vec();
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        match &self.global_palette {
            Some(colors) => {
                out.push(0x80 | table_size_bits(colors.len()));
                out.push(self.background_index);
                out.push(0);
                write_table(&mut out, colors);
            }
            None => out.extend_from_slice(&[0, self.background_index, 0]),
        }

        if let Some(count) = self.loop_count {
            out.extend_from_slice(&[0x21, 0xFF, 11]);
            out.extend_from_slice(b"NETSCAPE2.0");
            out.extend_from_slice(&[3, 1]);
            out.extend_from_slice(&count.to_le_bytes());
            out.push(0);
        }

        if let Some(comment) = &self.comment {
            out.extend_from_slice(&[0x21, 0xFE]);
            write_sub_blocks(&mut out, comment.as_bytes());
        }

        for frame in &self.frames {
            if let Some((disposal, delay, transparent)) = frame.control {
                let packed = (disposal & 0x07) << 2 | transparent.is_some() as u8;
                out.extend_from_slice(&[0x21, 0xF9, 4, packed]);
                out.extend_from_slice(&delay.to_le_bytes());
                out.push(transparent.unwrap_or(0));
                out.push(0);
            }

            out.push(0x2C);
            for value in [frame.left, frame.top, frame.width, frame.height] {
                out.extend_from_slice(&value.to_le_bytes());
            }
            let mut flags = if frame.interlaced { 0x40 } else { 0 };
            if let Some(colors) = &frame.local_palette {
                flags |= 0x80 | table_size_bits(colors.len());
            }
            out.push(flags);
            if let Some(colors) = &frame.local_palette {
                write_table(&mut out, colors);
            }

            let palette_len = frame
                .local_palette
                .as_ref()
                .or(self.global_palette.as_ref())
                .map_or(4, Vec::len);
            let min_code_size = frame
                .min_code_size
                .unwrap_or_else(|| (table_size_bits(palette_len) + 1).max(2));
            out.push(min_code_size);

            let stream = if frame.interlaced {
                interlace(&frame.indices, frame.width as usize, frame.height as usize)
            } else {
                frame.indices.clone()
            };
            write_sub_blocks(&mut out, &encode_literals(min_code_size, &stream));
        }

        out.push(0x3B);
        out
    }
}

/// Packs indices as an LZW stream made only of literal codes, framed by a
/// clear code and an end code
pub fn encode_literals(min_code_size: u8, indices: &[u8]) -> Vec<u8> {
    let clear = 1u16 << min_code_size;
    let end = clear + 1;

    let mut writer = CodeWriter::default();
    let mut width = min_code_size + 1;
    let mut next_free = clear + 2;
    let mut has_prev = false;

    writer.write(clear, width);
    for &index in indices {
        writer.write(index as u16, width);
        if has_prev {
            next_free += 1;
            if next_free == 1 << width && width < 12 {
                width += 1;
            }
        }
        has_prev = true;

        if next_free >= 4094 {
            writer.write(clear, width);
            width = min_code_size + 1;
            next_free = clear + 2;
            has_prev = false;
        }
    }
    writer.write(end, width);
    writer.finish()
}

/// Splits a payload into 255-byte sub-blocks with a zero terminator
pub fn write_sub_blocks(out: &mut Vec<u8>, payload: &[u8]) {
    for chunk in payload.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0);
}

#[derive(Default)]
struct CodeWriter {
    bytes: Vec<u8>,
    acc: u32,
    bits: u8,
}

impl CodeWriter {
    fn write(&mut self, code: u16, width: u8) {
        self.acc |= (code as u32) << self.bits;
        self.bits += width;
        while self.bits >= 8 {
            self.bytes.push(self.acc as u8);
            self.acc >>= 8;
            self.bits -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.bytes.push(self.acc as u8);
        }
        self.bytes
    }
}

/// Smallest `k` with `2^(k+1) >= len`
fn table_size_bits(len: usize) -> u8 {
    let mut k = 0;
    while (2usize << k) < len && k < 7 {
        k += 1;
    }
    k
}

fn write_table(out: &mut Vec<u8>, colors: &[Rgb]) {
    let padded = 2usize << table_size_bits(colors.len());
    for i in 0..padded {
        let c = colors.get(i).copied().unwrap_or(Rgb::new(0, 0, 0));
        out.extend_from_slice(&[c.r, c.g, c.b]);
    }
}

/// Reorders row-major indices into interlaced pass order
fn interlace(indices: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(indices.len());
    for (start, step) in [(0, 8), (4, 8), (2, 4), (1, 2)] {
        for row in (start..height).step_by(step) {
            out.extend_from_slice(&indices[row * width..(row + 1) * width]);
        }
    }
    out
}
