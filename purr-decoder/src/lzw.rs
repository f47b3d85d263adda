//! Variable-width LZW decompression of GIF image data
//!
//! Codes are packed LSB-first. The dictionary starts with one literal entry
//! per palette index plus the clear and end codes, and grows by one entry per
//! code read until it holds 4096 entries, at which point it stays frozen
//! until the next clear code.

/// Widest code the format allows
pub const MAX_CODE_WIDTH: u8 = 12;

const MAX_ENTRIES: usize = 1 << MAX_CODE_WIDTH as usize;
const NO_PREFIX: u16 = u16::MAX;

/// LZW stream errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Invalid LZW minimum code size {0}, expected 2 to 8")]
    InvalidMinCodeSize(u8),

    #[error("Invalid code {code}, next free dictionary slot is {next_free}")]
    InvalidCode { code: u16, next_free: u16 },

    #[error("LZW stream ended before the end code")]
    Truncated,
}

/// Destination for decoded palette indices
pub trait IndexSink {
    /// Receives the next run of indices in stream order
    fn push(&mut self, indices: &[u8]);
}

impl IndexSink for Vec<u8> {
    fn push(&mut self, indices: &[u8]) {
        self.extend_from_slice(indices);
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    prefix: u16,
    suffix: u8,
    first: u8,
    len: u16,
}

/// Pulls fixed-width codes out of a byte slice, LSB first
struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u32,
    bits: u8,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            acc: 0,
            bits: 0,
        }
    }

    fn read(&mut self, width: u8) -> Option<u16> {
        while self.bits < width {
            let byte = *self.data.get(self.pos)?;
            self.pos += 1;
            self.acc |= (byte as u32) << self.bits;
            self.bits += 8;
        }

        let code = (self.acc & ((1 << width) - 1)) as u16;
        self.acc >>= width;
        self.bits -= width;
        Some(code)
    }
}

/// Dictionary decoder for one image's data stream
pub struct Decompressor {
    min_code_size: u8,
    clear_code: u16,
    end_code: u16,
    width: u8,
    next_free: u16,
    prev: Option<u16>,
    table: Vec<Entry>,
    scratch: Vec<u8>,
}

impl Decompressor {
    /// Creates a decoder for the given minimum code size
    pub fn new(min_code_size: u8) -> Result<Self, CodecError> {
        if !(2..=8).contains(&min_code_size) {
            return Err(CodecError::InvalidMinCodeSize(min_code_size));
        }

        let clear_code = 1u16 << min_code_size;
        let mut table = vec![
            Entry {
                prefix: NO_PREFIX,
                suffix: 0,
                first: 0,
                len: 0,
            };
            MAX_ENTRIES
        ];
        for (code, entry) in table.iter_mut().take(clear_code as usize).enumerate() {
            *entry = Entry {
                prefix: NO_PREFIX,
                suffix: code as u8,
                first: code as u8,
                len: 1,
            };
        }

        let mut decompressor = Self {
            min_code_size,
            clear_code,
            end_code: clear_code + 1,
            width: 0,
            next_free: 0,
            prev: None,
            table,
            scratch: vec![0; MAX_ENTRIES],
        };
        decompressor.reset();
        Ok(decompressor)
    }

    /// Literal entries are never overwritten, so a reset only rewinds the
    /// allocation cursor and the code width
    fn reset(&mut self) {
        self.width = self.min_code_size + 1;
        self.next_free = self.clear_code + 2;
        self.prev = None;
    }

    /// Decodes `data` up to the end code, handing every index to `sink`.
    ///
    /// Bytes after the end code are ignored.
    pub fn decompress<S: IndexSink>(
        &mut self,
        data: &[u8],
        sink: &mut S,
    ) -> Result<(), CodecError> {
        let mut bits = BitReader::new(data);

        loop {
            let code = bits.read(self.width).ok_or(CodecError::Truncated)?;

            if code == self.clear_code {
                self.reset();
                continue;
            }
            if code == self.end_code {
                return Ok(());
            }

            match self.prev {
                Some(prev) if code < self.next_free => {
                    let first = self.table[code as usize].first;
                    self.insert(prev, first);
                }
                // The code being defined right now: prev's string plus its own first index
                Some(prev) if code == self.next_free => {
                    let first = self.table[prev as usize].first;
                    self.insert(prev, first);
                }
                None if code < self.next_free => {}
                _ => {
                    return Err(CodecError::InvalidCode {
                        code,
                        next_free: self.next_free,
                    })
                }
            }

            let len = self.expand(code);
            sink.push(&self.scratch[..len]);
            self.prev = Some(code);
        }
    }

    fn insert(&mut self, prefix: u16, suffix: u8) {
        let slot = self.next_free as usize;
        if slot >= MAX_ENTRIES {
            return;
        }

        let parent = self.table[prefix as usize];
        self.table[slot] = Entry {
            prefix,
            suffix,
            first: parent.first,
            len: parent.len + 1,
        };
        self.next_free += 1;

        if self.next_free == 1 << self.width && self.width < MAX_CODE_WIDTH {
            self.width += 1;
        }
    }

    /// Writes the string for `code` into the scratch buffer, back to front
    fn expand(&mut self, code: u16) -> usize {
        let len = self.table[code as usize].len as usize;
        let mut current = code as usize;
        for slot in self.scratch[..len].iter_mut().rev() {
            let entry = self.table[current];
            *slot = entry.suffix;
            current = entry.prefix as usize;
        }
        len
    }
}

/// Decodes one image's LZW data into `sink`
pub fn decompress<S: IndexSink>(
    min_code_size: u8,
    data: &[u8],
    sink: &mut S,
) -> Result<(), CodecError> {
    Decompressor::new(min_code_size)?.decompress(data, sink)
}
