//! Color table data structures

use crate::{ByteReader, Result};

/// A single palette entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Creates a new color
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Returns the color as opaque RGBA
    pub fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 0xFF]
    }
}

/// An ordered table of up to 256 colors
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    /// Creates a palette from a list of colors
    pub fn new(colors: Vec<Rgb>) -> Self {
        Self { colors }
    }

    /// Reads `2^(size_exponent + 1)` RGB triples
    pub fn read(reader: &mut ByteReader<'_>, size_exponent: u8) -> Result<Self> {
        let count = 2usize << (size_exponent & 0x07);
        let raw = reader.read_exact(count * 3)?;
        let colors = raw
            .chunks_exact(3)
            .map(|c| Rgb::new(c[0], c[1], c[2]))
            .collect();
        Ok(Self { colors })
    }

    /// Looks up a color; out-of-range indices yield `None`
    pub fn get(&self, index: u8) -> Option<Rgb> {
        self.colors.get(index as usize).copied()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Returns true if the palette has no entries
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// All entries in index order
    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }
}
