//! Purr Core Library
//!
//! This library provides the bounds-checked byte reader and the GIF container
//! parser used by the purr animated-asset pipeline.

pub mod container;
pub mod frame;
pub mod palette;
pub mod reader;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use container::{Container, ContainerHeader, ContainerReader, Version};
pub use frame::{Disposal, FrameDescriptor, Region};
pub use palette::{Palette, Rgb};
pub use reader::ByteReader;

/// Result type for purr-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Container format errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unexpected end of data at offset {offset}, needed {needed} more bytes")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("Invalid signature, expected 'GIF87a' or 'GIF89a'")]
    NotThisContainer,

    #[error("Canvas has zero width or height ({width}x{height})")]
    ZeroDimensions { width: u16, height: u16 },

    #[error("Frame {index} at ({left}, {top}) size {width}x{height} exceeds the {canvas_width}x{canvas_height} canvas")]
    FrameOutOfBounds {
        index: usize,
        left: u16,
        top: u16,
        width: u16,
        height: u16,
        canvas_width: u16,
        canvas_height: u16,
    },

    #[error("Frame {0} has neither a local nor a global color table")]
    MissingColorTable(usize),

    #[error("Unknown block tag 0x{tag:02X} at offset {offset}")]
    UnknownBlock { tag: u8, offset: usize },

    #[error("Container holds no frames")]
    NoFrames,
}
