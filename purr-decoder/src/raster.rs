//! Placement of decoded indices into frame rows

use crate::lzw::IndexSink;
use std::collections::TryReserveError;

/// Starting row and stride of each interlace pass
const INTERLACE_PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

/// Row-major palette indices for one frame, filled in stream order.
///
/// The n-th index of the stream lands on row `rows[n / width]`, which is
/// either top to bottom or the four interlace passes. Indices past
/// `width * height` are dropped.
#[derive(Debug, Clone)]
pub struct IndexBuffer {
    width: usize,
    height: usize,
    rows: Vec<usize>,
    indices: Vec<u8>,
    emitted: usize,
}

impl IndexBuffer {
    /// Allocates a buffer for a `width` x `height` frame
    pub fn try_new(width: usize, height: usize, interlaced: bool) -> Result<Self, TryReserveError> {
        let len = width * height;
        let mut indices = Vec::new();
        indices.try_reserve_exact(len)?;
        indices.resize(len, 0);

        let rows = if interlaced {
            INTERLACE_PASSES
                .iter()
                .flat_map(|&(start, step)| (start..height).step_by(step))
                .collect()
        } else {
            (0..height).collect()
        };

        Ok(Self {
            width,
            height,
            rows,
            indices,
            emitted: 0,
        })
    }

    /// Frame width
    pub fn width(&self) -> usize {
        self.width
    }

    /// Frame height
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of indices placed so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Returns true once every pixel has been written
    pub fn is_full(&self) -> bool {
        self.emitted >= self.indices.len()
    }

    /// Index at column `x`, row `y`
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.indices[y * self.width + x]
    }

    /// Written pixels as `(x, y, index)` in stream order
    pub fn written(&self) -> impl Iterator<Item = (usize, usize, u8)> + '_ {
        (0..self.emitted).map(move |n| {
            let (x, y) = self.locate(n);
            (x, y, self.indices[y * self.width + x])
        })
    }

    fn locate(&self, n: usize) -> (usize, usize) {
        (n % self.width, self.rows[n / self.width])
    }
}

impl IndexSink for IndexBuffer {
    fn push(&mut self, indices: &[u8]) {
        let room = self.indices.len() - self.emitted;
        for &index in &indices[..indices.len().min(room)] {
            let (x, y) = self.locate(self.emitted);
            self.indices[y * self.width + x] = index;
            self.emitted += 1;
        }
    }
}
