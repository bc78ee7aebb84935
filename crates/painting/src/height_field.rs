//! CPU height grids exchanged with the terrain and the compute backends.

use serde::{Deserialize, Serialize};

/// Rectangular cell region of a height field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeightRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl HeightRegion {
    /// Region covering a whole `resolution × resolution` grid
    pub fn full(resolution: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: resolution,
            height: resolution,
        }
    }

    /// Number of cells in the region
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Row-major grid of normalized elevation samples.
///
/// `x` runs along world X and `y` along world Z. Values use the terrain's
/// native encoding: world height = `position.y + value * size.y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightField {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl HeightField {
    /// Create a grid filled with `value`
    pub fn new(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Create a square `resolution × resolution` grid filled with `value`
    pub fn square(resolution: u32, value: f32) -> Self {
        Self::new(resolution, resolution, value)
    }

    /// Create a grid from row-major samples. Returns `None` on a size mismatch.
    pub fn from_vec(width: u32, height: u32, data: Vec<f32>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        Some(Self { width, height, data })
    }

    /// Create a grid by evaluating `f(x, y)` for every cell
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Edge length if the grid is square
    pub fn resolution(&self) -> Option<u32> {
        (self.width == self.height).then_some(self.width)
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Get a sample (None if out of bounds)
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[self.index(x, y)])
    }

    /// Set a sample (ignored if out of bounds)
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Raw row-major samples
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable row-major samples
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Copy out a sub-region, clamped to the grid
    pub fn region(&self, region: HeightRegion) -> HeightField {
        let x_end = (region.x + region.width).min(self.width);
        let y_end = (region.y + region.height).min(self.height);
        let width = x_end.saturating_sub(region.x);
        let height = y_end.saturating_sub(region.y);

        HeightField::from_fn(width, height, |dx, dy| {
            self.data[self.index(region.x + dx, region.y + dy)]
        })
    }

    /// Write `patch` with its origin at `(x, y)`, clipping at the grid edges
    pub fn write_region(&mut self, x: u32, y: u32, patch: &HeightField) {
        for py in 0..patch.height {
            let ty = y + py;
            if ty >= self.height {
                break;
            }
            for px in 0..patch.width {
                let tx = x + px;
                if tx >= self.width {
                    break;
                }
                let src = patch.index(px, py);
                let dst = self.index(tx, ty);
                self.data[dst] = patch.data[src];
            }
        }
    }

    /// Bitwise equality, treating NaN payloads and signed zeros as distinct
    pub fn bit_eq(&self, other: &HeightField) -> bool {
        self.width == other.width
            && self.height == other.height
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}
