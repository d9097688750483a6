//! RGBA pixel access
//!
//! Farbling algorithms only touch pixels through [`PixelRows`], one row at a
//! time, so the same code serves owned copies and borrowed scratch buffers.

use crate::error::{Result, ShieldError};

use super::seed::Crc16;

/// Bytes per RGBA pixel.
pub const CHANNELS: usize = 4;

/// Image dimensions in pixels.
///
/// Construction checks that the byte length of the image fits in `usize`, so
/// the size accessors never overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    width: usize,
    height: usize,
}

impl Geometry {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        width
            .checked_mul(height)
            .and_then(|pixels| pixels.checked_mul(CHANNELS))
            .and(width.checked_mul(CHANNELS))
            .ok_or(ShieldError::GeometryOverflow { width, height })?;
        Ok(Self { width, height })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn row_len(&self) -> usize {
        self.width * CHANNELS
    }

    pub fn byte_len(&self) -> usize {
        self.pixel_count() * CHANNELS
    }
}

/// Row-wise access to RGBA pixel data.
pub trait PixelRows {
    fn geometry(&self) -> Geometry;

    fn row(&self, y: usize) -> &[u8];

    fn row_mut(&mut self, y: usize) -> &mut [u8];

    /// CRC-16 of the content, streamed row by row.
    fn checksum(&self) -> u16 {
        let mut crc = Crc16::new();
        for y in 0..self.geometry().height() {
            crc.update(self.row(y));
        }
        crc.finish()
    }
}

/// Owned RGBA image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    geometry: Geometry,
    data: Vec<u8>,
}

impl RgbaImage {
    pub fn new(geometry: Geometry, data: Vec<u8>) -> Result<Self> {
        check_len(geometry, data.len())?;
        Ok(Self { geometry, data })
    }

    /// Image filled with one colour.
    pub fn filled(geometry: Geometry, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(geometry.byte_len())
            .collect();
        Self { geometry, data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl PixelRows for RgbaImage {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn row(&self, y: usize) -> &[u8] {
        let len = self.geometry.row_len();
        &self.data[y * len..(y + 1) * len]
    }

    fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let len = self.geometry.row_len();
        &mut self.data[y * len..(y + 1) * len]
    }
}

/// Borrowed RGBA buffer, e.g. a scratch copy of `ImageData.data`.
#[derive(Debug)]
pub struct RgbaSlice<'a> {
    geometry: Geometry,
    data: &'a mut [u8],
}

impl<'a> RgbaSlice<'a> {
    pub fn new(geometry: Geometry, data: &'a mut [u8]) -> Result<Self> {
        check_len(geometry, data.len())?;
        Ok(Self { geometry, data })
    }
}

impl PixelRows for RgbaSlice<'_> {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn row(&self, y: usize) -> &[u8] {
        let len = self.geometry.row_len();
        &self.data[y * len..(y + 1) * len]
    }

    fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let len = self.geometry.row_len();
        &mut self.data[y * len..(y + 1) * len]
    }
}

fn check_len(geometry: Geometry, actual: usize) -> Result<()> {
    let expected = geometry.byte_len();
    if expected != actual {
        return Err(ShieldError::InvalidGeometry { expected, actual });
    }
    Ok(())
}
