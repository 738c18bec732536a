//! ISP statistics
//!
//! The ImgU reports white balance statistics as a grid of cells, each cell
//! carrying the average of the four Bayer channels over a block of pixels
//! and a saturation ratio. Raw buffers are decoded into an [`RgbsGrid`],
//! which is large enough to be worth recycling through a
//! [`SharedItemPool`](pool::SharedItemPool).

pub mod pool;

use crate::ipa::common::{IpaError, Result};

/// Maximum number of cells horizontally in a grid.
pub const MAX_CELL_WIDTH_PER_SET: u32 = 160;
/// Maximum number of cells vertically in a grid.
pub const MAX_CELL_HEIGHT_PER_SET: u32 = 56;

/// Size of one cell in the raw statistics buffer.
pub const AWB_CELL_SIZE: usize = 8;

/// Averages of one statistics cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AwbCell {
    pub gr_avg: u8,
    pub r_avg: u8,
    pub b_avg: u8,
    pub gb_avg: u8,
    /// Non-zero when part of the cell is saturated.
    pub sat_ratio: u8,
}

impl AwbCell {
    pub const fn new(gr: u8, r: u8, b: u8, gb: u8) -> Self {
        Self {
            gr_avg: gr,
            r_avg: r,
            b_avg: b,
            gb_avg: gb,
            sat_ratio: 0,
        }
    }

    pub const fn saturated(mut self) -> Self {
        self.sat_ratio = 1;
        self
    }

    pub const fn is_saturated(&self) -> bool {
        self.sat_ratio != 0
    }

    /// Mean of both green channels.
    pub fn green(&self) -> u32 {
        (u32::from(self.gr_avg) + u32::from(self.gb_avg)) / 2
    }

    fn from_raw(raw: &[u8]) -> Self {
        Self {
            gr_avg: raw[0],
            r_avg: raw[1],
            b_avg: raw[2],
            gb_avg: raw[3],
            sat_ratio: raw[4],
        }
    }

    fn to_raw(self) -> [u8; AWB_CELL_SIZE] {
        [
            self.gr_avg,
            self.r_avg,
            self.b_avg,
            self.gb_avg,
            self.sat_ratio,
            0,
            0,
            0,
        ]
    }
}

/// Layout of the statistics grid over the BDS output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridConfig {
    /// Number of cells horizontally.
    pub width: u8,
    /// Number of cells vertically.
    pub height: u8,
    pub block_width_log2: u8,
    pub block_height_log2: u8,
    pub x_start: u16,
    pub y_start: u16,
}

impl GridConfig {
    pub fn cells(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }

    /// Last pixel column covered by the grid.
    pub fn x_end(&self) -> u32 {
        u32::from(self.x_start) + (u32::from(self.width) << self.block_width_log2).saturating_sub(1)
    }

    /// Last pixel row covered by the grid.
    pub fn y_end(&self) -> u32 {
        u32::from(self.y_start) + (u32::from(self.height) << self.block_height_log2).saturating_sub(1)
    }
}

/// Decoded statistics of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbsGrid {
    pub grid: GridConfig,
    /// Whether the ISP had AWB statistics enabled for this frame.
    pub awb_enabled: bool,
    pub cells: Vec<AwbCell>,
}

impl Default for RgbsGrid {
    fn default() -> Self {
        let capacity = (MAX_CELL_WIDTH_PER_SET * MAX_CELL_HEIGHT_PER_SET) as usize;
        Self {
            grid: GridConfig::default(),
            awb_enabled: false,
            cells: Vec::with_capacity(capacity),
        }
    }
}

impl RgbsGrid {
    /// Builds a grid where every cell is `cell`.
    pub fn uniform(grid: GridConfig, cell: AwbCell) -> Self {
        Self {
            grid,
            awb_enabled: true,
            cells: vec![cell; grid.cells()],
        }
    }

    /// Decodes a raw statistics buffer laid out as consecutive 8 byte cells
    /// in row-major order.
    pub fn fill_from_raw(&mut self, grid: GridConfig, raw: &[u8]) -> Result<()> {
        let expected = grid.cells() * AWB_CELL_SIZE;
        if raw.len() < expected {
            return Err(IpaError::InvalidStatistics(format!(
                "buffer holds {} bytes, grid {}x{} needs {}",
                raw.len(),
                grid.width,
                grid.height,
                expected
            )));
        }

        self.grid = grid;
        self.awb_enabled = true;
        self.cells.clear();
        self.cells.extend(
            raw[..expected]
                .chunks_exact(AWB_CELL_SIZE)
                .map(AwbCell::from_raw),
        );
        Ok(())
    }

    /// Encodes the grid in the layout accepted by [`fill_from_raw`](Self::fill_from_raw).
    pub fn to_raw(&self) -> Vec<u8> {
        self.cells.iter().flat_map(|cell| cell.to_raw()).collect()
    }

    /// Empties the grid while keeping its allocation. Used as the pool reset
    /// function.
    pub fn clear(&mut self) {
        self.grid = GridConfig::default();
        self.awb_enabled = false;
        self.cells.clear();
    }

    /// Whether the cell storage covers the whole grid.
    pub fn is_consistent(&self) -> bool {
        self.cells.len() >= self.grid.cells()
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<&AwbCell> {
        if x >= usize::from(self.grid.width) {
            return None;
        }
        self.cells.get(y * usize::from(self.grid.width) + x)
    }

    pub fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut AwbCell> {
        if x >= usize::from(self.grid.width) {
            return None;
        }
        self.cells.get_mut(y * usize::from(self.grid.width) + x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(width: u8, height: u8) -> GridConfig {
        GridConfig {
            width,
            height,
            block_width_log2: 4,
            block_height_log2: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_raw_buffer() {
        let mut raw = vec![0u8; 2 * 2 * AWB_CELL_SIZE];
        raw[AWB_CELL_SIZE..AWB_CELL_SIZE + 5].copy_from_slice(&[10, 20, 30, 40, 1]);

        let mut stats = RgbsGrid::default();
        stats.fill_from_raw(grid(2, 2), &raw).unwrap();

        assert_eq!(stats.cells.len(), 4);
        let cell = stats.cell(1, 0).unwrap();
        assert_eq!(*cell, AwbCell::new(10, 20, 30, 40).saturated());
        assert_eq!(cell.green(), 25);
        assert!(stats.cell(2, 0).is_none());
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let mut stats = RgbsGrid::default();
        let err = stats.fill_from_raw(grid(4, 4), &[0u8; 10]).unwrap_err();
        assert!(matches!(err, IpaError::InvalidStatistics(_)));
        assert!(stats.cells.is_empty());
    }

    #[test]
    fn test_encode_matches_decode_layout() {
        let mut stats = RgbsGrid::uniform(grid(3, 1), AwbCell::new(1, 2, 3, 4));
        *stats.cell_mut(2, 0).unwrap() = AwbCell::new(5, 6, 7, 8).saturated();

        let raw = stats.to_raw();
        assert_eq!(raw.len(), 3 * AWB_CELL_SIZE);
        assert_eq!(&raw[16..24], &[5, 6, 7, 8, 1, 0, 0, 0]);

        let mut decoded = RgbsGrid::default();
        decoded.fill_from_raw(stats.grid, &raw).unwrap();
        assert_eq!(decoded, stats);
    }

    #[test]
    fn test_clear_keeps_allocation() {
        let mut stats = RgbsGrid::uniform(grid(16, 12), AwbCell::default());
        let capacity = stats.cells.capacity();
        stats.clear();
        assert!(stats.cells.is_empty());
        assert!(!stats.awb_enabled);
        assert_eq!(stats.cells.capacity(), capacity);
    }

    #[test]
    fn test_grid_extent() {
        let g = GridConfig {
            width: 160,
            height: 45,
            block_width_log2: 3,
            block_height_log2: 4,
            x_start: 0,
            y_start: 0,
        };
        assert_eq!(g.x_end(), 1279);
        assert_eq!(g.y_end(), 719);
    }
}
