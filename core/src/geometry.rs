//! Coordinate mapping between abstract board positions and surface pixels.
//!
//! A board position is a real-valued `(row, lane)` pair. Rows grow downward
//! from the first peg row; lanes are signed offsets from the board's vertical
//! centre line. Every function here is pure and may be called from any
//! context.

use serde::{Deserialize, Serialize};

/// Linearly maps `value` from the `in_min..in_max` range onto `out_min..out_max`.
///
/// The mapping is not clamped; values outside the input range extrapolate.
/// A degenerate input range collapses onto `out_min`.
#[must_use]
pub fn range_map(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    let span = in_max - in_min;
    if span.abs() <= f32::EPSILON {
        return out_min;
    }
    out_min + (out_max - out_min) * ((value - in_min) / span)
}

/// Height above the bin score row at which floating score labels start.
const SCORE_LABEL_LIFT: f32 = 30.0;

/// Dimensions of the drawing surface measured in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSize {
    width: f32,
    height: f32,
}

impl SurfaceSize {
    /// Creates a new surface descriptor.
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Width of the surface in pixels.
    #[must_use]
    pub const fn width(&self) -> f32 {
        self.width
    }

    /// Height of the surface in pixels.
    #[must_use]
    pub const fn height(&self) -> f32 {
        self.height
    }
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self::new(1920.0, 1080.0)
    }
}

/// Fixed spacing constants describing the triangular peg board.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoardGeometry {
    rows: u32,
    token_size: f32,
    offset_y: f32,
}

impl BoardGeometry {
    /// Creates a geometry for a board with `rows` peg rows.
    ///
    /// `token_size` is the token diameter in pixels; every other spacing is
    /// derived from it. `offset_y` is the pixel height of row zero.
    #[must_use]
    pub const fn new(rows: u32, token_size: f32, offset_y: f32) -> Self {
        Self {
            rows,
            token_size,
            offset_y,
        }
    }

    /// Number of peg rows on the board. The board has `rows + 1` bins.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of scoring bins below the board.
    #[must_use]
    pub const fn bin_count(&self) -> usize {
        self.rows as usize + 1
    }

    /// Diameter of a token in pixels.
    #[must_use]
    pub const fn token_size(&self) -> f32 {
        self.token_size
    }

    /// Pixel height of row zero.
    #[must_use]
    pub const fn offset_y(&self) -> f32 {
        self.offset_y
    }

    /// Horizontal pixel distance covered by one lane unit.
    #[must_use]
    pub fn lane_spacing(&self) -> f32 {
        (self.token_size / 2.0 + 3.0) * 2.0
    }

    /// Vertical pixel distance covered by one row.
    #[must_use]
    pub fn row_spacing(&self) -> f32 {
        self.token_size * 2.0
    }

    /// Width of a single scoring bin in pixels.
    #[must_use]
    pub fn bin_width(&self) -> f32 {
        (self.token_size + 6.0) * 2.0
    }

    /// Maps a lane offset onto a pixel x coordinate for the given surface width.
    #[must_use]
    pub fn board_to_pixel_x(&self, lane: f32, surface_width: f32) -> f32 {
        lane * self.lane_spacing() + surface_width / 2.0
    }

    /// Maps a row onto a pixel y coordinate.
    #[must_use]
    pub fn board_to_pixel_y(&self, row: f32) -> f32 {
        self.offset_y + row * self.row_spacing()
    }

    /// Pixel y coordinate at which a token is parked before it enters the board.
    #[must_use]
    pub fn entry_y(&self) -> f32 {
        self.offset_y - self.token_size
    }

    /// Pixel y coordinate at which a freshly initialised token appears.
    #[must_use]
    pub fn spawn_y(&self) -> f32 {
        -self.token_size
    }

    /// Pixel y coordinate of the line that triggers scoring.
    #[must_use]
    pub fn bin_line_y(&self) -> f32 {
        self.board_to_pixel_y(self.rows as f32)
    }

    /// Pixel y coordinate at which score labels are anchored, just above the bin labels.
    #[must_use]
    pub fn label_y(&self) -> f32 {
        self.board_to_pixel_y(self.rows as f32 + 1.0) - SCORE_LABEL_LIFT
    }

    /// Left edge of the leftmost bin.
    #[must_use]
    pub fn bins_start_x(&self, surface_width: f32) -> f32 {
        self.board_to_pixel_x(-(self.rows as f32), surface_width) - self.bin_width() / 2.0
    }

    /// Resolves the bin under pixel column `x`.
    ///
    /// Returns `None` when `x` falls outside `0..=rows`, including the
    /// boundary just past the rightmost bin.
    #[must_use]
    pub fn bin_index_at(&self, x: f32, surface_width: f32) -> Option<usize> {
        let width = self.bin_width();
        if width <= 0.0 {
            return None;
        }

        let raw = ((x - self.bins_start_x(surface_width)) / width).floor();
        if !raw.is_finite() || raw < 0.0 || raw > self.rows as f32 {
            return None;
        }

        Some(raw as usize)
    }
}
