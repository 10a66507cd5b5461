#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure bootstrap system that derives the static board layout.

use galton_board_core::BinColor;
use galton_board_world::{query, World};

/// Vertical gap between the bin line and the top of the bin rectangles.
const BIN_TOP_MARGIN: f32 = 50.0;

/// Peg placed at a board position, with its pixel centre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peg {
    /// Row of the peg.
    pub row: u32,
    /// Lane of the peg.
    pub lane: i32,
    /// Horizontal pixel centre.
    pub x: f32,
    /// Vertical pixel centre.
    pub y: f32,
    /// Radius in pixels.
    pub radius: f32,
}

/// Rectangle of a scoring bin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinRect {
    /// Index of the bin, left to right.
    pub index: usize,
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Score awarded by the bin.
    pub score: u32,
    /// Fill colour of the bin.
    pub color: BinColor,
}

/// Static geometry drawn beneath the moving tokens.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoardLayout {
    pegs: Vec<Peg>,
    bins: Vec<BinRect>,
}

impl BoardLayout {
    /// Pegs ordered row by row, left to right.
    #[must_use]
    pub fn pegs(&self) -> &[Peg] {
        &self.pegs
    }

    /// Bins ordered left to right.
    #[must_use]
    pub fn bins(&self) -> &[BinRect] {
        &self.bins
    }
}

/// Produces data required to draw the board.
#[derive(Debug, Default)]
pub struct Bootstrap;

impl Bootstrap {
    /// Derives the banner that should be shown when the overlay starts.
    #[must_use]
    pub fn welcome_banner<'world>(&self, world: &'world World) -> &'world str {
        query::welcome_banner(world)
    }

    /// Lays out pegs and bins for the world's current surface.
    ///
    /// Row `r` holds `r + 1` pegs at lanes `-r, -r + 2, ..., r`. Bins start
    /// half a bin to the left of lane `-rows` and extend to the surface bottom.
    #[must_use]
    pub fn board_layout(&self, world: &World) -> BoardLayout {
        let geometry = query::geometry(world);
        let surface = query::surface(world);
        let rows = geometry.rows();

        let mut pegs = Vec::with_capacity((rows as usize * (rows as usize + 1)) / 2);
        for row in 0..rows {
            let row_index = row as i32;
            for lane in (-row_index..=row_index).step_by(2) {
                pegs.push(Peg {
                    row,
                    lane,
                    x: geometry.board_to_pixel_x(lane as f32, surface.width()),
                    y: geometry.board_to_pixel_y(row as f32),
                    radius: geometry.token_size() / 2.0,
                });
            }
        }

        let width = geometry.bin_width();
        let start_x = geometry.bins_start_x(surface.width());
        let top = geometry.bin_line_y() + BIN_TOP_MARGIN;
        let height = (surface.height() - geometry.bin_line_y()).max(0.0);
        let bins = query::scoring_table(world)
            .iter()
            .enumerate()
            .map(|(index, slot)| BinRect {
                index,
                x: start_x + index as f32 * width,
                y: top,
                width,
                height,
                score: slot.score,
                color: slot.color,
            })
            .collect();

        BoardLayout { pegs, bins }
    }
}
