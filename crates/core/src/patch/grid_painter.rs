use bitfrost_fixtures::{Color, Coordinate};

use super::lighting_patch::{apply_values, LightingPatch};

/// Bulk colour writes over a `width` x `height` region of the patch, origin at (0, 0).
///
/// Each call takes the patch lock once. Writes follow the same rules as
/// [`LightingPatch::set_channel_value`]: unpatched cells and oversized values are skipped.
/// Nothing is published; call [`LightingPatch::publish`] afterwards.
pub struct GridPainter<'a> {
    patch: &'a LightingPatch,
    width: u32,
    height: u32,
}

impl<'a> GridPainter<'a> {
    pub fn new(patch: &'a LightingPatch, width: u32, height: u32) -> Self {
        Self {
            patch,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, coordinate: Coordinate) -> bool {
        coordinate.x >= 0
            && coordinate.y >= 0
            && (coordinate.x as u32) < self.width
            && (coordinate.y as u32) < self.height
    }

    /// Paint every cell with the same wire-order values.
    pub fn fill(&self, values: &[u8]) -> usize {
        self.paint(|coordinate| self.contains(coordinate).then_some(values))
    }

    pub fn fill_row(&self, y: i32, values: &[u8]) -> usize {
        self.paint(|coordinate| (self.contains(coordinate) && coordinate.y == y).then_some(values))
    }

    pub fn fill_column(&self, x: i32, values: &[u8]) -> usize {
        self.paint(|coordinate| (self.contains(coordinate) && coordinate.x == x).then_some(values))
    }

    /// Set every cell to `color`, whatever order the fixture expects on the wire.
    pub fn fill_color(&self, color: Color) -> usize {
        self.paint_color(|coordinate| self.contains(coordinate).then_some(color))
    }

    /// Spread a row-major RGB buffer over the grid: bytes `3 * (y * width + x)..` belong to (x, y).
    /// Cells past the end of the buffer are left alone.
    pub fn paint_buffer(&self, data: &[u8]) -> usize {
        let width = self.width as usize;
        self.paint_color(|coordinate| {
            if !self.contains(coordinate) {
                return None;
            }
            let index = (coordinate.y as usize * width + coordinate.x as usize) * 3;
            data
                .get(index..index + 3)
                .map(|rgb| Color::new(rgb[0], rgb[1], rgb[2]))
        })
    }

    /// Set each cell's colour from `color_at`. Channel order is left to the fixture profile.
    pub fn paint_color<F>(&self, mut color_at: F) -> usize
    where
        F: FnMut(Coordinate) -> Option<Color>,
    {
        let mut painted = 0;
        self.patch.repaint(|coordinate, profile| {
            if let Some(color) = color_at(coordinate) {
                profile.set_color(color.r, color.g, color.b);
                painted += 1;
            }
        });
        painted
    }

    /// Write wire-order values from `color_at` to every cell; returns how many fixtures were
    /// written.
    pub fn paint<'v, F>(&self, mut color_at: F) -> usize
    where
        F: FnMut(Coordinate) -> Option<&'v [u8]>,
    {
        let mut painted = 0;
        self.patch.repaint(|coordinate, profile| {
            if let Some(values) = color_at(coordinate) {
                if apply_values(profile, values) {
                    painted += 1;
                }
            }
        });
        painted
    }
}

#[cfg(test)]
mod tests {
    use bitfrost_fixtures::FixtureProfile;

    use super::*;
    use crate::patch::{Axis, UniverseLayout};

    /// 4 x 2 RGB grid, row 0 at address 1, row 1 at address 13.
    fn grid() -> LightingPatch {
        let patch = LightingPatch::with_layout(UniverseLayout::Absolute);
        for y in 0..2 {
            let _ = patch
                .add_line(
                    Coordinate::new(0, y),
                    Axis::Horizontal,
                    1 + y as u32 * 12,
                    4,
                    FixtureProfile::rgb(),
                )
                .unwrap();
        }
        patch
    }

    #[test]
    fn test_fill() {
        let patch = grid();
        let painter = GridPainter::new(&patch, 4, 2);

        assert_eq!(painter.fill_color(Color::new(1, 2, 3)), 8);
        let frame = patch.snapshot()[0];
        for chunk in frame[..24].chunks(3) {
            assert_eq!(chunk, &[1, 2, 3]);
        }
        assert!(frame[24..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fill_outside_region_untouched() {
        let patch = grid();
        let painter = GridPainter::new(&patch, 2, 1);

        assert_eq!(painter.fill(&[9, 9, 9]), 2);
        let frame = patch.snapshot()[0];
        assert_eq!(&frame[0..6], &[9; 6]);
        assert!(frame[6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fill_row_and_column() {
        let patch = grid();
        let painter = GridPainter::new(&patch, 4, 2);

        assert_eq!(painter.fill_row(1, &[5, 5, 5]), 4);
        assert_eq!(painter.fill_column(0, &[7, 7, 7]), 2);

        let frame = patch.snapshot()[0];
        assert_eq!(&frame[0..3], &[7, 7, 7]);
        assert_eq!(&frame[3..6], &[0, 0, 0]);
        assert_eq!(&frame[12..15], &[7, 7, 7]);
        assert_eq!(&frame[15..24], &[5; 9]);
    }

    #[test]
    fn test_paint_buffer_row_major() {
        let patch = grid();
        let painter = GridPainter::new(&patch, 4, 2);

        let data: Vec<u8> = (0..24).collect();
        assert_eq!(painter.paint_buffer(&data), 8);

        let frame = patch.snapshot()[0];
        assert_eq!(&frame[0..12], &data[0..12]);
        assert_eq!(&frame[12..24], &data[12..24]);
    }

    #[test]
    fn test_paint_buffer_short_input() {
        let patch = grid();
        let painter = GridPainter::new(&patch, 4, 2);

        assert_eq!(painter.paint_buffer(&[1, 1, 1, 2, 2]), 1);
        assert_eq!(&patch.snapshot()[0][0..6], &[1, 1, 1, 0, 0, 0]);
    }

    #[test]
    fn test_colors_follow_fixture_channel_order() {
        let patch = LightingPatch::with_layout(UniverseLayout::Absolute);
        patch
            .add_fixture(Coordinate::new(0, 0), 1, FixtureProfile::grb())
            .unwrap();
        patch
            .add_fixture(Coordinate::new(1, 0), 4, FixtureProfile::rgb())
            .unwrap();
        let painter = GridPainter::new(&patch, 2, 1);

        assert_eq!(painter.fill_color(Color::new(255, 0, 0)), 2);
        let grb = patch.fixture(Coordinate::new(0, 0)).unwrap();
        assert_eq!(grb.profile.color(), Color::new(255, 0, 0));
        assert_eq!(&patch.snapshot()[0][0..6], &[0, 255, 0, 255, 0, 0]);

        assert_eq!(painter.paint_buffer(&[1, 2, 3, 4, 5, 6]), 2);
        assert_eq!(&patch.snapshot()[0][0..6], &[2, 1, 3, 4, 5, 6]);

        // Raw writes stay in wire order
        assert_eq!(painter.fill(&[7, 8, 9]), 2);
        assert_eq!(&patch.snapshot()[0][0..6], &[7, 8, 9, 7, 8, 9]);
    }

    #[test]
    fn test_oversized_values_skipped() {
        let patch = grid();
        let painter = GridPainter::new(&patch, 4, 2);
        assert_eq!(painter.fill(&[1, 2, 3, 4]), 0);
    }
}
