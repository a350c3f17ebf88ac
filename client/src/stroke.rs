//! Simulated pen input for the drawing player

use shared::Stroke;

const STEP_X: i32 = 10;
const STEP_Y: i32 = 7;

/// Endless diagonal stroke starting at the origin
///
/// Each sample moves (+10, +7). Colour cycles with `(x + y) % 10` and the
/// thickness follows `1 + x % 5`.
#[derive(Debug, Clone, Default)]
pub struct StrokeGenerator {
    x: i32,
    y: i32,
}

impl StrokeGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Iterator for StrokeGenerator {
    type Item = Stroke;

    fn next(&mut self) -> Option<Stroke> {
        let stroke = Stroke {
            x: self.x,
            y: self.y,
            color: self.x.wrapping_add(self.y).rem_euclid(10),
            thickness: 1 + self.x.rem_euclid(5),
        };
        self.x = self.x.wrapping_add(STEP_X);
        self.y = self.y.wrapping_add(STEP_Y);
        Some(stroke)
    }
}
