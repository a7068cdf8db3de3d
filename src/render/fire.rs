use super::{Skin, SkinSize, paint};
use crossterm::style::Color;

const INTENSITY: [char; 10] = [' ', '.', ',', ':', ';', 'i', '!', '*', '#', '@'];
// Top of the screen burns yellow, the base magenta.
const HEAT: [Color; 3] = [Color::Yellow, Color::Red, Color::Magenta];

/// Bars drawn with intensity glyphs and a vertical heat gradient.
#[derive(Debug, Clone)]
pub struct FireSkin {
    size: SkinSize,
}

impl FireSkin {
    pub fn new(size: SkinSize) -> Self {
        Self { size }
    }

    fn row_color(&self, row: usize) -> Color {
        let span = self.size.height.saturating_sub(1).max(1) as f32;
        let idx = (row as f32 / span * HEAT.len() as f32) as usize;
        HEAT[idx.min(HEAT.len() - 1)]
    }
}

fn intensity_glyph(level: f32) -> char {
    let idx = (level.clamp(0.0, 1.0) * INTENSITY.len() as f32) as usize;
    INTENSITY[idx.min(INTENSITY.len() - 1)]
}

impl Skin for FireSkin {
    fn name(&self) -> &'static str {
        "fire"
    }

    fn render(&self, levels: &[f32]) -> Vec<String> {
        let mut glyph = [0u8; 4];
        (0..self.size.height)
            .map(|row| {
                let color = self.row_color(row);
                let mut line = String::new();
                for &level in levels {
                    if self.size.is_lit(row, level) {
                        line.push_str(&paint(intensity_glyph(level).encode_utf8(&mut glyph), color));
                    } else {
                        line.push(' ');
                    }
                }
                line
            })
            .collect()
    }
}
