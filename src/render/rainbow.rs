use super::{Skin, SkinSize, paint};
use crossterm::style::Color;

const SPECTRUM: [Color; 6] = [
    Color::Red,
    Color::Magenta,
    Color::Yellow,
    Color::Green,
    Color::Cyan,
    Color::Blue,
];
const GLYPH: &str = "@";

/// Bars coloured by band position, cycling through the rainbow.
#[derive(Debug, Clone)]
pub struct RainbowSkin {
    size: SkinSize,
    cells: Vec<String>,
}

impl RainbowSkin {
    pub fn new(size: SkinSize) -> Self {
        let cells = (0..size.bands)
            .map(|band| paint(GLYPH, SPECTRUM[band % SPECTRUM.len()]))
            .collect();
        Self { size, cells }
    }

    fn cell(&self, band: usize) -> String {
        self.cells
            .get(band)
            .cloned()
            .unwrap_or_else(|| paint(GLYPH, SPECTRUM[band % SPECTRUM.len()]))
    }
}

impl Skin for RainbowSkin {
    fn name(&self) -> &'static str {
        "rainbow"
    }

    fn render(&self, levels: &[f32]) -> Vec<String> {
        (0..self.size.height)
            .map(|row| {
                levels
                    .iter()
                    .enumerate()
                    .map(|(band, &level)| {
                        if self.size.is_lit(row, level) {
                            self.cell(band)
                        } else {
                            " ".to_string()
                        }
                    })
                    .collect()
            })
            .collect()
    }
}
