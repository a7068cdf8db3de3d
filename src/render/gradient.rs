use super::{Skin, SkinSize, paint};
use crossterm::style::Color;

const PALETTE: [Color; 5] = [
    Color::Blue,
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Red,
];

/// Bars coloured by their level, cold to hot.
#[derive(Debug, Clone)]
pub struct GradientSkin {
    size: SkinSize,
}

impl GradientSkin {
    pub fn new(size: SkinSize) -> Self {
        Self { size }
    }
}

fn level_color(level: f32) -> Color {
    let idx = (level.clamp(0.0, 1.0) * PALETTE.len() as f32) as usize;
    PALETTE[idx.min(PALETTE.len() - 1)]
}

impl Skin for GradientSkin {
    fn name(&self) -> &'static str {
        "gradient"
    }

    fn render(&self, levels: &[f32]) -> Vec<String> {
        let cells: Vec<String> = levels.iter().map(|&l| paint("█", level_color(l))).collect();
        (0..self.size.height)
            .map(|row| {
                levels
                    .iter()
                    .zip(&cells)
                    .map(|(&level, cell)| {
                        if self.size.is_lit(row, level) {
                            cell.as_str()
                        } else {
                            " "
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_support::strip_ansi;

    #[test]
    fn colours_follow_level() {
        assert_eq!(level_color(0.0), Color::Blue);
        assert_eq!(level_color(0.5), Color::Green);
        assert_eq!(level_color(1.0), Color::Red);
    }

    #[test]
    fn shape_matches_plain_bars() {
        let skin = GradientSkin::new(SkinSize::new(2, 2));
        let lines: Vec<String> = skin.render(&[1.0, 0.5]).iter().map(|l| strip_ansi(l)).collect();
        assert_eq!(lines, vec!["█ ", "██"]);
    }
}
